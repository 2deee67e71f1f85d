use clap::Parser;
use reqwest::Url;
use std::{
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_SERVICE_URL: &str = "http://13.212.247.100";
pub const DEFAULT_POLL_BUDGET_SECS: u64 = 80;
pub const DEFAULT_POLL_PERIOD_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_DIR: &str = "~/.waste-kiosk/logs";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "waste-kiosk",
    version,
    about = "Recycling kiosk: deposit waste, pick a prize, wait for the sensor"
)]
pub struct KioskArgs {
    /// Base URL of the redemption service
    #[arg(long, env = "KIOSK_SERVICE_URL", default_value = DEFAULT_SERVICE_URL)]
    pub service_url: String,

    /// Total time to wait for the sensor before giving up
    #[arg(long, env = "KIOSK_POLL_BUDGET_SECS", default_value_t = DEFAULT_POLL_BUDGET_SECS)]
    pub poll_budget_secs: u64,

    /// Delay between two sensor status queries
    #[arg(long, env = "KIOSK_POLL_PERIOD_SECS", default_value_t = DEFAULT_POLL_PERIOD_SECS)]
    pub poll_period_secs: u64,

    /// Timeout applied to every HTTP request
    #[arg(
        long,
        env = "KIOSK_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    /// Directory for the rolling log files
    #[arg(long, env = "KIOSK_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid service URL '{url}': {reason}")]
    InvalidServiceUrl { url: String, reason: String },
    #[error("poll period must be greater than zero")]
    ZeroPollPeriod,
    #[error("poll budget ({budget}s) must be at least one poll period ({period}s)")]
    BudgetShorterThanPeriod { budget: u64, period: u64 },
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
}

/// Timing of the sensor poll loop. Also sets the visible countdown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollConfig {
    pub budget: Duration,
    pub period: Duration,
}

impl PollConfig {
    pub fn new(budget: Duration, period: Duration) -> Self {
        Self { budget, period }
    }

    /// Most status queries one budget can hold, one per period from the start.
    pub fn max_queries(&self) -> u64 {
        let period = self.period.as_millis().max(1);
        self.budget.as_millis().div_ceil(period) as u64
    }

    pub fn countdown_start(&self) -> u64 {
        self.budget.as_secs()
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(DEFAULT_POLL_BUDGET_SECS),
            period: Duration::from_secs(DEFAULT_POLL_PERIOD_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct KioskConfig {
    pub service_url: Url,
    pub poll: PollConfig,
    pub request_timeout: Duration,
    pub log_dir: PathBuf,
}

impl TryFrom<KioskArgs> for KioskConfig {
    type Error = ConfigError;

    fn try_from(args: KioskArgs) -> Result<Self, Self::Error> {
        let service_url = Url::parse(&args.service_url).map_err(|e| {
            ConfigError::InvalidServiceUrl {
                url: args.service_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(service_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidServiceUrl {
                url: args.service_url,
                reason: "scheme must be http or https".to_string(),
            });
        }
        if args.poll_period_secs == 0 {
            return Err(ConfigError::ZeroPollPeriod);
        }
        if args.poll_budget_secs < args.poll_period_secs {
            return Err(ConfigError::BudgetShorterThanPeriod {
                budget: args.poll_budget_secs,
                period: args.poll_period_secs,
            });
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        let log_dir = PathBuf::from(shellexpand::tilde(&args.log_dir).into_owned());

        Ok(Self {
            service_url,
            poll: PollConfig::new(
                Duration::from_secs(args.poll_budget_secs),
                Duration::from_secs(args.poll_period_secs),
            ),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn args(extra: &[&str]) -> KioskArgs {
        let mut argv = vec!["waste-kiosk"];
        argv.extend_from_slice(extra);
        KioskArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn try_from__defaults_match_documented_budget() {
        // given
        let args = args(&["--service-url", "http://localhost:9000"]);

        // when
        let config = KioskConfig::try_from(args).unwrap();

        // then
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.poll.max_queries(), 16);
        assert_eq!(config.poll.countdown_start(), 80);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn max_queries__counts_a_partial_last_period() {
        let poll = PollConfig::new(Duration::from_secs(7), Duration::from_secs(5));

        assert_eq!(poll.max_queries(), 2);
    }

    #[test]
    fn try_from__rejects_zero_period() {
        let args = args(&["--poll-period-secs", "0"]);

        let err = KioskConfig::try_from(args).unwrap_err();

        assert_eq!(err, ConfigError::ZeroPollPeriod);
    }

    #[test]
    fn try_from__rejects_budget_shorter_than_period() {
        let args = args(&["--poll-budget-secs", "3", "--poll-period-secs", "5"]);

        let err = KioskConfig::try_from(args).unwrap_err();

        assert_eq!(
            err,
            ConfigError::BudgetShorterThanPeriod {
                budget: 3,
                period: 5
            }
        );
    }

    #[test]
    fn try_from__rejects_non_http_url() {
        let args = args(&["--service-url", "ftp://kiosk"]);

        let err = KioskConfig::try_from(args).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidServiceUrl { .. }));
    }

    #[test]
    fn try_from__keeps_absolute_log_dir() {
        let args = args(&["--log-dir", "/var/log/kiosk"]);

        let config = KioskConfig::try_from(args).unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/var/log/kiosk"));
    }
}
