use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use waste_kiosk::config::{
    KioskArgs,
    KioskConfig,
};

mod client;
mod ui;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = KioskConfig::try_from(KioskArgs::parse())
        .wrap_err("invalid kiosk configuration")?;
    let _log_guard = client::init_tracing(&config.log_dir)?;
    tracing::info!(
        service_url = %config.service_url,
        budget = ?config.poll.budget,
        period = ?config.poll.period,
        "starting waste kiosk"
    );
    client::run_app(config).await
}
