use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::path::Path;
use tracing::warn;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};
use waste_kiosk::{
    config::KioskConfig,
    service::RedemptionService,
    service_client::ServiceClient,
    session::{
        KioskSession,
        SessionUpdate,
    },
};

const LOG_FILE_PREFIX: &str = "waste-kiosk.log";

/// The terminal belongs to the UI, so logs go to a daily rolling file.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

pub async fn run_app(config: KioskConfig) -> Result<()> {
    let service = ServiceClient::new(&config.service_url, config.request_timeout)
        .wrap_err("failed to build redemption service client")?;
    let mut session = KioskSession::new(service, config.poll)
        .with_shutdown_grace(config.request_timeout * 2);
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut session, &mut ui_state, &mut input_events).await;
    if let Err(err) = &res {
        tracing::error!(error = %err, "kiosk loop failed");
    }
    tracing::info!("Shutting down");
    session.shutdown().await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<S: RedemptionService>(
    session: &mut KioskSession<S>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    tracing::info!("Running kiosk loop");
    ui::draw(ui_state, &session.snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            update = session.next_update() => {
                if let SessionUpdate::Stale = update {
                    continue;
                }
                ui::draw(ui_state, &session.snapshot())
                    .wrap_err("draw after session update failed")?;
            }
            _ = tokio::signal::ctrl_c() => { break; }
            raw_ev = ui::next_raw_event(input_events) => {
                let raw_ev = raw_ev?;
                let snapshot = session.snapshot();
                let Some(ev) = ui::interpret_event(ui_state, raw_ev, &snapshot) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::ChooseCategory(category) => {
                        session.choose_category(category);
                    }
                    ui::UserEvent::Back => {
                        session.back_to_categories();
                    }
                    ui::UserEvent::ChoosePrize(prize) => {
                        if let Err(err) = session.submit_selection(prize) {
                            warn!(%err, "selection refused");
                        }
                    }
                    ui::UserEvent::Cancel => {
                        session.cancel().await;
                    }
                    ui::UserEvent::CloseModal => {
                        session.close_modal();
                    }
                }
                ui::draw(ui_state, &session.snapshot())
                    .wrap_err("draw after input failed")?;
            }
        }
    }

    Ok(())
}
