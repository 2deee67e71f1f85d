use crate::{
    config::{
        DEFAULT_REQUEST_TIMEOUT_SECS,
        PollConfig,
    },
    poller::{
        WorkerEvent,
        WorkerEventKind,
        run_redemption,
    },
    redemption::{
        FinalStatus,
        Prize,
        RecordId,
        RedemptionRequest,
        WasteCategory,
    },
    service::RedemptionService,
    workflow::{
        Resolution,
        ViewState,
        WorkflowError,
        WorkflowState,
    },
};
use std::time::Duration;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        Instant,
        Interval,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
    warn,
};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);
/// Long enough for an in-flight create plus the write-back that follows it.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2 * DEFAULT_REQUEST_TIMEOUT_SECS);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Screen {
    CategorySelection,
    PrizeSelection(WasteCategory),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionSnapshot {
    pub screen: Screen,
    pub view: ViewState,
    pub record_id: Option<RecordId>,
}

/// What [`KioskSession::next_update`] just applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionUpdate {
    Created(RecordId),
    Resolved(Resolution),
    CountdownTick(u64),
    /// An event from a run that is no longer current.
    Stale,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    #[error("choose a waste category before choosing a prize")]
    NoCategory,
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// One kiosk: the current screen plus at most one redemption run.
pub struct KioskSession<S> {
    service: S,
    config: PollConfig,
    screen: Screen,
    workflow: WorkflowState,
    run: u64,
    active: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
    countdown: Option<Interval>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl<S: RedemptionService> KioskSession<S> {
    pub fn new(service: S, config: PollConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            service,
            config,
            screen: Screen::CategorySelection,
            workflow: WorkflowState::new(config),
            run: 0,
            active: None,
            worker: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            countdown: None,
            events_tx,
            events_rx,
        }
    }

    /// How long [`shutdown`](Self::shutdown) waits for a cancelled worker to wind down.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn view(&self) -> &ViewState {
        self.workflow.view()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            screen: self.screen,
            view: self.workflow.view().clone(),
            record_id: self.workflow.record_id(),
        }
    }

    pub fn countdown_running(&self) -> bool {
        self.countdown.is_some()
    }

    /// Whether a redemption worker is still alive.
    pub fn worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn choose_category(&mut self, category: WasteCategory) -> bool {
        if self.screen != Screen::CategorySelection || !self.workflow.is_idle() {
            return false;
        }
        self.workflow.clear_status();
        self.screen = Screen::PrizeSelection(category);
        true
    }

    pub fn back_to_categories(&mut self) -> bool {
        if !matches!(self.screen, Screen::PrizeSelection(_)) || !self.workflow.is_idle() {
            return false;
        }
        self.screen = Screen::CategorySelection;
        true
    }

    /// Create a record for the chosen prize and start waiting for the sensor.
    pub fn submit_selection(&mut self, prize: Prize) -> Result<(), SessionError> {
        let Screen::PrizeSelection(category) = self.screen else {
            return Err(SessionError::NoCategory);
        };
        let request = RedemptionRequest::new(category, prize);
        self.workflow.begin(request)?;

        self.run += 1;
        let active = CancellationToken::new();
        info!(run = self.run, %category, %prize, "submitting redemption");
        self.worker = Some(tokio::spawn(run_redemption(
            self.service.clone(),
            request,
            self.config,
            self.run,
            active.clone(),
            self.events_tx.clone(),
        )));
        self.active = Some(active);
        self.countdown = Some(time::interval_at(
            Instant::now() + COUNTDOWN_STEP,
            COUNTDOWN_STEP,
        ));
        Ok(())
    }

    /// Abort the current run, mark its record failed and go back to the start.
    ///
    /// Returns `false` if nothing was loading.
    pub async fn cancel(&mut self) -> bool {
        // a record id may already be queued from the worker
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
        let Some(cancelled) = self.workflow.cancel() else {
            return false;
        };
        if let Some(active) = self.active.take() {
            active.cancel();
        }
        self.countdown = None;
        self.screen = Screen::CategorySelection;
        info!(run = self.run, record_id = ?cancelled.record_id, "redemption cancelled by user");

        if let Some(id) = cancelled.record_id
            && let Err(err) = self.service.update_status(id, FinalStatus::Failed).await
        {
            warn!(record_id = %id, error = %err, "failed to mark cancelled record");
        }
        true
    }

    /// Dismiss the result and return to the category screen.
    pub fn close_modal(&mut self) -> bool {
        if !self.workflow.close_modal() {
            return false;
        }
        self.active = None;
        self.worker = None;
        self.screen = Screen::CategorySelection;
        true
    }

    /// Wait for the next worker event or countdown tick and apply it.
    ///
    /// Never resolves while idle.
    pub async fn next_update(&mut self) -> SessionUpdate {
        enum Wake {
            Event(WorkerEvent),
            Tick,
        }

        let wake = tokio::select! {
            Some(event) = self.events_rx.recv() => Wake::Event(event),
            _ = countdown_tick(&mut self.countdown) => Wake::Tick,
        };
        match wake {
            Wake::Event(event) => self.apply(event),
            Wake::Tick => {
                if !self.workflow.tick_countdown() {
                    self.countdown = None;
                }
                SessionUpdate::CountdownTick(self.workflow.view().countdown)
            }
        }
    }

    /// Cancel whatever is in flight before the kiosk exits.
    ///
    /// The worker is given a bounded time to finish, so a record whose
    /// creation is still in flight still gets marked failed.
    pub async fn shutdown(&mut self) {
        self.cancel().await;
        let Some(worker) = self.worker.take() else {
            return;
        };
        match time::timeout(self.shutdown_grace, worker).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(run = self.run, error = %err, "redemption worker failed"),
            Err(_) => warn!(
                run = self.run,
                grace = ?self.shutdown_grace,
                "redemption worker still running at shutdown"
            ),
        }
    }

    fn apply(&mut self, event: WorkerEvent) -> SessionUpdate {
        if event.run != self.run {
            debug!(run = event.run, current = self.run, "dropping event from old run");
            return SessionUpdate::Stale;
        }
        match event.kind {
            WorkerEventKind::Created(poll) => {
                let Some(id) = poll.record_id else {
                    return SessionUpdate::Stale;
                };
                if self.workflow.record_created(poll) {
                    SessionUpdate::Created(id)
                } else {
                    SessionUpdate::Stale
                }
            }
            WorkerEventKind::Resolved(resolution) => {
                if !self.workflow.resolve(&resolution) {
                    return SessionUpdate::Stale;
                }
                info!(run = self.run, ?resolution, "redemption resolved");
                self.countdown = None;
                self.active = None;
                SessionUpdate::Resolved(resolution)
            }
        }
    }
}

async fn countdown_tick(countdown: &mut Option<Interval>) {
    match countdown {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
