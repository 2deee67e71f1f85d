use crate::{
    config::PollConfig,
    redemption::{
        FinalStatus,
        RecordId,
        RedemptionRequest,
        SensorReading,
    },
    service::{
        RedemptionService,
        ServiceError,
    },
    workflow::{
        PollState,
        Resolution,
    },
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    error,
    info,
    warn,
};

/// Terminal result of polling one record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    Verified,
    SensorCancelled,
    TimedOut,
    Failed(ServiceError),
}

impl PollOutcome {
    pub fn resolution(&self) -> Resolution {
        match self {
            PollOutcome::Verified => Resolution::Redeemed,
            PollOutcome::SensorCancelled => Resolution::SensorCancelled,
            PollOutcome::TimedOut => Resolution::TimedOut,
            PollOutcome::Failed(_) => Resolution::PollFailed,
        }
    }

    pub fn final_status(&self) -> FinalStatus {
        match self {
            PollOutcome::Verified => FinalStatus::Complete,
            _ => FinalStatus::Failed,
        }
    }
}

/// Query the record until the sensor answers, the budget runs out or `active` is cancelled.
///
/// The deadline is fixed before polling starts. The next query is only
/// scheduled once the previous one has returned, so queries never overlap.
/// "Not available yet" keeps polling; a failed query ends the loop at once.
/// Returns `None` when cancelled: the caller must not act on anything then.
pub async fn poll_sensor<S: RedemptionService>(
    service: &S,
    id: RecordId,
    deadline: Instant,
    period: Duration,
    active: &CancellationToken,
) -> Option<PollOutcome> {
    let mut attempt: u64 = 0;

    loop {
        if active.is_cancelled() {
            return None;
        }
        if Instant::now() >= deadline {
            info!(record_id = %id, attempts = attempt, "sensor did not answer within budget");
            return Some(PollOutcome::TimedOut);
        }

        attempt += 1;
        let reading = service.check_status(id).await;
        if active.is_cancelled() {
            debug!(record_id = %id, attempt, "discarding sensor response after cancellation");
            return None;
        }

        match reading {
            Ok(SensorReading::Verified) => {
                info!(record_id = %id, attempt, "sensor verified deposit");
                return Some(PollOutcome::Verified);
            }
            Ok(SensorReading::Cancelled) => {
                info!(record_id = %id, attempt, "sensor cancelled deposit");
                return Some(PollOutcome::SensorCancelled);
            }
            Ok(SensorReading::Pending(signal)) => {
                debug!(record_id = %id, attempt, %signal, "sensor still pending");
            }
            Ok(SensorReading::Unavailable) => {
                debug!(record_id = %id, attempt, "sensor response not available yet");
            }
            Err(err) => {
                error!(record_id = %id, attempt, error = %err, "sensor status query failed");
                return Some(PollOutcome::Failed(err));
            }
        }

        let next_tick = (Instant::now() + period).min(deadline);
        tokio::select! {
            biased;
            _ = active.cancelled() => return None,
            _ = time::sleep_until(next_tick) => {}
        }
    }
}

/// Write the outcome back to the record. A failed write is logged, not surfaced.
async fn settle<S: RedemptionService>(
    service: &S,
    id: RecordId,
    outcome: PollOutcome,
    active: &CancellationToken,
) -> Option<PollOutcome> {
    if active.is_cancelled() {
        return None;
    }
    let status = outcome.final_status();
    if let Err(err) = service.update_status(id, status).await {
        warn!(record_id = %id, %status, error = %err, "status write-back failed");
    }
    Some(outcome)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkerEventKind {
    Created(PollState),
    Resolved(Resolution),
}

/// Progress of the redemption run numbered `run`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerEvent {
    pub run: u64,
    pub kind: WorkerEventKind,
}

/// Create the record, poll it to a verdict and report back over `events`.
///
/// Nothing is reported once `active` is cancelled. A record whose creation
/// completes after cancellation is marked failed here, since nobody else
/// knows its id.
pub async fn run_redemption<S: RedemptionService>(
    service: S,
    request: RedemptionRequest,
    config: PollConfig,
    run: u64,
    active: CancellationToken,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let send = |kind| {
        if events.send(WorkerEvent { run, kind }).is_err() {
            debug!(run, "session dropped; redemption event discarded");
        }
    };

    let id = match service.create_record(request).await {
        Ok(id) => id,
        Err(err) => {
            if active.is_cancelled() {
                return;
            }
            if err.is_rejection() {
                warn!(run, error = %err, "service rejected redemption request");
            } else {
                error!(run, error = %err, "redemption request failed");
            }
            send(WorkerEventKind::Resolved(Resolution::from_submission_error(&err)));
            return;
        }
    };

    if active.is_cancelled() {
        warn!(run, record_id = %id, "record created after cancellation; marking it failed");
        if let Err(err) = service.update_status(id, FinalStatus::Failed).await {
            warn!(record_id = %id, error = %err, "failed to mark orphaned record");
        }
        return;
    }

    let poll = PollState::start(id, config.budget, Instant::now());
    info!(
        run,
        record_id = %id,
        ?request,
        max_queries = config.max_queries(),
        "redemption record created; polling sensor"
    );
    send(WorkerEventKind::Created(poll.clone()));

    let Some(outcome) =
        poll_sensor(&service, id, poll.deadline(), config.period, &active).await
    else {
        debug!(run, record_id = %id, "polling stopped by cancellation");
        return;
    };
    let Some(outcome) = settle(&service, id, outcome, &active).await else {
        return;
    };
    send(WorkerEventKind::Resolved(outcome.resolution()));
}
