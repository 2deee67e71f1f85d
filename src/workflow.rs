//! Local state of one redemption run.
//!
//! `WorkflowState` is the single owner of everything the screen shows while a
//! redemption is in flight. Every transition goes through one of its methods,
//! each of which checks that the run is still loading before it mutates
//! anything, so a late event can never reopen a finished run.

use crate::{
    config::PollConfig,
    redemption::{
        FinalStatus,
        RecordId,
        RedemptionRequest,
    },
    service::ServiceError,
};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const SUCCESS_MESSAGE: &str =
    "🎉🎉Congratulations!🎉🎉\nYour prize has been successfully redeemed.";
pub const SENSOR_CANCELLED_MESSAGE: &str = "The process was cancelled. Please try again.";
pub const TIMEOUT_MESSAGE: &str = "No response received. Status set to \"Failed\".";
pub const POLL_ERROR_MESSAGE: &str = "An error occurred while checking the sensor response.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred. Please try again.";
pub const USER_CANCELLED_STATUS: &str = "Redemption cancelled.";

/// How a run ended, as far as the user is concerned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    Redeemed,
    SensorCancelled,
    TimedOut,
    PollFailed,
    SubmissionRejected(String),
    SubmissionFailed,
}

impl Resolution {
    pub fn from_submission_error(err: &ServiceError) -> Self {
        match err {
            ServiceError::Rejected(message) => Resolution::SubmissionRejected(message.clone()),
            _ => Resolution::SubmissionFailed,
        }
    }

    pub fn modal_message(&self) -> String {
        match self {
            Resolution::Redeemed => SUCCESS_MESSAGE.to_string(),
            Resolution::SensorCancelled => SENSOR_CANCELLED_MESSAGE.to_string(),
            Resolution::TimedOut => TIMEOUT_MESSAGE.to_string(),
            Resolution::PollFailed => POLL_ERROR_MESSAGE.to_string(),
            Resolution::SubmissionRejected(message) => format!("Error: {message}"),
            Resolution::SubmissionFailed => UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn celebrates(&self) -> bool {
        matches!(self, Resolution::Redeemed)
    }

    /// Status written back to the record. Submission failures have no record.
    pub fn write_back(&self) -> Option<FinalStatus> {
        match self {
            Resolution::Redeemed => Some(FinalStatus::Complete),
            Resolution::SensorCancelled | Resolution::TimedOut | Resolution::PollFailed => {
                Some(FinalStatus::Failed)
            }
            Resolution::SubmissionRejected(_) | Resolution::SubmissionFailed => None,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ViewState {
    pub loading: bool,
    pub status_message: String,
    pub modal_visible: bool,
    pub modal_message: String,
    /// Seconds left on the visible countdown.
    pub countdown: u64,
    pub celebrate: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollState {
    pub record_id: Option<RecordId>,
    pub budget: Duration,
    pub started_at: Instant,
    pub is_polling: bool,
}

impl PollState {
    /// Polling of `id` begins at `now`; the deadline is fixed from here on.
    pub fn start(id: RecordId, budget: Duration, now: Instant) -> Self {
        Self {
            record_id: Some(id),
            budget,
            started_at: now,
            is_polling: true,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.budget
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum WorkflowError {
    #[error("a redemption is already in progress")]
    AlreadyLoading,
    #[error("the previous result has not been acknowledged yet")]
    ModalOpen,
}

/// Returned by [`WorkflowState::cancel`] when there was a run to cancel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CancelledRun {
    pub record_id: Option<RecordId>,
}

#[derive(Clone, Debug)]
pub struct WorkflowState {
    config: PollConfig,
    view: ViewState,
    poll: Option<PollState>,
}

impl WorkflowState {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            view: ViewState::default(),
            poll: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn poll(&self) -> Option<&PollState> {
        self.poll.as_ref()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.poll.as_ref().and_then(|p| p.record_id)
    }

    pub fn is_idle(&self) -> bool {
        !self.view.loading && !self.view.modal_visible
    }

    /// Enter loading for a new submission and reset the countdown.
    pub fn begin(&mut self, request: RedemptionRequest) -> Result<(), WorkflowError> {
        if self.view.loading {
            return Err(WorkflowError::AlreadyLoading);
        }
        if self.view.modal_visible {
            return Err(WorkflowError::ModalOpen);
        }
        self.poll = None;
        self.view = ViewState {
            loading: true,
            status_message: request.waste_category.waiting_message().to_string(),
            countdown: self.config.countdown_start(),
            ..ViewState::default()
        };
        self.check_invariants();
        Ok(())
    }

    /// The service accepted the request and the worker started polling it.
    pub fn record_created(&mut self, poll: PollState) -> bool {
        if !self.view.loading {
            return false;
        }
        self.poll = Some(poll);
        true
    }

    /// Apply a terminal outcome. Returns `false` if the run already ended.
    pub fn resolve(&mut self, resolution: &Resolution) -> bool {
        if !self.view.loading {
            return false;
        }
        if let Some(poll) = self.poll.as_mut() {
            poll.is_polling = false;
        }
        self.view.loading = false;
        self.view.modal_message = resolution.modal_message();
        self.view.modal_visible = true;
        self.view.celebrate = resolution.celebrates();
        self.check_invariants();
        true
    }

    /// Stop loading on user request, handing back the record to mark failed.
    pub fn cancel(&mut self) -> Option<CancelledRun> {
        if !self.view.loading {
            return None;
        }
        let record_id = self.poll.take().and_then(|p| p.record_id);
        self.view = ViewState {
            status_message: USER_CANCELLED_STATUS.to_string(),
            ..ViewState::default()
        };
        self.check_invariants();
        Some(CancelledRun { record_id })
    }

    /// Acknowledge the result modal and drop every trace of the run.
    pub fn close_modal(&mut self) -> bool {
        if !self.view.modal_visible {
            return false;
        }
        self.poll = None;
        self.view = ViewState::default();
        true
    }

    /// Forget the status line left over from a cancelled run.
    pub fn clear_status(&mut self) {
        if !self.view.loading {
            self.view.status_message.clear();
        }
    }

    /// One second passed on the visible countdown. Returns whether it should keep ticking.
    pub fn tick_countdown(&mut self) -> bool {
        if !self.view.loading {
            return false;
        }
        self.view.countdown = self.view.countdown.saturating_sub(1);
        self.view.countdown > 0
    }

    fn check_invariants(&self) {
        debug_assert!(
            !(self.view.loading && self.view.modal_visible),
            "loading and modal are mutually exclusive"
        );
    }
}

/// `m:ss`, as shown under the loading spinner.
pub fn format_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
