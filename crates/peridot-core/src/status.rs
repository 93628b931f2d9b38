//! Job status enums, the aggregate status record and partial status updates.

use chrono::{DateTime, Utc};

use crate::CoreError;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// No Start request has been received yet.
    #[default]
    Startup,
    /// The task runner is doing work.
    Running,
    /// The job is finished, successfully or not.
    Stopped,
}

impl RunStatus {
    /// Returns true if the job is in its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` keeps the run state
    /// monotonic (Startup -> Running -> Stopped, or Startup -> Stopped).
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (Self::Startup, _) => true,
            (Self::Running, Self::Running | Self::Stopped) => true,
            (Self::Running, Self::Startup) => false,
            (Self::Stopped, _) => false,
        }
    }
}

/// Health of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    #[default]
    Ok,
    Error,
}

/// Cooperative cancellation state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CancelStatus {
    #[default]
    NoCancel,
    CancelRequested,
    Cancelled,
}

/// Authoritative status of a job, owned by the job coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateStatus {
    pub run: RunStatus,
    pub health: HealthStatus,
    pub cancel: CancelStatus,

    /// When the job (stream) started.
    pub started: DateTime<Utc>,

    /// When the job reached Stopped. Unset until then.
    pub finished: Option<DateTime<Utc>>,

    /// Output text accumulated over the job's lifetime.
    pub output_messages: String,

    /// Error text accumulated over the job's lifetime.
    pub error_messages: String,
}

impl AggregateStatus {
    /// Create the initial status of a job started at `started`.
    pub fn new(started: DateTime<Utc>) -> Self {
        Self {
            run: RunStatus::Startup,
            health: HealthStatus::Ok,
            cancel: CancelStatus::NoCancel,
            started,
            finished: None,
            output_messages: String::new(),
            error_messages: String::new(),
        }
    }

    /// Returns true once the job has reached Stopped.
    pub fn is_stopped(&self) -> bool {
        self.run.is_terminal()
    }

    /// Apply a partial update.
    ///
    /// Fields left as `None` are unchanged and message fields are appended.
    /// An update that would move the run state backwards (or report a second
    /// Stopped) is rejected as a whole and leaves the status untouched.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<(), CoreError> {
        if let Some(next) = update.run {
            if !self.run.can_transition_to(next) {
                return Err(CoreError::InvalidStateTransition {
                    from: self.run,
                    to: next,
                });
            }
            if next == RunStatus::Stopped {
                self.finished = Some(update.now);
            }
            self.run = next;
        }
        if let Some(health) = update.health {
            self.health = health;
        }
        if let Some(cancel) = update.cancel {
            self.cancel = cancel;
        }
        self.output_messages.push_str(&update.output);
        self.error_messages.push_str(&update.error);
        Ok(())
    }
}

/// Partial status update sent by a task runner to its coordinator.
///
/// `None` means "leave the current value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub run: Option<RunStatus>,
    pub health: Option<HealthStatus>,
    pub cancel: Option<CancelStatus>,

    /// When the update was produced; becomes `finished` on Stopped.
    pub now: DateTime<Utc>,

    /// Output text to append.
    pub output: String,

    /// Error text to append.
    pub error: String,
}

impl StatusUpdate {
    fn empty() -> Self {
        Self {
            run: None,
            health: None,
            cancel: None,
            now: Utc::now(),
            output: String::new(),
            error: String::new(),
        }
    }

    /// The task runner has begun real work.
    pub fn running() -> Self {
        Self {
            run: Some(RunStatus::Running),
            ..Self::empty()
        }
    }

    /// Successful completion; health is left unchanged.
    pub fn stopped(output: impl Into<String>) -> Self {
        Self {
            run: Some(RunStatus::Stopped),
            output: output.into(),
            ..Self::empty()
        }
    }

    /// Terminal failure carrying a human-readable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            run: Some(RunStatus::Stopped),
            health: Some(HealthStatus::Error),
            error: message.into(),
            ..Self::empty()
        }
    }

    /// Terminal failure after the job observed a cancel request.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            cancel: Some(CancelStatus::Cancelled),
            ..Self::failed(message)
        }
    }

    /// The controller asked for the job to be cancelled.
    pub fn cancel_requested() -> Self {
        Self {
            cancel: Some(CancelStatus::CancelRequested),
            ..Self::empty()
        }
    }

    /// Returns true if this update moves the job to Stopped.
    pub fn is_terminal(&self) -> bool {
        self.run == Some(RunStatus::Stopped)
    }
}
