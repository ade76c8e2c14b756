//! Finite state machine for a single deploy attempt

use serde::{Deserialize, Serialize};

/// Deploy attempt state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    /// Command picked up, nothing checked yet
    Received,

    /// Parsing and checking the requester
    Validating,

    /// Looking up pipeline, environment and application
    Resolving,

    /// Waiting on the platform's atomic lock-and-submit
    Locking,

    /// Lock granted, build being accepted
    Submitting,

    /// Lock contended, attempt handed to the retry scheduler
    Retrying,

    /// Bad input or unresolvable target
    Rejected,

    /// More than one candidate application
    AmbiguousRejected,

    /// Build submitted
    Completed,

    /// Platform refused the deploy or failed unexpectedly
    Errored,

    /// Command already finalized by another attempt
    ExpiredNoop,
}

impl DeployState {
    /// True when the attempt has nothing left to do
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployState::Retrying
                | DeployState::Rejected
                | DeployState::AmbiguousRejected
                | DeployState::Completed
                | DeployState::Errored
                | DeployState::ExpiredNoop
        )
    }
}

/// Deploy attempt event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Start checking the command
    Validate,

    /// Command already processed
    AlreadyProcessed,

    /// Input accepted
    Validated,

    /// Input refused
    Reject(String),

    /// Target application found
    Resolved,

    /// Several applications matched
    Ambiguous,

    /// Platform granted the lock
    LockGranted,

    /// Lock held elsewhere and a retry was scheduled
    LockContended,

    /// Build accepted
    Submitted,

    /// Platform refused or failed
    Fail(String),
}

/// Deploy attempt FSM
#[derive(Debug, Clone)]
pub struct DeployFsm {
    state: DeployState,
    error: Option<String>,
    history: Vec<DeployState>,
}

impl DeployFsm {
    pub fn new() -> Self {
        Self {
            state: DeployState::Received,
            error: None,
            history: vec![DeployState::Received],
        }
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Reason recorded by the last rejecting or failing event
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[DeployState] {
        &self.history
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<DeployState, String> {
        let new_state = match (self.state, &event) {
            (DeployState::Received, DeployEvent::Validate) => DeployState::Validating,
            (DeployState::Received, DeployEvent::AlreadyProcessed) => DeployState::ExpiredNoop,
            (DeployState::Received, DeployEvent::Fail(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Errored
            }

            (DeployState::Validating, DeployEvent::Validated) => DeployState::Resolving,
            (DeployState::Validating, DeployEvent::Reject(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Rejected
            }

            (DeployState::Resolving, DeployEvent::Resolved) => DeployState::Locking,
            (DeployState::Resolving, DeployEvent::Ambiguous) => DeployState::AmbiguousRejected,
            (DeployState::Resolving, DeployEvent::Reject(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Rejected
            }
            (DeployState::Resolving, DeployEvent::Fail(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Errored
            }

            (DeployState::Locking, DeployEvent::LockGranted) => DeployState::Submitting,
            (DeployState::Locking, DeployEvent::LockContended) => DeployState::Retrying,
            (DeployState::Locking, DeployEvent::Fail(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Errored
            }

            (DeployState::Submitting, DeployEvent::Submitted) => DeployState::Completed,
            (DeployState::Submitting, DeployEvent::Fail(reason)) => {
                self.error = Some(reason.clone());
                DeployState::Errored
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        self.history.push(new_state);
        Ok(new_state)
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}
