use std::fmt;

use serde::{Deserialize, Serialize};

use super::unit::WorkUnit;
use crate::error::BatchError;

/// Lifecycle states of a single work unit.
///
/// Each unit flows through: PENDING → UPLOADED → SUBMITTED → POLLING → SUCCEEDED,
/// and may drop to FAILED from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Pending,
    Uploaded,
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Pending => write!(f, "PENDING"),
            UnitState::Uploaded => write!(f, "UPLOADED"),
            UnitState::Submitted => write!(f, "SUBMITTED"),
            UnitState::Polling => write!(f, "POLLING"),
            UnitState::Succeeded => write!(f, "SUCCEEDED"),
            UnitState::Failed => write!(f, "FAILED"),
        }
    }
}

/// What happened in the current stage of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    /// The input file was accepted; carries the file reference.
    Uploaded(String),
    /// A job was created; carries the job id.
    Submitted(String),
    /// Polling has started.
    PollingStarted,
    /// The job finished and the artifact was stored.
    Succeeded,
    /// The stage failed; carries the error text.
    Failed(String),
}

/// Applies [`UnitEvent`]s to a [`WorkUnit`], rejecting out-of-order transitions.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next state for `unit`.
    ///
    /// - Each success event is only valid from its predecessor state.
    /// - `Failed` is valid from any non-terminal state.
    /// - Terminal states accept nothing.
    pub fn advance(unit: &mut WorkUnit, event: UnitEvent) -> Result<UnitState, BatchError> {
        let next = match (unit.state, &event) {
            (UnitState::Pending, UnitEvent::Uploaded(_)) => UnitState::Uploaded,
            (UnitState::Uploaded, UnitEvent::Submitted(_)) => UnitState::Submitted,
            (UnitState::Submitted, UnitEvent::PollingStarted) => UnitState::Polling,
            (UnitState::Polling, UnitEvent::Succeeded) => UnitState::Succeeded,
            (state, UnitEvent::Failed(_)) if !state.is_terminal() => UnitState::Failed,
            (state, event) => {
                return Err(BatchError::InvalidTransition {
                    index: unit.index,
                    from: state,
                    to: Self::target_of(event),
                });
            }
        };

        match event {
            UnitEvent::Uploaded(file_id) => unit.file_id = Some(file_id),
            UnitEvent::Submitted(job_id) => unit.job_id = Some(job_id),
            UnitEvent::Failed(reason) => unit.error = Some(reason),
            UnitEvent::PollingStarted | UnitEvent::Succeeded => {}
        }

        unit.state_history.push(unit.state);
        unit.state = next;
        Ok(next)
    }

    fn target_of(event: &UnitEvent) -> UnitState {
        match event {
            UnitEvent::Uploaded(_) => UnitState::Uploaded,
            UnitEvent::Submitted(_) => UnitState::Submitted,
            UnitEvent::PollingStarted => UnitState::Polling,
            UnitEvent::Succeeded => UnitState::Succeeded,
            UnitEvent::Failed(_) => UnitState::Failed,
        }
    }
}
