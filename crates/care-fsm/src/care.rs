//! Care session lifecycle.
//!
//! ## State Diagram
//!
//! ```text
//! NotStarted ──StartPreparation──► InPreparation ──StartCare──► InProgress
//!     ▲                                 │                      │      ▲
//!     └──────── CancelPreparation ──────┘            PauseCare │      │ ResumeCare
//!                                                              ▼      │
//!                          BeginCompletion (from InProgress or Paused)  Paused
//!                                                              │
//!                                                              ▼
//!                         Completing ──ConfirmCompletion──► Completed (terminal)
//!                             │
//!                             └──ResumeCare──► InProgress
//! ```

use crate::UnknownVariant;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub care_machine(NotStarted)

    NotStarted => {
        StartPreparation => InPreparation
    },
    InPreparation => {
        StartCare => InProgress,
        CancelPreparation => NotStarted
    },
    InProgress => {
        PauseCare => Paused,
        BeginCompletion => Completing
    },
    Paused => {
        ResumeCare => InProgress,
        BeginCompletion => Completing
    },
    Completing => {
        ConfirmCompletion => Completed,
        ResumeCare => InProgress
    }
}

pub use care_machine::Input as CareMachineInput;
pub use care_machine::State as CareMachineState;
pub use care_machine::StateMachine as CareMachine;

/// Care session state as cached from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareState {
    NotStarted,
    InPreparation,
    InProgress,
    Paused,
    Completing,
    Completed,
}

impl CareState {
    pub const ALL: [CareState; 6] = [
        CareState::NotStarted,
        CareState::InPreparation,
        CareState::InProgress,
        CareState::Paused,
        CareState::Completing,
        CareState::Completed,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            CareState::NotStarted => "NOT_STARTED",
            CareState::InPreparation => "IN_PREPARATION",
            CareState::InProgress => "IN_PROGRESS",
            CareState::Paused => "PAUSED",
            CareState::Completing => "COMPLETING",
            CareState::Completed => "COMPLETED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CareState::NotStarted => "Not started",
            CareState::InPreparation => "Preparing",
            CareState::InProgress => "Care in progress",
            CareState::Paused => "Paused",
            CareState::Completing => "Wrapping up",
            CareState::Completed => "Completed",
        }
    }

    /// No action leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CareState::Completed)
    }
}

impl fmt::Display for CareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for CareState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CareState::ALL
            .into_iter()
            .find(|state| state.as_wire() == s.trim())
            .ok_or_else(|| UnknownVariant::new("care state", s))
    }
}

impl From<CareMachineState> for CareState {
    fn from(state: CareMachineState) -> Self {
        match state {
            CareMachineState::NotStarted => CareState::NotStarted,
            CareMachineState::InPreparation => CareState::InPreparation,
            CareMachineState::InProgress => CareState::InProgress,
            CareMachineState::Paused => CareState::Paused,
            CareMachineState::Completing => CareState::Completing,
            CareMachineState::Completed => CareState::Completed,
        }
    }
}

impl From<CareState> for CareMachineState {
    fn from(state: CareState) -> Self {
        match state {
            CareState::NotStarted => CareMachineState::NotStarted,
            CareState::InPreparation => CareMachineState::InPreparation,
            CareState::InProgress => CareMachineState::InProgress,
            CareState::Paused => CareMachineState::Paused,
            CareState::Completing => CareMachineState::Completing,
            CareState::Completed => CareMachineState::Completed,
        }
    }
}

/// A proposed care session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareAction {
    StartPreparation,
    CancelPreparation,
    StartCare,
    PauseCare,
    ResumeCare,
    BeginCompletion,
    ConfirmCompletion,
}

impl CareAction {
    pub const ALL: [CareAction; 7] = [
        CareAction::StartPreparation,
        CareAction::CancelPreparation,
        CareAction::StartCare,
        CareAction::PauseCare,
        CareAction::ResumeCare,
        CareAction::BeginCompletion,
        CareAction::ConfirmCompletion,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            CareAction::StartPreparation => "START_PREPARATION",
            CareAction::CancelPreparation => "CANCEL_PREPARATION",
            CareAction::StartCare => "START_CARE",
            CareAction::PauseCare => "PAUSE_CARE",
            CareAction::ResumeCare => "RESUME_CARE",
            CareAction::BeginCompletion => "BEGIN_COMPLETION",
            CareAction::ConfirmCompletion => "CONFIRM_COMPLETION",
        }
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            CareAction::StartPreparation => "Start preparation",
            CareAction::CancelPreparation => "Cancel preparation",
            CareAction::StartCare => "Start care",
            CareAction::PauseCare => "Pause",
            CareAction::ResumeCare => "Resume",
            CareAction::BeginCompletion => "Finish visit",
            CareAction::ConfirmCompletion => "Confirm completion",
        }
    }

    /// Label shown while the dispatch is in flight.
    pub fn pending_label(&self) -> &'static str {
        match self {
            CareAction::StartPreparation => "Starting preparation...",
            CareAction::CancelPreparation => "Cancelling...",
            CareAction::StartCare => "Starting care...",
            CareAction::PauseCare => "Pausing...",
            CareAction::ResumeCare => "Resuming...",
            CareAction::BeginCompletion => "Finishing...",
            CareAction::ConfirmCompletion => "Confirming...",
        }
    }
}

impl fmt::Display for CareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for CareAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CareAction::ALL
            .into_iter()
            .find(|action| action.as_wire() == s.trim())
            .ok_or_else(|| UnknownVariant::new("care action", s))
    }
}

impl From<CareAction> for CareMachineInput {
    fn from(action: CareAction) -> Self {
        match action {
            CareAction::StartPreparation => CareMachineInput::StartPreparation,
            CareAction::CancelPreparation => CareMachineInput::CancelPreparation,
            CareAction::StartCare => CareMachineInput::StartCare,
            CareAction::PauseCare => CareMachineInput::PauseCare,
            CareAction::ResumeCare => CareMachineInput::ResumeCare,
            CareAction::BeginCompletion => CareMachineInput::BeginCompletion,
            CareAction::ConfirmCompletion => CareMachineInput::ConfirmCompletion,
        }
    }
}

/// Table lookup: the state `action` leads to from `state`, if legal.
pub fn next_care_state(state: CareState, action: CareAction) -> Option<CareState> {
    <care_machine::Impl as StateMachineImpl>::transition(&state.into(), &action.into())
        .map(CareState::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_not_started() {
        let machine = CareMachine::new();
        assert_eq!(*machine.state(), CareMachineState::NotStarted);
    }

    #[test]
    fn test_full_visit_flow() {
        let mut machine = CareMachine::new();

        machine.consume(&CareMachineInput::StartPreparation).unwrap();
        machine.consume(&CareMachineInput::StartCare).unwrap();
        machine.consume(&CareMachineInput::PauseCare).unwrap();
        assert_eq!(*machine.state(), CareMachineState::Paused);

        machine.consume(&CareMachineInput::ResumeCare).unwrap();
        machine.consume(&CareMachineInput::BeginCompletion).unwrap();
        machine.consume(&CareMachineInput::ConfirmCompletion).unwrap();
        assert_eq!(*machine.state(), CareMachineState::Completed);
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut machine = CareMachine::new();
        machine.consume(&CareMachineInput::StartPreparation).unwrap();
        machine.consume(&CareMachineInput::StartCare).unwrap();
        machine.consume(&CareMachineInput::BeginCompletion).unwrap();
        machine.consume(&CareMachineInput::ConfirmCompletion).unwrap();

        for action in CareAction::ALL {
            assert!(machine.consume(&action.into()).is_err());
        }
    }

    #[test]
    fn test_cannot_skip_preparation() {
        let mut machine = CareMachine::new();
        assert!(machine.consume(&CareMachineInput::StartCare).is_err());
        assert_eq!(*machine.state(), CareMachineState::NotStarted);
    }

    #[test]
    fn test_next_care_state_lookup() {
        assert_eq!(
            next_care_state(CareState::NotStarted, CareAction::StartPreparation),
            Some(CareState::InPreparation)
        );
        assert_eq!(
            next_care_state(CareState::Completing, CareAction::ResumeCare),
            Some(CareState::InProgress)
        );
        assert_eq!(
            next_care_state(CareState::NotStarted, CareAction::PauseCare),
            None
        );
    }

    #[test]
    fn test_machine_state_conversion_is_lossless() {
        for state in CareState::ALL {
            let machine_state: CareMachineState = state.into();
            assert_eq!(CareState::from(machine_state), state);
        }
    }

    #[test]
    fn test_wire_names_match_serde() {
        for state in CareState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_wire()));
            assert_eq!(state.as_wire().parse::<CareState>().unwrap(), state);
        }
        for action in CareAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_wire()));
            assert_eq!(action.as_wire().parse::<CareAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_wire_state_is_rejected() {
        let err = "ON_HOLD".parse::<CareState>().unwrap_err();
        assert_eq!(err.kind, "care state");
        assert_eq!(err.value, "ON_HOLD");
    }

    #[test]
    fn test_only_completed_is_terminal() {
        let terminal: Vec<_> = CareState::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![CareState::Completed]);
    }
}
