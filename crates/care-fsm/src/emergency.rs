//! Emergency lifecycle.
//!
//! Independent of the care session: its own state, its own version counter,
//! and its actions are never gated by the care state.
//!
//! ```text
//! None ──TriggerEmergency──► Pending ──AcknowledgeEmergency──► Active ──ResolveEmergency──► Resolved
//!  ▲                            │
//!  └──────CancelEmergency───────┘
//! ```

use crate::UnknownVariant;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub emergency_machine(Idle)

    Idle => {
        TriggerEmergency => Pending
    },
    Pending => {
        AcknowledgeEmergency => Active,
        CancelEmergency => Idle
    },
    Active => {
        ResolveEmergency => Resolved
    }
}

pub use emergency_machine::Input as EmergencyMachineInput;
pub use emergency_machine::State as EmergencyMachineState;
pub use emergency_machine::StateMachine as EmergencyMachine;

/// Emergency handling state as cached from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyState {
    None,
    Pending,
    Active,
    Resolved,
}

impl EmergencyState {
    pub const ALL: [EmergencyState; 4] = [
        EmergencyState::None,
        EmergencyState::Pending,
        EmergencyState::Active,
        EmergencyState::Resolved,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            EmergencyState::None => "NONE",
            EmergencyState::Pending => "PENDING",
            EmergencyState::Active => "ACTIVE",
            EmergencyState::Resolved => "RESOLVED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmergencyState::None => "No emergency",
            EmergencyState::Pending => "Emergency reported",
            EmergencyState::Active => "Emergency in progress",
            EmergencyState::Resolved => "Emergency resolved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EmergencyState::Resolved)
    }

    /// While an emergency is active, no care action may be offered.
    pub fn locks_care(&self) -> bool {
        matches!(self, EmergencyState::Active)
    }
}

impl fmt::Display for EmergencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for EmergencyState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmergencyState::ALL
            .into_iter()
            .find(|state| state.as_wire() == s.trim())
            .ok_or_else(|| UnknownVariant::new("emergency state", s))
    }
}

impl From<EmergencyMachineState> for EmergencyState {
    fn from(state: EmergencyMachineState) -> Self {
        match state {
            EmergencyMachineState::Idle => EmergencyState::None,
            EmergencyMachineState::Pending => EmergencyState::Pending,
            EmergencyMachineState::Active => EmergencyState::Active,
            EmergencyMachineState::Resolved => EmergencyState::Resolved,
        }
    }
}

impl From<EmergencyState> for EmergencyMachineState {
    fn from(state: EmergencyState) -> Self {
        match state {
            EmergencyState::None => EmergencyMachineState::Idle,
            EmergencyState::Pending => EmergencyMachineState::Pending,
            EmergencyState::Active => EmergencyMachineState::Active,
            EmergencyState::Resolved => EmergencyMachineState::Resolved,
        }
    }
}

/// A proposed emergency transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyAction {
    TriggerEmergency,
    AcknowledgeEmergency,
    CancelEmergency,
    ResolveEmergency,
}

impl EmergencyAction {
    pub const ALL: [EmergencyAction; 4] = [
        EmergencyAction::TriggerEmergency,
        EmergencyAction::AcknowledgeEmergency,
        EmergencyAction::CancelEmergency,
        EmergencyAction::ResolveEmergency,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            EmergencyAction::TriggerEmergency => "TRIGGER_EMERGENCY",
            EmergencyAction::AcknowledgeEmergency => "ACKNOWLEDGE_EMERGENCY",
            EmergencyAction::CancelEmergency => "CANCEL_EMERGENCY",
            EmergencyAction::ResolveEmergency => "RESOLVE_EMERGENCY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmergencyAction::TriggerEmergency => "Report emergency",
            EmergencyAction::AcknowledgeEmergency => "Acknowledge",
            EmergencyAction::CancelEmergency => "False alarm",
            EmergencyAction::ResolveEmergency => "Mark resolved",
        }
    }

    pub fn pending_label(&self) -> &'static str {
        match self {
            EmergencyAction::TriggerEmergency => "Reporting...",
            EmergencyAction::AcknowledgeEmergency => "Acknowledging...",
            EmergencyAction::CancelEmergency => "Cancelling...",
            EmergencyAction::ResolveEmergency => "Resolving...",
        }
    }
}

impl fmt::Display for EmergencyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for EmergencyAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmergencyAction::ALL
            .into_iter()
            .find(|action| action.as_wire() == s.trim())
            .ok_or_else(|| UnknownVariant::new("emergency action", s))
    }
}

impl From<EmergencyAction> for EmergencyMachineInput {
    fn from(action: EmergencyAction) -> Self {
        match action {
            EmergencyAction::TriggerEmergency => EmergencyMachineInput::TriggerEmergency,
            EmergencyAction::AcknowledgeEmergency => EmergencyMachineInput::AcknowledgeEmergency,
            EmergencyAction::CancelEmergency => EmergencyMachineInput::CancelEmergency,
            EmergencyAction::ResolveEmergency => EmergencyMachineInput::ResolveEmergency,
        }
    }
}

/// Table lookup: the state `action` leads to from `state`, if legal.
pub fn next_emergency_state(
    state: EmergencyState,
    action: EmergencyAction,
) -> Option<EmergencyState> {
    <emergency_machine::Impl as StateMachineImpl>::transition(&state.into(), &action.into())
        .map(EmergencyState::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_none() {
        let machine = EmergencyMachine::new();
        assert_eq!(
            EmergencyState::from(*machine.state()),
            EmergencyState::None
        );
    }

    #[test]
    fn test_trigger_acknowledge_resolve() {
        let mut machine = EmergencyMachine::new();

        machine
            .consume(&EmergencyMachineInput::TriggerEmergency)
            .unwrap();
        assert_eq!(*machine.state(), EmergencyMachineState::Pending);

        machine
            .consume(&EmergencyMachineInput::AcknowledgeEmergency)
            .unwrap();
        assert_eq!(*machine.state(), EmergencyMachineState::Active);

        machine
            .consume(&EmergencyMachineInput::ResolveEmergency)
            .unwrap();
        assert_eq!(*machine.state(), EmergencyMachineState::Resolved);
    }

    #[test]
    fn test_false_alarm_returns_to_none() {
        assert_eq!(
            next_emergency_state(EmergencyState::Pending, EmergencyAction::CancelEmergency),
            Some(EmergencyState::None)
        );
    }

    #[test]
    fn test_active_cannot_be_cancelled() {
        assert_eq!(
            next_emergency_state(EmergencyState::Active, EmergencyAction::CancelEmergency),
            None
        );
    }

    #[test]
    fn test_only_active_locks_care() {
        let locking: Vec<_> = EmergencyState::ALL
            .into_iter()
            .filter(|s| s.locks_care())
            .collect();
        assert_eq!(locking, vec![EmergencyState::Active]);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for state in EmergencyState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_wire()));
            assert_eq!(state.as_wire().parse::<EmergencyState>().unwrap(), state);
        }
        for action in EmergencyAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_wire()));
        }
    }
}
