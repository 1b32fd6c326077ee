//! The two lifecycles a panel reconciles.

use care_dispatch::ActionKind;
use care_fsm::{
    next_emergency_state, valid_care_actions, valid_emergency_actions, CareAction, CareState,
    EmergencyAction, EmergencyState,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Debug;

/// Per-lifecycle behavior the reconciler is generic over.
pub trait Lifecycle {
    type State: Copy + Eq + Debug + Serialize + Send;
    type Action: Copy + Ord + Debug + Serialize + Send + Into<ActionKind>;

    /// Used in log fields.
    const NAME: &'static str;

    /// Catalog lookup for the buttons to render.
    fn valid_actions(state: Self::State) -> BTreeSet<Self::Action>;

    /// State to show before the backend answers. `None` means wait.
    fn optimistic_guess(_state: Self::State, _action: Self::Action) -> Option<Self::State> {
        None
    }
}

/// Care session lifecycle. Never guesses.
#[derive(Debug, Clone, Copy)]
pub struct CareLifecycle;

impl Lifecycle for CareLifecycle {
    type State = CareState;
    type Action = CareAction;

    const NAME: &'static str = "care";

    fn valid_actions(state: CareState) -> BTreeSet<CareAction> {
        valid_care_actions(state)
    }
}

/// Emergency lifecycle. Reporting an emergency shows `PENDING` immediately.
#[derive(Debug, Clone, Copy)]
pub struct EmergencyLifecycle;

impl Lifecycle for EmergencyLifecycle {
    type State = EmergencyState;
    type Action = EmergencyAction;

    const NAME: &'static str = "emergency";

    fn valid_actions(state: EmergencyState) -> BTreeSet<EmergencyAction> {
        valid_emergency_actions(state)
    }

    fn optimistic_guess(state: EmergencyState, action: EmergencyAction) -> Option<EmergencyState> {
        match action {
            EmergencyAction::TriggerEmergency => next_emergency_state(state, action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_care_actions_never_guess() {
        for state in CareState::ALL {
            for action in CareAction::ALL {
                assert_eq!(CareLifecycle::optimistic_guess(state, action), None);
            }
        }
    }

    #[test]
    fn test_only_trigger_guesses() {
        assert_eq!(
            EmergencyLifecycle::optimistic_guess(
                EmergencyState::None,
                EmergencyAction::TriggerEmergency
            ),
            Some(EmergencyState::Pending)
        );
        assert_eq!(
            EmergencyLifecycle::optimistic_guess(
                EmergencyState::Pending,
                EmergencyAction::AcknowledgeEmergency
            ),
            None
        );
    }
}
