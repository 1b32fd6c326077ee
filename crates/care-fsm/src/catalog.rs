//! Action catalog: which actions a panel may offer from a given state.
//!
//! Every lookup here is derived from the transition tables, so the catalog
//! and the machines cannot drift apart. All functions are total: an unknown
//! state offers nothing.

use crate::{
    next_care_state, next_emergency_state, CareAction, CareState, EmergencyAction,
    EmergencyState,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Care actions legal from `state`, ignoring any emergency.
pub fn valid_care_actions(state: CareState) -> BTreeSet<CareAction> {
    CareAction::ALL
        .into_iter()
        .filter(|action| next_care_state(state, *action).is_some())
        .collect()
}

/// Emergency actions legal from `state`. Never gated by the care state.
pub fn valid_emergency_actions(state: EmergencyState) -> BTreeSet<EmergencyAction> {
    EmergencyAction::ALL
        .into_iter()
        .filter(|action| next_emergency_state(state, *action).is_some())
        .collect()
}

/// Actions a care panel may render for the combined state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidActions {
    pub care: BTreeSet<CareAction>,
    pub emergency: BTreeSet<EmergencyAction>,
}

impl ValidActions {
    pub fn is_empty(&self) -> bool {
        self.care.is_empty() && self.emergency.is_empty()
    }
}

/// Combined lookup. An active emergency suppresses every care action.
pub fn valid_actions_for_state(care: CareState, emergency: EmergencyState) -> ValidActions {
    let care = if emergency.locks_care() {
        BTreeSet::new()
    } else {
        valid_care_actions(care)
    };

    ValidActions {
        care,
        emergency: valid_emergency_actions(emergency),
    }
}

/// Result of looking up a raw state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireActions {
    Care(BTreeSet<CareAction>),
    Emergency(BTreeSet<EmergencyAction>),
    /// The string named no known state.
    Unknown,
}

impl WireActions {
    pub fn is_empty(&self) -> bool {
        match self {
            WireActions::Care(actions) => actions.is_empty(),
            WireActions::Emergency(actions) => actions.is_empty(),
            WireActions::Unknown => true,
        }
    }

    /// Wire names of the offered actions, in catalog order.
    pub fn wire_names(&self) -> Vec<&'static str> {
        match self {
            WireActions::Care(actions) => actions.iter().map(CareAction::as_wire).collect(),
            WireActions::Emergency(actions) => {
                actions.iter().map(EmergencyAction::as_wire).collect()
            }
            WireActions::Unknown => Vec::new(),
        }
    }
}

/// Lookup by raw state string as received from the backend.
///
/// Care and emergency state names are disjoint, so one string resolves to at
/// most one lifecycle. Unrecognized strings yield `WireActions::Unknown`.
pub fn valid_actions_for_wire_state(raw: &str) -> WireActions {
    if let Ok(state) = raw.parse::<CareState>() {
        return WireActions::Care(valid_care_actions(state));
    }
    if let Ok(state) = raw.parse::<EmergencyState>() {
        return WireActions::Emergency(valid_emergency_actions(state));
    }
    WireActions::Unknown
}
