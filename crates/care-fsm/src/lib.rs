//! Care and emergency lifecycles.
//!
//! This crate provides:
//! - The care session and emergency transition tables (rust-fsm machines)
//! - Typed, wire-compatible state and action enums with exhaustive labels
//! - The action catalog deciding which actions a panel may offer
//!
//! Nothing here is an authorization check. The backend re-validates every
//! dispatched action against its own copy of the state.

mod care;
mod catalog;
mod emergency;
mod error;

pub use care::care_machine;
pub use care::{next_care_state, CareAction, CareMachine, CareMachineInput, CareMachineState, CareState};
pub use catalog::{
    valid_actions_for_state, valid_actions_for_wire_state, valid_care_actions,
    valid_emergency_actions, ValidActions, WireActions,
};
pub use emergency::emergency_machine;
pub use emergency::{
    next_emergency_state, EmergencyAction, EmergencyMachine, EmergencyMachineInput,
    EmergencyMachineState, EmergencyState,
};
pub use error::UnknownVariant;
