//! Optimistic reconciliation for care panels.
//!
//! A panel holds a cached copy of the resident's care and emergency state.
//! Clicking an action moves the matching `Reconciler` from `Idle` to
//! `Pending`, the dispatcher makes one backend call, and the response moves
//! it back. External observations (another actor's transition) always win:
//! they replace the cache and clear a pending dispatch they supersede.
//!
//! ```text
//! Idle ──begin──► Pending ──Accepted──► Reconciling ──observe(v >= new)──► Idle
//!                    │  └──Blocked / Failed──► Idle
//!                    └──observe(version advanced)──► Idle (response discarded)
//! ```

mod block;
mod controller;
mod lifecycle;
mod reconciler;
mod view;

pub use block::BlockPresentation;
pub use controller::{ActionController, PanelCallback};
pub use lifecycle::{CareLifecycle, EmergencyLifecycle, Lifecycle};
pub use reconciler::{
    BeginRejected, Completion, Observation, PendingDispatch, Phase, Reconciler, Ticket,
};
pub use view::{LifecycleView, PanelView};

#[cfg(test)]
mod tests;
