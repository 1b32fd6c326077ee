//! Dispatcher for care and emergency actions.
//!
//! # Architecture
//!
//! ```text
//! panel ─► ActionRequest ─► ActionDispatcher ─► backend RPC (or DemoAuthority)
//!                                  │
//!                                  ▼
//!          DispatchOutcome::{Accepted, PolicyBlocked, Failed}
//! ```
//!
//! # Design Principles
//!
//! - **One call per dispatch**: no retry loop, a retry is a human re-clicking
//! - **Total outcomes**: transport errors and malformed payloads degrade to
//!   `Failed`, they never escape as `Err`
//! - **Explicit context**: actor, agency, resident and mode travel with every
//!   request, nothing is read from ambient state

mod demo;
mod dispatcher;
mod error;
mod response;
mod supabase;
mod types;

pub use care_config_and_utils::ExecutionMode;
pub use demo::DemoAuthority;
pub use dispatcher::ActionDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use response::parse_dispatch_response;
pub use supabase::{SupabaseDispatcher, CARE_ACTION_RPC, EMERGENCY_ACTION_RPC, SNAPSHOT_RPC};
pub use types::{
    codes, ActionKind, ActionRequest, BlockingRule, DispatchContext, DispatchFailure,
    DispatchOutcome, EntitySnapshot, FailureKind, Snapshot, Version,
};
