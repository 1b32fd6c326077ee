//! Scenario tests for panels driven through `ActionController`.
//!
//! - `harness.rs`  - Scripted dispatcher and fixtures
//! - `dispatch.rs` - Accepted, failed and policy-blocked dispatches
//! - `races.rs`    - Concurrent actors, superseded and late responses
//! - `locking.rs`  - Emergency lock on care actions
