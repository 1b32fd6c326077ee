//! The dispatcher seam between panels and the backend authority.

use crate::error::DispatchResult;
use crate::types::{ActionRequest, DispatchOutcome, EntitySnapshot};
use async_trait::async_trait;
use std::sync::Arc;

/// Sends proposed transitions to whoever owns the authoritative state.
///
/// Implementors: `SupabaseDispatcher` (live backend RPC) and `DemoAuthority`
/// (in-memory, non-persistent).
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Propose one transition.
    ///
    /// Exactly one backend call per invocation. The caller is trusted to have
    /// checked the action against the catalog; the dispatcher does not
    /// re-validate it.
    async fn dispatch(&self, request: &ActionRequest) -> DispatchOutcome;

    /// Read the current care record for a resident.
    async fn fetch_snapshot(&self, resident_id: &str) -> DispatchResult<EntitySnapshot>;
}

#[async_trait]
impl<T: ActionDispatcher + ?Sized> ActionDispatcher for Arc<T> {
    async fn dispatch(&self, request: &ActionRequest) -> DispatchOutcome {
        (**self).dispatch(request).await
    }

    async fn fetch_snapshot(&self, resident_id: &str) -> DispatchResult<EntitySnapshot> {
        (**self).fetch_snapshot(resident_id).await
    }
}
