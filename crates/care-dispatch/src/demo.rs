//! In-memory demonstration authority.
//!
//! Stands in for the backend when running in demo mode or under test. It
//! enforces the same contract the stored procedures do: version check,
//! transition table, emergency lock and registered policy blocks. Nothing
//! outlives the process.

use crate::dispatcher::ActionDispatcher;
use crate::error::{DispatchError, DispatchResult};
use crate::types::{
    codes, ActionKind, ActionRequest, BlockingRule, DispatchFailure, DispatchOutcome,
    EntitySnapshot, Snapshot,
};
use async_trait::async_trait;
use care_fsm::{next_care_state, next_emergency_state, CareState, EmergencyState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Default)]
struct AuthorityState {
    records: HashMap<String, EntitySnapshot>,
    blocks: HashMap<ActionKind, BlockingRule>,
}

/// Non-persistent backend double.
#[derive(Default)]
pub struct DemoAuthority {
    state: Mutex<AuthorityState>,
    dispatch_count: AtomicUsize,
}

impl DemoAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a resident's care record.
    pub async fn seed(
        &self,
        resident_id: impl Into<String>,
        care: Snapshot<CareState>,
        emergency: Snapshot<EmergencyState>,
    ) {
        let resident_id = resident_id.into();
        let record = EntitySnapshot {
            resident_id: resident_id.clone(),
            care,
            emergency,
        };
        self.state.lock().await.records.insert(resident_id, record);
    }

    /// Make every future dispatch of `action` come back as a policy block.
    pub async fn block_action(&self, action: impl Into<ActionKind>, rule: BlockingRule) {
        self.state.lock().await.blocks.insert(action.into(), rule);
    }

    pub async fn unblock_action(&self, action: impl Into<ActionKind>) {
        self.state.lock().await.blocks.remove(&action.into());
    }

    /// Current record, if seeded.
    pub async fn record(&self, resident_id: &str) -> Option<EntitySnapshot> {
        self.state.lock().await.records.get(resident_id).cloned()
    }

    /// Number of dispatches received so far.
    pub fn dispatch_count(&self) -> usize {
        self.dispatch_count.load(Ordering::SeqCst)
    }
}

fn reject(code: &str, message: &str) -> DispatchOutcome {
    DispatchOutcome::Failed(DispatchFailure::new(code, Some(message.to_string())))
}

/// Apply `request` to `record` or explain why not.
fn evaluate(
    record: &mut EntitySnapshot,
    request: &ActionRequest,
    blocks: &HashMap<ActionKind, BlockingRule>,
) -> DispatchOutcome {
    match request.action_type {
        ActionKind::Care(action) => {
            if request.expected_version != record.care.version {
                return reject(codes::VERSION_CONFLICT, "The care record changed");
            }
            if record.emergency.state.locks_care() {
                return reject(codes::EMERGENCY_ACTIVE, "An emergency is in progress");
            }
            let Some(next) = next_care_state(record.care.state, action) else {
                return reject(codes::INVALID_TRANSITION, "Not allowed from the current state");
            };
            if let Some(rule) = blocks.get(&request.action_type) {
                return DispatchOutcome::PolicyBlocked(rule.clone());
            }
            let Some(version) = record.care.version.checked_add(1) else {
                return reject(codes::VERSION_EXHAUSTED, "The care record cannot advance further");
            };
            record.care = Snapshot::new(next, version);
            DispatchOutcome::Accepted {
                new_version: record.care.version,
            }
        }
        ActionKind::Emergency(action) => {
            if request.expected_version != record.emergency.version {
                return reject(codes::VERSION_CONFLICT, "The emergency record changed");
            }
            let Some(next) = next_emergency_state(record.emergency.state, action) else {
                return reject(codes::INVALID_TRANSITION, "Not allowed from the current state");
            };
            if let Some(rule) = blocks.get(&request.action_type) {
                return DispatchOutcome::PolicyBlocked(rule.clone());
            }
            let Some(version) = record.emergency.version.checked_add(1) else {
                return reject(
                    codes::VERSION_EXHAUSTED,
                    "The emergency record cannot advance further",
                );
            };
            record.emergency = Snapshot::new(next, version);
            DispatchOutcome::Accepted {
                new_version: record.emergency.version,
            }
        }
    }
}

#[async_trait]
impl ActionDispatcher for DemoAuthority {
    async fn dispatch(&self, request: &ActionRequest) -> DispatchOutcome {
        self.dispatch_count.fetch_add(1, Ordering::SeqCst);

        let Some(resident_id) = request.context.resident_id.as_deref() else {
            return reject(codes::MISSING_CONTEXT, "No resident selected");
        };

        let mut guard = self.state.lock().await;
        let AuthorityState { records, blocks } = &mut *guard;

        let Some(record) = records.get_mut(resident_id) else {
            return reject(codes::RESIDENT_NOT_FOUND, "No care record for this resident");
        };

        let outcome = evaluate(record, request, blocks);
        debug!(
            resident_id,
            action = request.action_type.as_wire(),
            mode = %request.context.mode,
            outcome = outcome.label(),
            "Demo authority evaluated dispatch"
        );
        if outcome.is_accepted() {
            info!(resident_id, action = request.action_type.as_wire(), "Demo transition applied");
        }
        outcome
    }

    async fn fetch_snapshot(&self, resident_id: &str) -> DispatchResult<EntitySnapshot> {
        self.record(resident_id)
            .await
            .ok_or_else(|| DispatchError::UnknownResident(resident_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DispatchContext;
    use care_config_and_utils::ExecutionMode;
    use care_fsm::{CareAction, EmergencyAction};

    fn context() -> DispatchContext {
        DispatchContext::new("caregiver-1", "agency-1", ExecutionMode::Demo).with_resident("res-1")
    }

    fn rule() -> BlockingRule {
        BlockingRule {
            reason: "Visit not scheduled".into(),
            master_spec_section: "3.4".into(),
            risk_prevented: "Unscheduled care".into(),
            remediation_path: "/schedule".into(),
            blocking_details: None,
        }
    }

    async fn seeded(care: CareState, care_version: u64) -> DemoAuthority {
        let authority = DemoAuthority::new();
        authority
            .seed(
                "res-1",
                Snapshot::new(care, care_version),
                Snapshot::new(EmergencyState::None, 0),
            )
            .await;
        authority
    }

    #[tokio::test]
    async fn test_accepted_advances_version() {
        let authority = seeded(CareState::NotStarted, 5).await;

        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::StartPreparation, 5, context()))
            .await;
        assert_eq!(outcome, DispatchOutcome::Accepted { new_version: 6 });

        let record = authority.record("res-1").await.unwrap();
        assert_eq!(record.care, Snapshot::new(CareState::InPreparation, 6));
        assert_eq!(authority.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_not_applied() {
        let authority = seeded(CareState::NotStarted, 5).await;

        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::StartPreparation, 4, context()))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ref f) if f.code == codes::VERSION_CONFLICT
        ));
        let record = authority.record("res-1").await.unwrap();
        assert_eq!(record.care, Snapshot::new(CareState::NotStarted, 5));
    }

    #[tokio::test]
    async fn test_missing_resident_context() {
        let authority = seeded(CareState::NotStarted, 0).await;
        let ctx = DispatchContext::new("caregiver-1", "agency-1", ExecutionMode::Demo);

        let outcome = authority
            .dispatch(&ActionRequest::new(EmergencyAction::TriggerEmergency, 0, ctx))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ref f) if f.code == codes::MISSING_CONTEXT
        ));
    }

    #[tokio::test]
    async fn test_active_emergency_rejects_care_actions() {
        let authority = DemoAuthority::new();
        authority
            .seed(
                "res-1",
                Snapshot::new(CareState::InProgress, 3),
                Snapshot::new(EmergencyState::Active, 2),
            )
            .await;

        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::PauseCare, 3, context()))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ref f) if f.code == codes::EMERGENCY_ACTIVE
        ));

        let resolve = authority
            .dispatch(&ActionRequest::new(EmergencyAction::ResolveEmergency, 2, context()))
            .await;
        assert_eq!(resolve, DispatchOutcome::Accepted { new_version: 3 });
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let authority = seeded(CareState::Completed, 10).await;

        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::StartCare, 10, context()))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ref f) if f.code == codes::INVALID_TRANSITION
        ));
    }

    #[tokio::test]
    async fn test_registered_block_returns_rule() {
        let authority = seeded(CareState::InPreparation, 1).await;
        authority.block_action(CareAction::StartCare, rule()).await;

        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::StartCare, 1, context()))
            .await;
        assert_eq!(outcome, DispatchOutcome::PolicyBlocked(rule()));

        authority.unblock_action(CareAction::StartCare).await;
        let outcome = authority
            .dispatch(&ActionRequest::new(CareAction::StartCare, 1, context()))
            .await;
        assert_eq!(outcome, DispatchOutcome::Accepted { new_version: 2 });
    }

    #[tokio::test]
    async fn test_care_and_emergency_versions_are_independent() {
        let authority = seeded(CareState::InProgress, 7).await;

        authority
            .dispatch(&ActionRequest::new(EmergencyAction::TriggerEmergency, 0, context()))
            .await;
        let record = authority.record("res-1").await.unwrap();
        assert_eq!(record.care.version, 7);
        assert_eq!(record.emergency, Snapshot::new(EmergencyState::Pending, 1));
    }

    #[tokio::test]
    async fn test_exhausted_version_is_rejected_not_applied() {
        let authority = DemoAuthority::new();
        authority
            .seed(
                "res-1",
                Snapshot::new(CareState::NotStarted, u64::MAX),
                Snapshot::new(EmergencyState::None, u64::MAX),
            )
            .await;

        let care = authority
            .dispatch(&ActionRequest::new(CareAction::StartPreparation, u64::MAX, context()))
            .await;
        assert!(matches!(
            care,
            DispatchOutcome::Failed(ref f) if f.code == codes::VERSION_EXHAUSTED
        ));

        let emergency = authority
            .dispatch(&ActionRequest::new(
                EmergencyAction::TriggerEmergency,
                u64::MAX,
                context(),
            ))
            .await;
        assert!(matches!(
            emergency,
            DispatchOutcome::Failed(ref f) if f.code == codes::VERSION_EXHAUSTED
        ));

        let record = authority.record("res-1").await.unwrap();
        assert_eq!(record.care, Snapshot::new(CareState::NotStarted, u64::MAX));
        assert_eq!(record.emergency, Snapshot::new(EmergencyState::None, u64::MAX));
    }

    #[tokio::test]
    async fn test_fetch_unknown_resident() {
        let authority = DemoAuthority::new();
        assert!(matches!(
            authority.fetch_snapshot("nobody").await,
            Err(DispatchError::UnknownResident(_))
        ));
    }
}
