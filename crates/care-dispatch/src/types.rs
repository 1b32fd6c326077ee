//! Request, response and snapshot types shared with the backend.

use care_config_and_utils::ExecutionMode;
use care_fsm::{CareAction, CareState, EmergencyAction, EmergencyState, UnknownVariant};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimistic-concurrency counter. Monotonic per lifecycle.
pub type Version = u64;

/// A lifecycle state as last observed from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub state: S,
    pub version: Version,
}

impl<S> Snapshot<S> {
    pub fn new(state: S, version: Version) -> Self {
        Self { state, version }
    }
}

/// Both lifecycles of one resident's care record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub resident_id: String,
    pub care: Snapshot<CareState>,
    pub emergency: Snapshot<EmergencyState>,
}

/// Row shape returned by the snapshot RPC.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SnapshotRow {
    pub resident_id: String,
    pub care_state: CareState,
    pub care_version: Version,
    pub emergency_state: EmergencyState,
    pub emergency_version: Version,
}

impl From<SnapshotRow> for EntitySnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            resident_id: row.resident_id,
            care: Snapshot::new(row.care_state, row.care_version),
            emergency: Snapshot::new(row.emergency_state, row.emergency_version),
        }
    }
}

/// Either lifecycle's action, serialized as its bare wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionKind {
    Care(CareAction),
    Emergency(EmergencyAction),
}

impl ActionKind {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ActionKind::Care(action) => action.as_wire(),
            ActionKind::Emergency(action) => action.as_wire(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Care(action) => action.label(),
            ActionKind::Emergency(action) => action.label(),
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, ActionKind::Emergency(_))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(action) = s.parse::<CareAction>() {
            return Ok(ActionKind::Care(action));
        }
        s.parse::<EmergencyAction>()
            .map(ActionKind::Emergency)
            .map_err(|_| UnknownVariant {
                kind: "action",
                value: s.to_string(),
            })
    }
}

impl From<CareAction> for ActionKind {
    fn from(action: CareAction) -> Self {
        ActionKind::Care(action)
    }
}

impl From<EmergencyAction> for ActionKind {
    fn from(action: EmergencyAction) -> Self {
        ActionKind::Emergency(action)
    }
}

/// Who is acting, for whom, and whether the write persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchContext {
    pub actor_id: String,
    pub agency_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<String>,
    pub mode: ExecutionMode,
}

impl DispatchContext {
    pub fn new(
        actor_id: impl Into<String>,
        agency_id: impl Into<String>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            agency_id: agency_id.into(),
            resident_id: None,
            mode,
        }
    }

    pub fn with_resident(mut self, resident_id: impl Into<String>) -> Self {
        self.resident_id = Some(resident_id.into());
        self
    }
}

/// Body of a dispatch RPC:
/// `{ actionType, expectedVersion, actorId, agencyId, residentId?, mode }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action_type: ActionKind,
    pub expected_version: Version,
    #[serde(flatten)]
    pub context: DispatchContext,
}

impl ActionRequest {
    pub fn new(
        action: impl Into<ActionKind>,
        expected_version: Version,
        context: DispatchContext,
    ) -> Self {
        Self {
            action_type: action.into(),
            expected_version,
            context,
        }
    }
}

/// Explanation attached to a policy refusal. Display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingRule {
    pub reason: String,
    pub master_spec_section: String,
    pub risk_prevented: String,
    pub remediation_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_details: Option<serde_json::Value>,
}

/// Failure codes produced on this side of the wire, plus the backend codes
/// we classify.
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
    pub const MALFORMED_BLOCKING_RULE: &str = "MALFORMED_BLOCKING_RULE";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    pub const VERSION_CONFLICT: &str = "VERSION_CONFLICT";
    pub const STALE_VERSION: &str = "STALE_VERSION";
    pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
    pub const EMERGENCY_ACTIVE: &str = "EMERGENCY_ACTIVE";
    pub const MISSING_CONTEXT: &str = "MISSING_CONTEXT";
    pub const RESIDENT_NOT_FOUND: &str = "RESIDENT_NOT_FOUND";
    pub const VERSION_EXHAUSTED: &str = "VERSION_EXHAUSTED";
    pub const HTTP_PREFIX: &str = "HTTP_";
}

/// Coarse classification of a failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Someone else moved the record first.
    StaleVersion,
    /// The request never produced a usable answer.
    Transport,
    /// An answer arrived but could not be understood.
    Malformed,
    /// The backend refused for any other reason.
    Rejected,
}

/// An opaque refusal: code plus optional human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DispatchFailure {
    pub fn new(code: impl Into<String>, message: Option<String>) -> Self {
        Self {
            code: code.into(),
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(codes::NETWORK_ERROR, Some(message.into()))
    }

    pub fn http_status(status: u16, message: Option<String>) -> Self {
        Self::new(format!("{}{}", codes::HTTP_PREFIX, status), message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(codes::MALFORMED_RESPONSE, Some(message.into()))
    }

    pub fn kind(&self) -> FailureKind {
        match self.code.as_str() {
            codes::VERSION_CONFLICT | codes::STALE_VERSION => FailureKind::StaleVersion,
            codes::NETWORK_ERROR => FailureKind::Transport,
            code if code.starts_with(codes::HTTP_PREFIX) => FailureKind::Transport,
            codes::MALFORMED_RESPONSE | codes::MALFORMED_BLOCKING_RULE => FailureKind::Malformed,
            _ => FailureKind::Rejected,
        }
    }

    /// Text for the inline error message.
    pub fn display_message(&self) -> String {
        match &self.message {
            Some(message) if !message.trim().is_empty() => {
                format!("{} ({})", message.trim(), self.code)
            }
            _ => format!("The action could not be completed ({})", self.code),
        }
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

/// Terminal result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The backend applied the transition.
    Accepted { new_version: Version },
    /// The backend's policy engine refused the action.
    PolicyBlocked(BlockingRule),
    /// Any other refusal, including transport and parse failures.
    Failed(DispatchFailure),
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Accepted { .. } => "accepted",
            DispatchOutcome::PolicyBlocked(_) => "policy_blocked",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}
