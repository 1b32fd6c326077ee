//! Supabase RPC dispatcher.
//!
//! Every call is a `POST {api_url}/rest/v1/rpc/{function}`; the stored
//! procedures own the transition rules, the version check and the policy
//! engine.

use crate::dispatcher::ActionDispatcher;
use crate::error::{DispatchError, DispatchResult};
use crate::response::parse_dispatch_response;
use crate::types::{
    ActionKind, ActionRequest, DispatchFailure, DispatchOutcome, EntitySnapshot, SnapshotRow,
};
use async_trait::async_trait;
use care_config_and_utils::Config;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// RPC applying a care session transition.
pub const CARE_ACTION_RPC: &str = "dispatch_care_action";
/// RPC applying an emergency transition.
pub const EMERGENCY_ACTION_RPC: &str = "dispatch_emergency_action";
/// RPC returning a resident's care record.
pub const SNAPSHOT_RPC: &str = "get_care_snapshot";

/// Dispatcher backed by Supabase stored procedures.
#[derive(Clone)]
pub struct SupabaseDispatcher {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    /// Bearer token; swapped after sign-in or refresh.
    access_token: Arc<RwLock<String>>,
}

impl SupabaseDispatcher {
    /// Create a new dispatcher.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase publishable key
    /// * `access_token` - The user's JWT (or the publishable key for anonymous calls)
    pub fn new(
        api_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: Arc::new(RwLock::new(access_token.into())),
        }
    }

    /// Build a dispatcher from loaded configuration.
    pub fn from_config(config: &Config) -> DispatchResult<Self> {
        let url = config
            .supabase_url()
            .map_err(|e| DispatchError::Config(e.to_string()))?;

        Ok(Self::new(
            url.as_str(),
            config.supabase_publishable_key.clone(),
            config.bearer_token(),
        ))
    }

    /// Replace the bearer token used for subsequent calls.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().await = token.into();
        debug!("Dispatcher access token replaced");
    }

    /// Build the RPC URL for a stored procedure.
    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_url, function)
    }

    fn function_for(action: &ActionKind) -> &'static str {
        match action {
            ActionKind::Care(_) => CARE_ACTION_RPC,
            ActionKind::Emergency(_) => EMERGENCY_ACTION_RPC,
        }
    }

    async fn post_rpc<T: Serialize + ?Sized>(
        &self,
        function: &str,
        body: &T,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let token = self.access_token.read().await.clone();

        self.http_client
            .post(self.rpc_url(function))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
    }
}

/// Pull a human message out of an error body (`{"message": ...}`), else the raw body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| Some(trimmed.to_string()))
}

#[async_trait]
impl ActionDispatcher for SupabaseDispatcher {
    async fn dispatch(&self, request: &ActionRequest) -> DispatchOutcome {
        let function = Self::function_for(&request.action_type);
        let action = request.action_type.as_wire();

        debug!(
            action,
            function,
            expected_version = request.expected_version,
            mode = %request.context.mode,
            "Dispatching action"
        );

        let response = match self.post_rpc(function, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(action, error = %e, "Dispatch transport failure");
                return DispatchOutcome::Failed(DispatchFailure::network(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(action, error = %e, "Dispatch response body unreadable");
                return DispatchOutcome::Failed(DispatchFailure::network(e.to_string()));
            }
        };

        if !status.is_success() {
            error!("Dispatch RPC failed: {} - {}", status, body);
            return DispatchOutcome::Failed(DispatchFailure::http_status(
                status.as_u16(),
                error_message(&body),
            ));
        }

        let outcome = parse_dispatch_response(&body);
        match &outcome {
            DispatchOutcome::Accepted { new_version } => {
                info!(action, new_version, "Action accepted")
            }
            DispatchOutcome::PolicyBlocked(rule) => {
                warn!(action, section = %rule.master_spec_section, "Action blocked by policy")
            }
            DispatchOutcome::Failed(failure) => {
                warn!(action, code = %failure.code, "Action rejected")
            }
        }
        outcome
    }

    async fn fetch_snapshot(&self, resident_id: &str) -> DispatchResult<EntitySnapshot> {
        debug!(resident_id, "Fetching care snapshot");

        let body = serde_json::json!({ "residentId": resident_id });
        let response = self.post_rpc(SNAPSHOT_RPC, &body).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!("Snapshot RPC failed: {} - {}", status, message);
            return Err(DispatchError::Backend { status, message });
        }

        let value: Value = response.json().await?;
        let row = match value {
            Value::Array(mut rows) => {
                if rows.is_empty() {
                    return Err(DispatchError::UnknownResident(resident_id.to_string()));
                }
                rows.remove(0)
            }
            Value::Null => return Err(DispatchError::UnknownResident(resident_id.to_string())),
            other => other,
        };

        let row: SnapshotRow = serde_json::from_value(row)?;
        Ok(row.into())
    }
}

impl std::fmt::Debug for SupabaseDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseDispatcher")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{codes, DispatchContext, FailureKind};
    use care_config_and_utils::ExecutionMode;
    use care_fsm::{CareAction, CareState, EmergencyAction, EmergencyState};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP exchange, returning the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request(action: impl Into<ActionKind>, version: u64) -> ActionRequest {
        ActionRequest::new(
            action,
            version,
            DispatchContext::new("caregiver-1", "agency-1", ExecutionMode::Live)
                .with_resident("res-1"),
        )
    }

    #[test]
    fn test_rpc_url() {
        let dispatcher = SupabaseDispatcher::new("https://test.supabase.co/", "key", "token");
        assert_eq!(
            dispatcher.rpc_url(CARE_ACTION_RPC),
            "https://test.supabase.co/rest/v1/rpc/dispatch_care_action"
        );
    }

    #[test]
    fn test_function_routing() {
        assert_eq!(
            SupabaseDispatcher::function_for(&ActionKind::Care(CareAction::StartCare)),
            CARE_ACTION_RPC
        );
        assert_eq!(
            SupabaseDispatcher::function_for(&ActionKind::Emergency(
                EmergencyAction::TriggerEmergency
            )),
            EMERGENCY_ACTION_RPC
        );
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let config = Config {
            supabase_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(
            SupabaseDispatcher::from_config(&config),
            Err(DispatchError::Config(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"P0001","message":"version mismatch"}"#),
            Some("version mismatch".to_string())
        );
        assert_eq!(error_message("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_message("  "), None);
    }

    #[tokio::test]
    async fn test_dispatch_accepted_sends_expected_request() {
        let (url, server) = serve_once("200 OK", r#"{"success":true,"newVersion":6}"#).await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "user-jwt");

        let outcome = dispatcher
            .dispatch(&request(CareAction::StartPreparation, 5))
            .await;
        assert_eq!(outcome, DispatchOutcome::Accepted { new_version: 6 });

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /rest/v1/rpc/dispatch_care_action"));
        assert!(raw.contains("apikey: anon-key"));
        assert!(raw.contains("authorization: Bearer user-jwt") || raw.contains("Authorization: Bearer user-jwt"));
        assert!(raw.contains(r#""actionType":"START_PREPARATION""#));
        assert!(raw.contains(r#""expectedVersion":5"#));
    }

    #[tokio::test]
    async fn test_dispatch_policy_block() {
        let (url, _server) = serve_once(
            "200 OK",
            r#"{"success":false,"brainBlocked":true,"blockingRule":{"reason":"Consent missing","masterSpecSection":"7.1","riskPrevented":"Care without consent","remediationPath":"/consent"}}"#,
        )
        .await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "user-jwt");

        match dispatcher.dispatch(&request(CareAction::StartCare, 2)).await {
            DispatchOutcome::PolicyBlocked(rule) => {
                assert_eq!(rule.reason, "Consent missing");
                assert_eq!(rule.remediation_path, "/consent");
            }
            other => panic!("expected policy block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_http_error_becomes_failure() {
        let (url, _server) = serve_once(
            "400 Bad Request",
            r#"{"code":"P0001","message":"version mismatch"}"#,
        )
        .await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "user-jwt");

        match dispatcher
            .dispatch(&request(EmergencyAction::TriggerEmergency, 0))
            .await
        {
            DispatchOutcome::Failed(failure) => {
                assert_eq!(failure.code, "HTTP_400");
                assert_eq!(failure.message.as_deref(), Some("version mismatch"));
                assert_eq!(failure.kind(), FailureKind::Transport);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_connection_refused_becomes_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher = SupabaseDispatcher::new(format!("http://{}", addr), "k", "t");
        match dispatcher.dispatch(&request(CareAction::PauseCare, 3)).await {
            DispatchOutcome::Failed(failure) => assert_eq!(failure.code, codes::NETWORK_ERROR),
            other => panic!("expected network failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_parses_row() {
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"residentId":"res-1","careState":"IN_PROGRESS","careVersion":9,"emergencyState":"NONE","emergencyVersion":2}]"#,
        )
        .await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "user-jwt");

        let snapshot = dispatcher.fetch_snapshot("res-1").await.unwrap();
        assert_eq!(snapshot.resident_id, "res-1");
        assert_eq!(snapshot.care.state, CareState::InProgress);
        assert_eq!(snapshot.care.version, 9);
        assert_eq!(snapshot.emergency.state, EmergencyState::None);
        assert_eq!(snapshot.emergency.version, 2);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /rest/v1/rpc/get_care_snapshot"));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_empty_is_unknown_resident() {
        let (url, _server) = serve_once("200 OK", "[]").await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "user-jwt");

        assert!(matches!(
            dispatcher.fetch_snapshot("res-404").await,
            Err(DispatchError::UnknownResident(id)) if id == "res-404"
        ));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_backend_error() {
        let (url, _server) = serve_once("401 Unauthorized", r#"{"message":"JWT expired"}"#).await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "stale-jwt");

        match dispatcher.fetch_snapshot("res-1").await {
            Err(DispatchError::Backend { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("JWT expired"));
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_access_token_is_used() {
        let (url, server) = serve_once("200 OK", r#"{"success":true,"newVersion":1}"#).await;
        let dispatcher = SupabaseDispatcher::new(url, "anon-key", "old");
        dispatcher.set_access_token("fresh-jwt").await;

        dispatcher.dispatch(&request(CareAction::StartCare, 0)).await;
        let raw = server.await.unwrap();
        assert!(raw.contains("Bearer fresh-jwt"));
    }
}
