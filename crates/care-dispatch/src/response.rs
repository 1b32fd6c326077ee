//! Parsing of dispatch RPC responses into `DispatchOutcome`.
//!
//! Accepted shapes:
//! - `{ "success": true, "newVersion": 6 }`
//! - `{ "success": false, "brainBlocked": true, "blockingRule": { ... } }`
//! - `{ "success": false, "errorCode": "...", "message": "..." }`
//!
//! A one-element array wrapping any of these is unwrapped (set-returning
//! functions answer that way). Anything else degrades to `Failed`.

use crate::types::{codes, BlockingRule, DispatchFailure, DispatchOutcome};
use serde_json::Value;
use tracing::warn;

/// Parse a raw response body. Never fails.
pub fn parse_dispatch_response(body: &str) -> DispatchOutcome {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => outcome_from_value(value),
        Err(e) => {
            warn!(error = %e, "Dispatch response is not JSON");
            DispatchOutcome::Failed(DispatchFailure::malformed(
                "The server returned an unreadable response",
            ))
        }
    }
}

pub(crate) fn outcome_from_value(value: Value) -> DispatchOutcome {
    let value = match value {
        Value::Array(mut rows) if rows.len() == 1 => rows.remove(0),
        other => other,
    };

    let Some(success) = value.get("success").and_then(Value::as_bool) else {
        warn!("Dispatch response has no success flag");
        return DispatchOutcome::Failed(DispatchFailure::malformed(
            "The server response did not say whether the action succeeded",
        ));
    };

    if success {
        return match value.get("newVersion").and_then(Value::as_u64) {
            Some(new_version) => DispatchOutcome::Accepted { new_version },
            None => {
                warn!("Accepted dispatch response carries no newVersion");
                DispatchOutcome::Failed(DispatchFailure::malformed(
                    "The server accepted the action but sent no version",
                ))
            }
        };
    }

    if value.get("brainBlocked").and_then(Value::as_bool) == Some(true) {
        return blocked_outcome(value.get("blockingRule"));
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    match value.get("errorCode").and_then(Value::as_str) {
        Some(code) if !code.trim().is_empty() => {
            DispatchOutcome::Failed(DispatchFailure::new(code.trim(), message))
        }
        _ => DispatchOutcome::Failed(DispatchFailure::new(codes::UNKNOWN_ERROR, message)),
    }
}

fn blocked_outcome(rule: Option<&Value>) -> DispatchOutcome {
    let parsed = rule
        .cloned()
        .map(serde_json::from_value::<BlockingRule>);

    match parsed {
        Some(Ok(rule)) => DispatchOutcome::PolicyBlocked(rule),
        Some(Err(e)) => {
            warn!(error = %e, "Blocking rule payload did not parse");
            DispatchOutcome::Failed(DispatchFailure::new(
                codes::MALFORMED_BLOCKING_RULE,
                Some("The action was blocked by care policy".to_string()),
            ))
        }
        None => {
            warn!("Blocked dispatch response carries no blockingRule");
            DispatchOutcome::Failed(DispatchFailure::new(
                codes::MALFORMED_BLOCKING_RULE,
                Some("The action was blocked by care policy".to_string()),
            ))
        }
    }
}
