//! Action catalog lookup.

use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use care_fsm::{valid_actions_for_wire_state, EmergencyState, WireActions};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ActionEntry {
    action: &'static str,
    label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionsReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    care_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emergency_state: Option<String>,
    care: Vec<ActionEntry>,
    emergency: Vec<ActionEntry>,
    care_locked: bool,
}

impl fmt::Display for ActionsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(state) = &self.care_state {
            writeln!(f, "Care ({state}):")?;
            write_entries(f, &self.care)?;
            if self.care_locked {
                writeln!(f, "  (locked by active emergency)")?;
            }
        }
        if let Some(state) = &self.emergency_state {
            writeln!(f, "Emergency ({state}):")?;
            write_entries(f, &self.emergency)?;
        }
        Ok(())
    }
}

fn write_entries(f: &mut fmt::Formatter<'_>, entries: &[ActionEntry]) -> fmt::Result {
    if entries.is_empty() {
        return writeln!(f, "  (none)");
    }
    for entry in entries {
        writeln!(f, "  {:<24} {}", entry.action, entry.label)?;
    }
    Ok(())
}

fn care_entries(lookup: &WireActions) -> Vec<ActionEntry> {
    match lookup {
        WireActions::Care(actions) => actions
            .iter()
            .map(|a| ActionEntry {
                action: a.as_wire(),
                label: a.label(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn emergency_entries(lookup: &WireActions) -> Vec<ActionEntry> {
    match lookup {
        WireActions::Emergency(actions) => actions
            .iter()
            .map(|a| ActionEntry {
                action: a.as_wire(),
                label: a.label(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn build_report(care: Option<&str>, emergency: Option<&str>) -> ActionsReport {
    let care_locked = emergency
        .and_then(|raw| raw.parse::<EmergencyState>().ok())
        .is_some_and(|state| state.locks_care());

    let care_actions = match care {
        Some(_) if care_locked => Vec::new(),
        Some(raw) => care_entries(&valid_actions_for_wire_state(raw)),
        None => Vec::new(),
    };
    let emergency_actions = emergency
        .map(|raw| emergency_entries(&valid_actions_for_wire_state(raw)))
        .unwrap_or_default();

    ActionsReport {
        care_state: care.map(str::to_string),
        emergency_state: emergency.map(str::to_string),
        care: care_actions,
        emergency: emergency_actions,
        care_locked: care.is_some() && care_locked,
    }
}

/// Print the actions offered for the given wire states.
///
/// Unknown state strings print an empty list rather than an error.
pub fn actions(
    care: Option<&str>,
    emergency: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    if care.is_none() && emergency.is_none() {
        bail!("Pass --care and/or --emergency");
    }

    let report = build_report(care, emergency);
    debug!(
        care = ?care,
        emergency = ?emergency,
        care_actions = report.care.len(),
        emergency_actions = report.emergency.len(),
        "Catalog lookup"
    );
    output::print(&report, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[ActionEntry]) -> Vec<&'static str> {
        entries.iter().map(|e| e.action).collect()
    }

    #[test]
    fn test_report_for_known_states() {
        let report = build_report(Some("IN_PREPARATION"), Some("NONE"));
        assert_eq!(names(&report.care), vec!["CANCEL_PREPARATION", "START_CARE"]);
        assert_eq!(names(&report.emergency), vec!["TRIGGER_EMERGENCY"]);
        assert!(!report.care_locked);
    }

    #[test]
    fn test_unknown_state_is_empty() {
        let report = build_report(Some("SLEEPING"), None);
        assert!(report.care.is_empty());
        assert!(report.to_string().contains("(none)"));
    }

    #[test]
    fn test_emergency_name_passed_as_care_is_empty() {
        let report = build_report(Some("ACTIVE"), None);
        assert!(report.care.is_empty());
    }

    #[test]
    fn test_no_state_is_an_error() {
        assert!(actions(None, None, &OutputFormat::Text).is_err());
    }

    #[test]
    fn test_active_emergency_locks_care() {
        let report = build_report(Some("IN_PROGRESS"), Some("ACTIVE"));
        assert!(report.care.is_empty());
        assert!(report.care_locked);
        assert_eq!(names(&report.emergency), vec!["RESOLVE_EMERGENCY"]);
        assert!(report.to_string().contains("locked by active emergency"));
    }
}
