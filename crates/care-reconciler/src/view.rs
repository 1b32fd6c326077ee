//! Render-ready snapshots of a panel.

use crate::block::BlockPresentation;
use crate::lifecycle::Lifecycle;
use crate::reconciler::Reconciler;
use care_dispatch::{ActionKind, DispatchFailure, Version};
use care_fsm::{CareAction, CareState, EmergencyAction, EmergencyState};
use serde::Serialize;
use std::fmt;

/// What one lifecycle section of a panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleView<S, A> {
    pub displayed_state: Option<S>,
    pub version: Option<Version>,
    /// The displayed state is a guess awaiting confirmation.
    pub optimistic: bool,
    pub pending_action: Option<A>,
    pub syncing: bool,
    pub locked: bool,
    pub actions: Vec<A>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchFailure>,
}

impl<L: Lifecycle> Reconciler<L> {
    pub fn view(&self) -> LifecycleView<L::State, L::Action> {
        LifecycleView {
            displayed_state: self.displayed_state(),
            version: self.observed().map(|snapshot| snapshot.version),
            optimistic: self.optimistic_state().is_some(),
            pending_action: self.pending_action(),
            syncing: self.is_syncing(),
            locked: self.is_locked(),
            actions: self.available_actions().into_iter().collect(),
            error: self.error().cloned(),
        }
    }
}

impl<S, A> fmt::Display for LifecycleView<S, A>
where
    S: fmt::Display,
    A: Copy + Into<ActionKind>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.displayed_state, self.version) {
            (Some(state), Some(version)) => write!(f, "{state} (v{version})")?,
            (Some(state), None) => write!(f, "{state}")?,
            _ => f.write_str("not loaded")?,
        }
        if self.optimistic {
            f.write_str(" [unconfirmed]")?;
        }
        if let Some(action) = self.pending_action {
            let kind: ActionKind = action.into();
            write!(f, " [{}]", pending_label(kind))?;
        }
        if self.syncing {
            f.write_str(" [syncing]")?;
        }
        if self.locked {
            f.write_str(" [locked]")?;
        }

        let actions: Vec<&str> = self
            .actions
            .iter()
            .map(|action| {
                let kind: ActionKind = (*action).into();
                kind.as_wire()
            })
            .collect();
        if actions.is_empty() {
            write!(f, "\n    actions: none")?;
        } else {
            write!(f, "\n    actions: {}", actions.join(", "))?;
        }

        if let Some(error) = &self.error {
            write!(f, "\n    error: {error}")?;
        }
        Ok(())
    }
}

fn pending_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Care(action) => action.pending_label(),
        ActionKind::Emergency(action) => action.pending_label(),
    }
}

/// Everything a caregiver panel renders for one resident.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub resident_id: String,
    pub attached: bool,
    pub care: LifecycleView<CareState, CareAction>,
    pub emergency: LifecycleView<EmergencyState, EmergencyAction>,
    pub block: BlockPresentation,
}

impl fmt::Display for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resident {}", self.resident_id)?;
        writeln!(f, "  care:      {}", self.care)?;
        write!(f, "  emergency: {}", self.emergency)?;
        if self.block.is_visible() {
            write!(f, "\n{}", self.block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CareLifecycle, EmergencyLifecycle};
    use care_dispatch::{DispatchOutcome, Snapshot};
    use serde_json::json;

    #[test]
    fn test_view_of_unloaded_reconciler() {
        let view = Reconciler::<CareLifecycle>::new().view();
        assert_eq!(view.displayed_state, None);
        assert!(view.actions.is_empty());
        assert_eq!(view.to_string(), "not loaded\n    actions: none");
    }

    #[test]
    fn test_view_lists_actions_in_catalog_order() {
        let mut reconciler = Reconciler::<CareLifecycle>::new();
        reconciler.observe(Snapshot::new(CareState::InProgress, 3));

        let view = reconciler.view();
        assert_eq!(
            view.actions,
            vec![CareAction::PauseCare, CareAction::BeginCompletion]
        );
        assert_eq!(view.version, Some(3));
        assert!(view.to_string().contains("PAUSE_CARE, BEGIN_COMPLETION"));
    }

    #[test]
    fn test_pending_view_shows_guess_and_no_actions() {
        let mut reconciler = Reconciler::<EmergencyLifecycle>::new();
        reconciler.observe(Snapshot::new(EmergencyState::None, 0));
        reconciler.begin(EmergencyAction::TriggerEmergency).unwrap();

        let view = reconciler.view();
        assert_eq!(view.displayed_state, Some(EmergencyState::Pending));
        assert!(view.optimistic);
        assert_eq!(view.pending_action, Some(EmergencyAction::TriggerEmergency));
        assert!(view.actions.is_empty());

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["displayedState"], json!("PENDING"));
        assert_eq!(value["pendingAction"], json!("TRIGGER_EMERGENCY"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_syncing_view_after_accept() {
        let mut reconciler = Reconciler::<CareLifecycle>::new();
        reconciler.observe(Snapshot::new(CareState::NotStarted, 5));
        let pending = reconciler.begin(CareAction::StartPreparation).unwrap();
        reconciler.complete(pending.ticket, DispatchOutcome::Accepted { new_version: 6 });

        let view = reconciler.view();
        assert!(view.syncing);
        assert!(view.to_string().contains("[syncing]"));
    }
}
