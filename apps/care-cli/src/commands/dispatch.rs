//! One-shot dispatch through a panel controller.

use crate::output::{self, OutputFormat};
use anyhow::{anyhow, bail, Context, Result};
use care_config_and_utils::Config;
use care_dispatch::{ActionDispatcher, ActionKind, DispatchContext, ExecutionMode};
use care_reconciler::{ActionController, BeginRejected, Completion, PanelView};
use std::sync::Arc;
use tracing::{debug, info};

/// Who acts on whom, and how.
#[derive(Debug, Clone)]
pub struct DispatchArgs {
    pub action: String,
    pub resident_id: String,
    pub actor_id: String,
    pub agency_id: String,
    pub mode: ExecutionMode,
}

/// `--agency` if given, else the configured agency.
pub fn resolve_agency(flag: Option<String>, config: &Config) -> Result<String> {
    flag.or_else(|| config.agency_id.clone())
        .ok_or_else(|| anyhow!("No agency given (use --agency or set agency_id)"))
}

/// What one dispatch command produced.
#[derive(Debug)]
pub struct DispatchReport {
    pub action: ActionKind,
    pub result: Result<Completion, BeginRejected>,
    pub view: PanelView,
}

impl DispatchReport {
    /// `Ok` only when the authority accepted the action.
    pub fn outcome(&self) -> Result<()> {
        let action = self.action;
        match &self.result {
            Ok(Completion::Accepted { .. }) => Ok(()),
            Ok(Completion::Blocked(rule)) => bail!("{} blocked by policy: {}", action, rule.reason),
            Ok(Completion::Failed(failure)) => bail!("{} failed: {}", action, failure),
            Ok(Completion::Discarded { .. }) => {
                bail!("{} was overtaken by a newer change to the record", action)
            }
            Err(rejected) => bail!("{} refused: {}", action, rejected),
        }
    }
}

/// Load the resident, run the action through a controller and capture the
/// resulting panel. Refreshes once more after an accept so the view shows
/// the new version.
pub async fn run_action<D: ActionDispatcher>(
    dispatcher: Arc<D>,
    args: DispatchArgs,
) -> Result<DispatchReport> {
    let action: ActionKind = args.action.parse()?;

    let controller = ActionController::new(dispatcher, args.resident_id.clone());
    controller
        .refresh()
        .await
        .with_context(|| format!("Failed to load resident {}", args.resident_id))?;

    let context = DispatchContext::new(args.actor_id, args.agency_id, args.mode)
        .with_resident(args.resident_id.clone());
    debug!(action = %action, mode = %args.mode, "Running action");

    let result = match action {
        ActionKind::Care(action) => controller.trigger_care(action, context).await,
        ActionKind::Emergency(action) => controller.trigger_emergency(action, context).await,
    };

    if let Ok(Completion::Accepted { new_version }) = &result {
        info!(action = %action, new_version, "Action accepted");
        if let Err(e) = controller.refresh().await {
            debug!("Refresh after accept failed: {}", e);
        }
    }

    Ok(DispatchReport {
        action,
        result,
        view: controller.view().await,
    })
}

/// Run the action, print the panel, and fail unless it was accepted.
pub async fn dispatch<D: ActionDispatcher>(
    dispatcher: Arc<D>,
    args: DispatchArgs,
    format: &OutputFormat,
) -> Result<()> {
    let report = run_action(dispatcher, args).await?;
    output::print(&report.view, format);
    report.outcome()
}
