//! Async driver for one resident's panel.

use crate::block::BlockPresentation;
use crate::lifecycle::{CareLifecycle, EmergencyLifecycle, Lifecycle};
use crate::reconciler::{BeginRejected, Completion, Observation, Reconciler};
use crate::view::PanelView;
use care_dispatch::{
    ActionDispatcher, ActionRequest, BlockingRule, DispatchContext, DispatchFailure,
    DispatchResult, EntitySnapshot, Snapshot,
};
use care_fsm::{CareAction, CareState, EmergencyAction, EmergencyState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Callback invoked with the fresh view after every change.
///
/// It runs after the panel lock is released, so it may call back into the
/// controller.
pub type PanelCallback = Box<dyn Fn(&PanelView) + Send + Sync>;

type SharedCallback = Arc<dyn Fn(&PanelView) + Send + Sync>;

/// A view captured under the panel lock, delivered after it is released.
struct Notification {
    callback: SharedCallback,
    view: PanelView,
}

fn deliver(notification: Option<Notification>) {
    if let Some(Notification { callback, view }) = notification {
        callback(&view);
    }
}

struct PanelState {
    care: Reconciler<CareLifecycle>,
    emergency: Reconciler<EmergencyLifecycle>,
    block: BlockPresentation,
    attached: bool,
    on_change: Option<SharedCallback>,
}

impl PanelState {
    fn view(&self, resident_id: &str) -> PanelView {
        PanelView {
            resident_id: resident_id.to_string(),
            attached: self.attached,
            care: self.care.view(),
            emergency: self.emergency.view(),
            block: self.block.clone(),
        }
    }

    fn notification(&self, resident_id: &str) -> Option<Notification> {
        self.on_change.as_ref().map(|callback| Notification {
            callback: Arc::clone(callback),
            view: self.view(resident_id),
        })
    }

    /// Care actions are locked while the observed emergency is active.
    fn sync_care_lock(&mut self) {
        let locked = self
            .emergency
            .observed()
            .is_some_and(|snapshot| snapshot.state.locks_care());
        self.care.set_locked(locked);
    }
}

fn care(panel: &mut PanelState) -> &mut Reconciler<CareLifecycle> {
    &mut panel.care
}

fn emergency(panel: &mut PanelState) -> &mut Reconciler<EmergencyLifecycle> {
    &mut panel.emergency
}

/// Drives the care and emergency reconcilers of one panel.
///
/// The panel lock is held only while touching local state, never across the
/// dispatcher call, so observations keep flowing while a dispatch is in
/// flight. Clones share the same panel.
pub struct ActionController<D> {
    dispatcher: Arc<D>,
    resident_id: String,
    panel: Arc<Mutex<PanelState>>,
}

impl<D> Clone for ActionController<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            resident_id: self.resident_id.clone(),
            panel: Arc::clone(&self.panel),
        }
    }
}

impl<D: ActionDispatcher> ActionController<D> {
    pub fn new(dispatcher: Arc<D>, resident_id: impl Into<String>) -> Self {
        Self {
            dispatcher,
            resident_id: resident_id.into(),
            panel: Arc::new(Mutex::new(PanelState {
                care: Reconciler::new(),
                emergency: Reconciler::new(),
                block: BlockPresentation::new(),
                attached: true,
                on_change: None,
            })),
        }
    }

    pub fn resident_id(&self) -> &str {
        &self.resident_id
    }

    /// Set a callback to be notified of view changes.
    pub async fn set_change_callback(&self, callback: PanelCallback) {
        self.panel.lock().await.on_change = Some(Arc::from(callback));
    }

    /// Fetch the current record and observe both lifecycles.
    pub async fn refresh(&self) -> DispatchResult<EntitySnapshot> {
        let snapshot = self.dispatcher.fetch_snapshot(&self.resident_id).await?;
        self.observe(&snapshot).await;
        Ok(snapshot)
    }

    /// Apply a full record observed from outside (refresh or push).
    pub async fn observe(&self, snapshot: &EntitySnapshot) -> (Observation, Observation) {
        if snapshot.resident_id != self.resident_id {
            warn!(
                expected = %self.resident_id,
                got = %snapshot.resident_id,
                "Ignoring snapshot for another resident"
            );
            return (Observation::Stale, Observation::Stale);
        }

        let (observations, notification) = {
            let mut panel = self.panel.lock().await;
            let emergency = panel.emergency.observe(snapshot.emergency);
            panel.sync_care_lock();
            let care = panel.care.observe(snapshot.care);
            ((care, emergency), panel.notification(&self.resident_id))
        };
        deliver(notification);
        observations
    }

    pub async fn observe_care(&self, snapshot: Snapshot<CareState>) -> Observation {
        let (observation, notification) = {
            let mut panel = self.panel.lock().await;
            let observation = panel.care.observe(snapshot);
            (observation, panel.notification(&self.resident_id))
        };
        deliver(notification);
        observation
    }

    pub async fn observe_emergency(&self, snapshot: Snapshot<EmergencyState>) -> Observation {
        let (observation, notification) = {
            let mut panel = self.panel.lock().await;
            let observation = panel.emergency.observe(snapshot);
            panel.sync_care_lock();
            (observation, panel.notification(&self.resident_id))
        };
        deliver(notification);
        observation
    }

    pub async fn trigger_care(
        &self,
        action: CareAction,
        context: DispatchContext,
    ) -> Result<Completion, BeginRejected> {
        self.run(care, action, context).await
    }

    pub async fn trigger_emergency(
        &self,
        action: EmergencyAction,
        context: DispatchContext,
    ) -> Result<Completion, BeginRejected> {
        self.run(emergency, action, context).await
    }

    /// Begin under the lock, dispatch once without it, complete under it.
    async fn run<L: Lifecycle>(
        &self,
        select: fn(&mut PanelState) -> &mut Reconciler<L>,
        action: L::Action,
        context: DispatchContext,
    ) -> Result<Completion, BeginRejected> {
        let (pending, notification) = {
            let mut panel = self.panel.lock().await;
            if !panel.attached {
                return Err(BeginRejected::Detached);
            }
            let pending = select(&mut *panel).begin(action)?;
            (pending, panel.notification(&self.resident_id))
        };
        deliver(notification);

        let request = ActionRequest::new(pending.action, pending.expected_version, context);
        debug!(
            resident_id = %self.resident_id,
            action = request.action_type.as_wire(),
            expected_version = pending.expected_version,
            ticket = pending.ticket.id(),
            "Dispatching action"
        );
        let outcome = self.dispatcher.dispatch(&request).await;

        let mut panel = self.panel.lock().await;
        if !panel.attached {
            debug!(
                resident_id = %self.resident_id,
                ticket = pending.ticket.id(),
                outcome = outcome.label(),
                "Panel detached; dropping dispatch result"
            );
            return Ok(Completion::Discarded {
                ticket: pending.ticket,
            });
        }

        let completion = select(&mut *panel).complete(pending.ticket, outcome);
        match &completion {
            Completion::Accepted { new_version } => {
                info!(
                    resident_id = %self.resident_id,
                    action = request.action_type.as_wire(),
                    new_version,
                    "Action accepted"
                );
            }
            Completion::Blocked(rule) => {
                warn!(
                    resident_id = %self.resident_id,
                    action = request.action_type.as_wire(),
                    section = %rule.master_spec_section,
                    "Action blocked by policy"
                );
                panel.block.show(rule.clone());
            }
            Completion::Failed(failure) => {
                warn!(
                    resident_id = %self.resident_id,
                    action = request.action_type.as_wire(),
                    code = %failure.code,
                    "Action failed"
                );
            }
            Completion::Discarded { .. } => {}
        }
        let notification = panel.notification(&self.resident_id);
        drop(panel);
        deliver(notification);
        Ok(completion)
    }

    /// Mark the panel unmounted. In-flight results are dropped from now on.
    pub async fn detach(&self) {
        let mut panel = self.panel.lock().await;
        panel.attached = false;
        panel.on_change = None;
        debug!(resident_id = %self.resident_id, "Panel detached");
    }

    pub async fn is_attached(&self) -> bool {
        self.panel.lock().await.attached
    }

    pub async fn view(&self) -> PanelView {
        self.panel.lock().await.view(&self.resident_id)
    }

    pub async fn block(&self) -> Option<BlockingRule> {
        self.panel.lock().await.block.current().cloned()
    }

    pub async fn dismiss_block(&self) -> Option<BlockingRule> {
        let (rule, notification) = {
            let mut panel = self.panel.lock().await;
            let rule = panel.block.dismiss();
            (rule, panel.notification(&self.resident_id))
        };
        deliver(notification);
        rule
    }

    /// Send the user to the block's remediation path and close it.
    pub async fn navigate_remediation<F>(&self, go: F) -> bool
    where
        F: FnOnce(&str),
    {
        let (navigated, notification) = {
            let mut panel = self.panel.lock().await;
            let navigated = panel.block.navigate(go);
            (navigated, panel.notification(&self.resident_id))
        };
        deliver(notification);
        navigated
    }

    pub async fn dismiss_care_error(&self) -> Option<DispatchFailure> {
        let (error, notification) = {
            let mut panel = self.panel.lock().await;
            let error = panel.care.dismiss_error();
            (error, panel.notification(&self.resident_id))
        };
        deliver(notification);
        error
    }

    pub async fn dismiss_emergency_error(&self) -> Option<DispatchFailure> {
        let (error, notification) = {
            let mut panel = self.panel.lock().await;
            let error = panel.emergency.dismiss_error();
            (error, panel.notification(&self.resident_id))
        };
        deliver(notification);
        error
    }
}
