//! View-level reconciliation state machine for one lifecycle.

use crate::lifecycle::Lifecycle;
use care_dispatch::{ActionKind, BlockingRule, DispatchFailure, DispatchOutcome, Snapshot, Version};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Identifies one dispatch attempt. Responses carrying a ticket that is no
/// longer pending are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Where the panel stands relative to its last dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase<A> {
    Idle,
    /// A dispatch is in flight.
    Pending {
        ticket: Ticket,
        action: A,
        dispatched_at: Version,
    },
    /// The backend accepted a transition we have not observed yet.
    Reconciling { awaiting_version: Version },
}

/// Everything the caller needs to send the request `begin` admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDispatch<A> {
    pub ticket: Ticket,
    pub action: A,
    pub expected_version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeginRejected {
    #[error("another action is still being processed")]
    AlreadyPending,
    #[error("actions are locked")]
    Locked,
    #[error("the last accepted change has not been observed yet")]
    Syncing,
    #[error("state has not been loaded yet")]
    NotLoaded,
    #[error("{0} is not available from the current state")]
    NotValid(String),
    #[error("the panel is no longer attached")]
    Detached,
}

/// Effect of an external observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Applied,
    /// Older than the cached version; ignored.
    Stale,
    /// Version advanced while a dispatch was pending; its response will be
    /// discarded.
    Superseded(Ticket),
}

/// Effect of a dispatch response.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Accepted { new_version: Version },
    /// Route to the block presentation.
    Blocked(BlockingRule),
    Failed(DispatchFailure),
    /// The ticket was superseded or the panel detached.
    Discarded { ticket: Ticket },
}

/// Reconciler for one lifecycle of one panel.
#[derive(Debug, Clone)]
pub struct Reconciler<L: Lifecycle> {
    observed: Option<Snapshot<L::State>>,
    optimistic: Option<L::State>,
    phase: Phase<L::Action>,
    locked: bool,
    error: Option<DispatchFailure>,
    next_ticket: u64,
}

impl<L: Lifecycle> Default for Reconciler<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Lifecycle> Reconciler<L> {
    pub fn new() -> Self {
        Self {
            observed: None,
            optimistic: None,
            phase: Phase::Idle,
            locked: false,
            error: None,
            next_ticket: 1,
        }
    }

    pub fn observed(&self) -> Option<Snapshot<L::State>> {
        self.observed
    }

    pub fn phase(&self) -> Phase<L::Action> {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    pub fn pending_action(&self) -> Option<L::Action> {
        match self.phase {
            Phase::Pending { action, .. } => Some(action),
            _ => None,
        }
    }

    /// True after an accepted dispatch until its version is observed.
    pub fn is_syncing(&self) -> bool {
        matches!(self.phase, Phase::Reconciling { .. })
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Optimistic guess if one is outstanding, else the observed state.
    pub fn displayed_state(&self) -> Option<L::State> {
        self.optimistic
            .or_else(|| self.observed.map(|snapshot| snapshot.state))
    }

    pub fn optimistic_state(&self) -> Option<L::State> {
        self.optimistic
    }

    /// Dismissible inline error from the last failed dispatch.
    pub fn error(&self) -> Option<&DispatchFailure> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) -> Option<DispatchFailure> {
        self.error.take()
    }

    pub fn set_locked(&mut self, locked: bool) {
        if self.locked != locked {
            debug!(lifecycle = L::NAME, locked, "Lock changed");
        }
        self.locked = locked;
    }

    /// Buttons to render right now. Empty while pending, syncing or locked.
    pub fn available_actions(&self) -> BTreeSet<L::Action> {
        if self.locked || self.is_pending() || self.is_syncing() {
            return BTreeSet::new();
        }
        match self.observed {
            Some(snapshot) => L::valid_actions(snapshot.state),
            None => BTreeSet::new(),
        }
    }

    /// Take in an externally observed snapshot.
    pub fn observe(&mut self, snapshot: Snapshot<L::State>) -> Observation {
        let previous = self.observed.map(|s| s.version);
        if previous.is_some_and(|version| snapshot.version < version) {
            debug!(
                lifecycle = L::NAME,
                observed = snapshot.version,
                cached = previous,
                "Ignoring stale observation"
            );
            return Observation::Stale;
        }

        let advanced = previous.is_some_and(|version| snapshot.version > version);
        self.observed = Some(snapshot);

        match self.phase {
            Phase::Pending { ticket, .. } if advanced => {
                debug!(
                    lifecycle = L::NAME,
                    ticket = ticket.id(),
                    version = snapshot.version,
                    "Version advanced while pending; superseding dispatch"
                );
                self.phase = Phase::Idle;
                self.optimistic = None;
                Observation::Superseded(ticket)
            }
            Phase::Reconciling { awaiting_version } if snapshot.version >= awaiting_version => {
                self.phase = Phase::Idle;
                Observation::Applied
            }
            _ => Observation::Applied,
        }
    }

    /// Admit a click. On success the caller must dispatch exactly once and
    /// hand the outcome to `complete`.
    pub fn begin(&mut self, action: L::Action) -> Result<PendingDispatch<L::Action>, BeginRejected> {
        if self.is_pending() {
            return Err(BeginRejected::AlreadyPending);
        }
        if self.locked {
            return Err(BeginRejected::Locked);
        }
        if self.is_syncing() {
            return Err(BeginRejected::Syncing);
        }
        let Some(snapshot) = self.observed else {
            return Err(BeginRejected::NotLoaded);
        };
        if !L::valid_actions(snapshot.state).contains(&action) {
            let kind: ActionKind = action.into();
            return Err(BeginRejected::NotValid(kind.as_wire().to_string()));
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        self.phase = Phase::Pending {
            ticket,
            action,
            dispatched_at: snapshot.version,
        };
        self.optimistic = L::optimistic_guess(snapshot.state, action);
        self.error = None;

        debug!(
            lifecycle = L::NAME,
            ticket = ticket.id(),
            expected_version = snapshot.version,
            optimistic = self.optimistic.is_some(),
            "Dispatch pending"
        );

        Ok(PendingDispatch {
            ticket,
            action,
            expected_version: snapshot.version,
        })
    }

    /// Apply the response for `ticket`. Never writes state or version into
    /// the cache; only observations do that.
    pub fn complete(&mut self, ticket: Ticket, outcome: DispatchOutcome) -> Completion {
        match self.phase {
            Phase::Pending { ticket: current, .. } if current == ticket => {}
            _ => {
                debug!(
                    lifecycle = L::NAME,
                    ticket = ticket.id(),
                    outcome = outcome.label(),
                    "Discarding response for superseded dispatch"
                );
                return Completion::Discarded { ticket };
            }
        }

        self.optimistic = None;

        match outcome {
            DispatchOutcome::Accepted { new_version } => {
                let seen = self.observed.is_some_and(|s| s.version >= new_version);
                self.phase = if seen {
                    Phase::Idle
                } else {
                    Phase::Reconciling {
                        awaiting_version: new_version,
                    }
                };
                Completion::Accepted { new_version }
            }
            DispatchOutcome::PolicyBlocked(rule) => {
                self.phase = Phase::Idle;
                Completion::Blocked(rule)
            }
            DispatchOutcome::Failed(failure) => {
                self.phase = Phase::Idle;
                self.error = Some(failure.clone());
                Completion::Failed(failure)
            }
        }
    }
}
