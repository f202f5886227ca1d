//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Lifecycle snapshots are kept as a history so invariants can compare
//! successive states (monotonicity, no resurrection).

use dhlab_core::{Environment, ExchangeSession, LifecycleManager, LifecycleSnapshot};

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Lifecycle states of one session, oldest first.
    pub lifecycle: Vec<LifecycleSnapshot>,
    /// Exchange sessions observed.
    pub exchanges: Vec<ExchangeSession>,
}

impl SystemSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot holding a manager's current state.
    pub fn from_manager<E: Environment>(manager: &LifecycleManager<E>) -> Self {
        Self { lifecycle: vec![manager.snapshot()], exchanges: Vec::new() }
    }

    /// Append the manager's current state to the history.
    pub fn record<E: Environment>(&mut self, manager: &LifecycleManager<E>) {
        self.lifecycle.push(manager.snapshot());
    }

    /// Add an exchange session.
    #[must_use]
    pub fn with_exchange(mut self, session: ExchangeSession) -> Self {
        self.exchanges.push(session);
        self
    }

    /// Most recent lifecycle state.
    pub fn latest(&self) -> Option<&LifecycleSnapshot> {
        self.lifecycle.last()
    }
}
