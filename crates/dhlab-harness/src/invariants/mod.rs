//! Safety properties of key lifecycles and exchanges.
//!
//! A [`SystemSnapshot`] collects what a test observed: the lifecycle
//! snapshots taken after each step and any completed exchange sessions. Each
//! [`Invariant`] inspects the whole collection, so properties that relate
//! consecutive snapshots (ids only grow, retired keys stay retired) are
//! checked the same way as single-state ones.
//!
//! ```ignore
//! let mut history = SystemSnapshot::from_manager(&manager);
//! manager.tick()?;
//! history.record(&manager);
//! InvariantRegistry::standard().assert_all(&history, "after tick");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    ForwardSecrecy, GenerationIdMonotonicity, NoResurrection, SharedSecretAgreement,
    SingleCurrentGeneration,
};
use serde::Serialize;
pub use snapshot::SystemSnapshot;

/// Outcome of one invariant check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Which invariant
    pub invariant: &'static str,
    /// Offending state, for the test log
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Property checked against recorded state.
pub trait Invariant: Send + Sync {
    /// Stable identifier, used in violations.
    fn name(&self) -> &'static str;

    /// Inspect `state`; the first offending observation is returned.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invariant this crate defines:
    ///
    /// - [`SingleCurrentGeneration`]
    /// - [`GenerationIdMonotonicity`]
    /// - [`NoResurrection`]
    /// - [`ForwardSecrecy`]
    /// - [`SharedSecretAgreement`]
    pub fn standard() -> Self {
        Self::new()
            .with(SingleCurrentGeneration)
            .with(GenerationIdMonotonicity)
            .with(NoResurrection)
            .with(ForwardSecrecy)
            .with(SharedSecretAgreement)
    }

    /// Register `invariant`.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, invariant: I) -> Self {
        self.add(invariant);
        self
    }

    /// Run every invariant; all violations are collected and logged.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|invariant| invariant.check(state).err()).collect();

        for violation in &violations {
            tracing::error!(
                invariant = violation.invariant,
                message = %violation.message,
                "invariant violated"
            );
        }

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// [`check_all`](Self::check_all) for tests: panics listing every
    /// violation, prefixed with `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", lines.join("\n  "));
        }
    }

    /// Names of the registered invariants, in check order.
    pub fn names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|invariant| invariant.name()).collect()
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
