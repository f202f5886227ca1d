//! Test harness for the dhlab protocol core.
//!
//! - [`SimEnv`]: seeded [`dhlab_core::Environment`]; one seed replays a run
//!   exactly
//! - [`model`]: a small reference lifecycle that operation sequences are
//!   replayed against alongside the real manager
//! - [`invariants`]: safety properties checked over recorded snapshots, see
//!   [`InvariantRegistry::standard`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;

pub use invariants::{
    ForwardSecrecy, GenerationIdMonotonicity, Invariant, InvariantRegistry, InvariantResult,
    NoResurrection, SharedSecretAgreement, SingleCurrentGeneration, SystemSnapshot, Violation,
};
pub use model::{
    LifecycleOp, MAX_TICKS_PER_OP, ModelGeneration, ModelLifecycle, ObservableLifecycle,
    OperationError, OperationResult,
};
pub use sim_env::{DEFAULT_SEED, SimEnv};
