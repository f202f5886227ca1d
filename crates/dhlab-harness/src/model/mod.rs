//! Model-based testing for lifecycle sessions.
//!
//! A reference model ([`ModelLifecycle`]) and the real `LifecycleManager`
//! receive the same [`LifecycleOp`] sequence; their results and
//! [`ObservableLifecycle`] states must match after every step.

mod operation;
mod world;

pub use operation::{LifecycleOp, MAX_TICKS_PER_OP, OperationError, OperationResult};
pub use world::{ModelGeneration, ModelLifecycle, ObservableLifecycle};
