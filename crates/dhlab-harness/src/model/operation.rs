//! Operations for model-based testing.
//!
//! Operations represent every external input a lifecycle session accepts.
//! They are generated randomly by proptest (or decoded from raw bytes) and
//! applied to both the model and the real manager.

use arbitrary::{Arbitrary, Unstructured};
use dhlab_core::LifecycleError;

/// Largest number of ticks a single [`LifecycleOp::Tick`] advances.
pub const MAX_TICKS_PER_OP: u8 = 8;

/// Operations that can be applied to a lifecycle session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum LifecycleOp {
    /// Advance the clock.
    Tick {
        /// Raw tick count, folded into `1..=MAX_TICKS_PER_OP`.
        count: u8,
    },

    /// Request a manual rotation.
    RequestRotation,

    /// Abort an in-flight rotation.
    AbortRotation,

    /// Count one encryption under the active generation.
    RecordUsage,

    /// Retire the current generation as compromised.
    MarkCompromised,

    /// Record an external threat report.
    ReportThreat,

    /// Set the threat level directly.
    SetThreatLevel {
        /// New level (clamped to 100 by the monitor).
        level: u8,
    },
}

impl LifecycleOp {
    /// Number of ticks this operation advances; zero for everything but
    /// `Tick`.
    pub fn ticks(&self) -> u64 {
        match self {
            Self::Tick { count } => u64::from(count % MAX_TICKS_PER_OP) + 1,
            _ => 0,
        }
    }

    /// Decode an operation sequence from raw bytes.
    ///
    /// Stops at the first byte run that no longer decodes, so any input
    /// yields a (possibly empty) valid sequence.
    pub fn sequence_from_bytes(data: &[u8]) -> Vec<Self> {
        let mut input = Unstructured::new(data);
        let mut ops = Vec::new();
        while !input.is_empty() {
            match Self::arbitrary(&mut input) {
                Ok(op) => ops.push(op),
                Err(_) => break,
            }
        }
        ops
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// A rotation is already in flight.
    Busy,

    /// Abort with nothing to abort.
    NoRotationInProgress,

    /// Manual rotation requested while the manual policy is off.
    ManualRotationDisabled,

    /// No unused public key left.
    KeySpaceExhausted,

    /// Error the model never produces.
    Unexpected(String),
}

impl From<&LifecycleError> for OperationError {
    fn from(error: &LifecycleError) -> Self {
        match error {
            LifecycleError::Busy { .. } => Self::Busy,
            LifecycleError::NoRotationInProgress => Self::NoRotationInProgress,
            LifecycleError::ManualRotationDisabled => Self::ManualRotationDisabled,
            LifecycleError::KeySpaceExhausted { .. } => Self::KeySpaceExhausted,
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl<T> From<Result<T, LifecycleError>> for OperationResult {
    fn from(result: Result<T, LifecycleError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => Self::Error(OperationError::from(&e)),
        }
    }
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
