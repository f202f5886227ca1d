//! Lifecycle errors.

use thiserror::Error;

use super::generation::GenerationId;
use crate::error::ExchangeError;

/// Errors from the key lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A rotation is already in flight
    #[error("generation {generation} is already rotating")]
    Busy {
        /// Rotating generation
        generation: GenerationId,
    },

    /// Abort requested with no rotation in flight
    #[error("no rotation in progress")]
    NoRotationInProgress,

    /// Manual request while the manual policy is disabled
    #[error("manual rotation policy is disabled")]
    ManualRotationDisabled,

    /// Every usable public key has already been issued
    #[error("no unused public key left in Z*_{prime}")]
    KeySpaceExhausted {
        /// Prime of the group
        prime: u64,
    },

    /// Key material of a retired generation was requested
    #[error("key material of generation {generation} has been destroyed")]
    KeyMaterialRetired {
        /// Retired generation
        generation: GenerationId,
    },

    /// Generation does not exist
    #[error("unknown generation {generation}")]
    UnknownGeneration {
        /// Requested generation
        generation: GenerationId,
    },

    /// Key generation or derivation failed
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

impl LifecycleError {
    /// Returns true if retrying after the current rotation settles can
    /// succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Returns true if the session cannot mint any further generation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::KeySpaceExhausted { .. } => true,
            Self::Exchange(err) => err.is_configuration_error(),
            Self::Busy { .. }
            | Self::NoRotationInProgress
            | Self::ManualRotationDisabled
            | Self::KeyMaterialRetired { .. }
            | Self::UnknownGeneration { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_transient() {
        let err = LifecycleError::Busy { generation: GenerationId::new(3) };
        assert!(err.is_transient());
        assert!(!err.is_fatal());
        insta::assert_snapshot!(err.to_string(), @"generation #3 is already rotating");
    }

    #[test]
    fn exhaustion_is_fatal() {
        let err = LifecycleError::KeySpaceExhausted { prime: 23 };
        assert!(err.is_fatal());
        assert!(!err.is_transient());
    }
}
