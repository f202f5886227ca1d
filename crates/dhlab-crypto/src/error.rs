//! Provider errors.

use dhlab_core::ExchangeError;
use serde::Serialize;
use thiserror::Error;

/// Errors from a cryptography provider.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderError {
    /// Host lacks the capability
    #[error("provider unavailable: {capability}")]
    Unavailable {
        /// Capability that was requested
        capability: &'static str,
    },

    /// Provider does not implement the requested group
    #[error("unsupported group: {group}")]
    UnsupportedGroup {
        /// Requested group
        group: String,
    },

    /// Key of the wrong size
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// IV of the wrong size
    #[error("invalid iv length: expected {expected} bytes, got {actual}")]
    InvalidIvLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Requested derivation length is not a positive multiple of 8 or is
    /// too long for HKDF
    #[error("invalid bit length {bits}")]
    InvalidBitLength {
        /// Requested length
        bits: usize,
    },

    /// Peer key is a low-order point; the shared secret would be all zeroes
    #[error("peer public key is a low-order point")]
    WeakPeerKey,

    /// Both sides derived different bits
    #[error("derived secrets disagree")]
    SecretMismatch,

    /// AEAD tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,
}

impl ProviderError {
    /// Returns true if the capability is missing and callers should fall back
    /// to pedagogical mode.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns true if retrying with the same inputs cannot succeed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable { .. } => false,
            Self::UnsupportedGroup { .. }
            | Self::InvalidKeyLength { .. }
            | Self::InvalidIvLength { .. }
            | Self::InvalidBitLength { .. }
            | Self::WeakPeerKey
            | Self::SecretMismatch
            | Self::AuthenticationFailed => true,
        }
    }
}

/// Errors from a mode-dispatched exchange or the hybrid demo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Provider failure that was not a fallback case
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Pedagogical exchange failure
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_degrades() {
        let unavailable = ProviderError::Unavailable { capability: "generate_key_pair" };
        assert!(unavailable.is_unavailable());
        assert!(!unavailable.is_fatal());

        assert!(!ProviderError::AuthenticationFailed.is_unavailable());
        assert!(ProviderError::AuthenticationFailed.is_fatal());
    }

    #[test]
    fn error_messages() {
        insta::assert_snapshot!(
            ProviderError::InvalidKeyLength { expected: 32, actual: 8 }.to_string(),
            @"invalid key length: expected 32 bytes, got 8"
        );
        insta::assert_snapshot!(
            CryptoError::from(ProviderError::Unavailable { capability: "encrypt" }).to_string(),
            @"provider error: provider unavailable: encrypt"
        );
    }
}
