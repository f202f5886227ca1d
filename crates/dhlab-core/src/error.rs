//! Error types for the Diffie-Hellman protocol core.
//!
//! Strongly-typed errors for the pedagogical layer: validation errors
//! (malformed parameters, weak keys, role mix-ups), overflow errors (inputs
//! outside the exact integer domain) and state-machine misuse.
//!
//! Signature verification failures are deliberately absent: a failed check
//! is a normal outcome and is reported as a
//! [`VerificationFailure`](crate::signature::VerificationFailure) value.

use thiserror::Error;

use crate::exchange::{ExchangePhase, PartyId};

/// Rejected input: malformed domain parameters, an out-of-range key or a weak
/// public key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Modulus of zero has no residues
    #[error("modulus must be at least 1")]
    ZeroModulus,

    /// Prime too small to host a generator in `[2, prime-2]`
    #[error("prime {prime} is too small (minimum {minimum})")]
    PrimeTooSmall {
        /// Offered prime
        prime: u64,
        /// Smallest accepted prime
        minimum: u64,
    },

    /// Prime failed the primality check
    #[error("{prime} is not prime")]
    NotPrime {
        /// Offered prime
        prime: u64,
    },

    /// Generator outside `[2, prime-2]`
    #[error("generator {generator} outside [2, {}]", .prime.saturating_sub(2))]
    GeneratorOutOfRange {
        /// Offered generator
        generator: u64,
        /// Prime of the group
        prime: u64,
    },

    /// Private key outside `[1, prime-1]`
    #[error("private key {private_key} outside [1, {}]", .prime.saturating_sub(1))]
    PrivateKeyOutOfRange {
        /// Offered private key
        private_key: u64,
        /// Prime of the group
        prime: u64,
    },

    /// Public key outside `[0, prime)`
    #[error("public key {public_key} is not a residue mod {prime}")]
    PublicKeyOutOfRange {
        /// Offered public key
        public_key: u64,
        /// Prime of the group
        prime: u64,
    },

    /// Public key is one of the known small-subgroup values `0`, `1`,
    /// `prime-1`
    #[error("weak public key {public_key} rejected (small subgroup of Z*_{prime})")]
    WeakPublicKey {
        /// Offered public key
        public_key: u64,
        /// Prime of the group
        prime: u64,
    },

    /// Every private key maps to a weak public key
    #[error("no private key gives a usable public key for g = {generator} mod {prime}")]
    NoUsableKey {
        /// Generator of the group
        generator: u64,
        /// Modulus of the group
        prime: u64,
    },

    /// Party has not generated a public key yet
    #[error("party {party} has no public key")]
    MissingPublicKey {
        /// Party without a key
        party: PartyId,
    },

    /// Party offered in the wrong role
    #[error("party {party} must play the {expected} role")]
    RoleMismatch {
        /// Offending party
        party: PartyId,
        /// Role the operation required
        expected: &'static str,
    },

    /// Signing key pair is malformed
    #[error("invalid signing key: {reason}")]
    InvalidSigningKey {
        /// Why the key was rejected
        reason: String,
    },
}

/// Parameters outside the host's exact integer domain.
///
/// Always raised by input validation. Exponentiation itself never discovers
/// an overflow because [`Modulus`](crate::modexp::Modulus) cannot hold a value
/// whose square overflows `u64`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value {value} exceeds the exact integer domain (max modulus {max})")]
pub struct OverflowError {
    /// Offered value
    pub value: u64,
    /// Largest accepted modulus
    pub max: u64,
}

/// Errors from the exchange protocol and the primitives under it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Input failed validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Input outside the exact integer domain
    #[error("overflow: {0}")]
    Overflow(#[from] OverflowError),

    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {phase:?}")]
    InvalidState {
        /// Phase when the error occurred
        phase: ExchangePhase,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Both parties derived different secrets
    ///
    /// Unreachable with honestly exchanged keys; kept so a broken exchange
    /// fails loudly instead of reporting completion.
    #[error("shared secrets diverged: party A has {secret_a}, party B has {secret_b}")]
    SecretMismatch {
        /// Secret derived by party A
        secret_a: u64,
        /// Secret derived by party B
        secret_b: u64,
    },
}

impl ExchangeError {
    /// Returns true if the caller supplied bad input.
    ///
    /// Configuration errors are shown to the learner and fixed by changing
    /// parameters. Everything else points at misuse of the state machine.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Overflow(_))
    }

    /// Returns true if this error is a weak-key rejection.
    pub fn is_weak_key(&self) -> bool {
        matches!(self, Self::Validation(ValidationError::WeakPublicKey { .. }))
    }
}
