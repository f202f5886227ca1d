//! Pedagogical Diffie-Hellman protocol core.
//!
//! Small-integer, pure protocol logic for teaching key agreement:
//!
//! - [`modexp`]: square-and-multiply exponentiation, with a step trace
//! - [`exchange`]: honest two-party exchange state machine
//! - [`interception`]: adversary-in-the-middle variant
//! - [`signature`]: RSA-style signatures binding public keys to their owners
//! - [`lifecycle`]: key generations and policy-driven rotation on a discrete
//!   clock
//! - [`strength`]: parameter strength audit
//!
//! Nothing here performs I/O or reads a clock. Randomness comes from an
//! [`Environment`], so a seeded environment replays any scenario exactly.
//!
//! # Security
//!
//! None. Arithmetic is variable-time on moduli of at most `2^32`. Use
//! `dhlab-crypto` for anything that should resist an attacker.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod exchange;
pub mod interception;
pub mod lifecycle;
pub mod modexp;
pub mod params;
pub mod signature;
pub mod strength;

pub use env::Environment;
pub use error::{ExchangeError, OverflowError, ValidationError};
pub use exchange::{
    ExchangePhase, ExchangeSession, Party, PartyId, Role, derive_shared_secret, generate_key_pair,
    random_private_key, validate_public_key,
};
pub use interception::{
    AdversarySession, Detection, HonestView, Interception, InterceptionOutcome, intercept,
    intercept_authenticated,
};
pub use lifecycle::{
    GenerationId, GenerationStatus, KeyGeneration, LifecycleConfig, LifecycleError, LifecycleEvent,
    LifecycleManager, LifecycleSnapshot, PolicySet, RotationPolicy, RotationReason, RotationTrigger,
    ThreatConfig, ThreatMonitor,
};
pub use modexp::{ExpStep, ExpTrace, MAX_MODULUS, Modulus, checked_pow, pow, pow_trace};
pub use params::{DomainParameters, ParameterPolicy, is_prime, is_safe_prime};
pub use signature::{
    KeyAcceptance, Signature, SignedPublicKey, SigningKey, Verification, VerificationFailure,
    VerifyingKey, accept_public_key, sign, sign_public_key, verify,
};
pub use strength::{StrengthLevel, StrengthReport, audit, audit_sizes};
