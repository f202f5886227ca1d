//! Cryptography provider boundary for dhlab.
//!
//! The pedagogical core never calls into real cryptography. This crate is
//! the other side of that boundary:
//!
//! - [`CryptoProvider`]: async capability interface (key pairs, bit
//!   derivation, authenticated encryption)
//! - [`DalekProvider`]: X25519 + HKDF-SHA256 + XChaCha20-Poly1305
//! - [`UnavailableProvider`]: a host without a provider
//! - [`ToyCipher`]: labelled XOR cipher behind the same [`SymmetricCipher`]
//!   interface, for pedagogical mode only
//! - [`run_exchange`] / [`hybrid_demo`]: production mode with graceful
//!   degradation to the pedagogical core

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod mode;
pub mod provider;
pub mod toy;

pub use error::{CryptoError, ProviderError};
pub use mode::{
    DEFAULT_DERIVED_BITS, ExchangeOutcome, HybridTranscript, Mode, ProviderExchange, TOY_IV_LEN,
    hybrid_demo, provider_exchange, run_exchange,
};
pub use provider::{
    AEAD_KEY_LEN, CryptoProvider, DalekProvider, Group, KeyPair, MAX_DERIVED_BITS, ProviderSecret,
    SymmetricCipher, UnavailableProvider, X25519_KEY_LEN, XChaChaCipher, XNONCE_LEN,
};
pub use toy::ToyCipher;
