//! Cryptography provider capability interface.
//!
//! A provider generates key pairs, derives shared bits and runs authenticated
//! encryption. Every call is asynchronous from the caller's point of view and
//! may fail with [`ProviderError::Unavailable`] when the host lacks the
//! capability; callers degrade to pedagogical mode in that case.
//!
//! [`DalekProvider`] is the real implementation (X25519, HKDF-SHA256,
//! XChaCha20-Poly1305). [`UnavailableProvider`] models a host without one.

use std::{fmt, future::Future};

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use dhlab_core::{DomainParameters, Environment};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::ProviderError;

/// X25519 scalar and point size.
pub const X25519_KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 key size.
pub const AEAD_KEY_LEN: usize = 32;

/// XChaCha20 nonce size.
pub const XNONCE_LEN: usize = 24;

/// Longest HKDF-SHA256 output, in bits.
pub const MAX_DERIVED_BITS: usize = 255 * 32 * 8;

/// Label mixed into every derivation.
const DERIVE_INFO: &[u8] = b"dhlabProviderV1";

/// Key agreement group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// Curve25519 Diffie-Hellman
    X25519,
    /// Classic multiplicative group, as used by the pedagogical core
    Modp(DomainParameters),
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X25519 => f.write_str("x25519"),
            Self::Modp(params) => write!(f, "modp(p={}, g={})", params.prime(), params.generator()),
        }
    }
}

/// Private half of a provider key pair.
///
/// Zeroized on drop; `Debug` never prints the bytes.
pub struct ProviderSecret([u8; X25519_KEY_LEN]);

impl ProviderSecret {
    /// Raw secret bytes.
    pub fn expose_secret(&self) -> &[u8; X25519_KEY_LEN] {
        &self.0
    }
}

impl From<[u8; X25519_KEY_LEN]> for ProviderSecret {
    fn from(bytes: [u8; X25519_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for ProviderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderSecret(<redacted>)")
    }
}

impl Drop for ProviderSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Key pair issued by a provider.
#[derive(Debug)]
pub struct KeyPair {
    group: Group,
    public_key: Vec<u8>,
    secret: ProviderSecret,
}

impl KeyPair {
    /// Assemble a key pair.
    pub fn new(group: Group, public_key: Vec<u8>, secret: impl Into<ProviderSecret>) -> Self {
        Self { group, public_key, secret: secret.into() }
    }

    /// Group the pair belongs to.
    pub fn group(&self) -> Group {
        self.group
    }

    /// Encoded public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Private half.
    pub fn secret(&self) -> &ProviderSecret {
        &self.secret
    }
}

/// Encrypt/decrypt half of the provider interface.
///
/// Implemented by real AEADs and by the labelled toy cipher, so the two are
/// interchangeable at the call site.
pub trait SymmetricCipher: Send + Sync {
    /// Human-readable cipher name.
    fn label(&self) -> &'static str;

    /// Encrypt `plaintext` under `key` and `iv`.
    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Decrypt `ciphertext` under `key` and `iv`.
    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// Full provider capability: key agreement plus a symmetric cipher.
pub trait CryptoProvider: SymmetricCipher {
    /// Provider name for logs and transcripts.
    fn name(&self) -> &'static str;

    /// Generate a key pair in `group`.
    fn generate_key_pair(
        &self,
        group: Group,
    ) -> impl Future<Output = Result<KeyPair, ProviderError>> + Send;

    /// Derive `bit_length` bits from `own` and the peer's public key.
    fn derive_bits(
        &self,
        own: &KeyPair,
        peer_public: &[u8],
        bit_length: usize,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// XChaCha20-Poly1305 with a caller-supplied 24-byte nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaChaCipher;

impl XChaChaCipher {
    fn cipher(key: &[u8], iv: &[u8]) -> Result<(XChaCha20Poly1305, XNonce), ProviderError> {
        if key.len() != AEAD_KEY_LEN {
            return Err(ProviderError::InvalidKeyLength { expected: AEAD_KEY_LEN, actual: key.len() });
        }
        if iv.len() != XNONCE_LEN {
            return Err(ProviderError::InvalidIvLength { expected: XNONCE_LEN, actual: iv.len() });
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| ProviderError::InvalidKeyLength { expected: AEAD_KEY_LEN, actual: key.len() })?;
        Ok((cipher, *XNonce::from_slice(iv)))
    }

    fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let (cipher, nonce) = Self::cipher(key, iv)?;
        cipher.encrypt(&nonce, plaintext).map_err(|_| ProviderError::AuthenticationFailed)
    }

    fn open(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        let (cipher, nonce) = Self::cipher(key, iv)?;
        cipher.decrypt(&nonce, ciphertext).map_err(|_| ProviderError::AuthenticationFailed)
    }
}

impl SymmetricCipher for XChaChaCipher {
    fn label(&self) -> &'static str {
        "xchacha20-poly1305"
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Self::seal(key, iv, plaintext))
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Self::open(key, iv, ciphertext))
    }
}

/// Real provider: X25519 key agreement, HKDF-SHA256 expansion and
/// XChaCha20-Poly1305.
///
/// Private scalars come from the environment, so a seeded environment gives
/// reproducible key pairs in tests.
#[derive(Debug, Clone)]
pub struct DalekProvider<E: Environment> {
    env: E,
}

impl<E: Environment> DalekProvider<E> {
    /// Create a provider drawing randomness from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }

    fn generate(&self, group: Group) -> Result<KeyPair, ProviderError> {
        if group != Group::X25519 {
            return Err(ProviderError::UnsupportedGroup { group: group.to_string() });
        }

        let mut bytes = [0u8; X25519_KEY_LEN];
        self.env.random_bytes(&mut bytes);
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();

        let public_key = PublicKey::from(&secret).to_bytes().to_vec();
        tracing::debug!(%group, "generated provider key pair");

        Ok(KeyPair::new(group, public_key, secret.to_bytes()))
    }

    fn derive(own: &KeyPair, peer_public: &[u8], bit_length: usize) -> Result<Vec<u8>, ProviderError> {
        if own.group() != Group::X25519 {
            return Err(ProviderError::UnsupportedGroup { group: own.group().to_string() });
        }
        if bit_length == 0 || bit_length % 8 != 0 || bit_length > MAX_DERIVED_BITS {
            return Err(ProviderError::InvalidBitLength { bits: bit_length });
        }
        let peer: [u8; X25519_KEY_LEN] = peer_public.try_into().map_err(|_| {
            ProviderError::InvalidKeyLength { expected: X25519_KEY_LEN, actual: peer_public.len() }
        })?;

        let secret = StaticSecret::from(*own.secret().expose_secret());
        let shared = secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            tracing::warn!("rejected low-order peer key");
            return Err(ProviderError::WeakPeerKey);
        }

        let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut bits = vec![0u8; bit_length / 8];
        hkdf.expand(DERIVE_INFO, &mut bits)
            .map_err(|_| ProviderError::InvalidBitLength { bits: bit_length })?;

        tracing::debug!(bit_length, "derived provider bits");
        Ok(bits)
    }
}

impl<E: Environment> SymmetricCipher for DalekProvider<E> {
    fn label(&self) -> &'static str {
        XChaChaCipher.label()
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(XChaChaCipher::seal(key, iv, plaintext))
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(XChaChaCipher::open(key, iv, ciphertext))
    }
}

impl<E: Environment> CryptoProvider for DalekProvider<E> {
    fn name(&self) -> &'static str {
        "x25519-dalek"
    }

    fn generate_key_pair(
        &self,
        group: Group,
    ) -> impl Future<Output = Result<KeyPair, ProviderError>> + Send {
        std::future::ready(self.generate(group))
    }

    fn derive_bits(
        &self,
        own: &KeyPair,
        peer_public: &[u8],
        bit_length: usize,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Self::derive(own, peer_public, bit_length))
    }
}

/// Provider for a host without cryptography support; every call fails with
/// [`ProviderError::Unavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProvider;

impl SymmetricCipher for UnavailableProvider {
    fn label(&self) -> &'static str {
        "unavailable"
    }

    fn encrypt(
        &self,
        _key: &[u8],
        _iv: &[u8],
        _plaintext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Err(ProviderError::Unavailable { capability: "encrypt" }))
    }

    fn decrypt(
        &self,
        _key: &[u8],
        _iv: &[u8],
        _ciphertext: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Err(ProviderError::Unavailable { capability: "decrypt" }))
    }
}

impl CryptoProvider for UnavailableProvider {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn generate_key_pair(
        &self,
        _group: Group,
    ) -> impl Future<Output = Result<KeyPair, ProviderError>> + Send {
        std::future::ready(Err(ProviderError::Unavailable { capability: "generate_key_pair" }))
    }

    fn derive_bits(
        &self,
        _own: &KeyPair,
        _peer_public: &[u8],
        _bit_length: usize,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        std::future::ready(Err(ProviderError::Unavailable { capability: "derive_bits" }))
    }
}

#[cfg(test)]
mod tests {
    use dhlab_harness::SimEnv;

    use super::*;

    fn provider() -> DalekProvider<SimEnv> {
        DalekProvider::new(SimEnv::with_seed(99))
    }

    #[tokio::test]
    async fn both_sides_derive_the_same_bits() {
        let provider = provider();
        let alice = provider.generate_key_pair(Group::X25519).await.unwrap();
        let bob = provider.generate_key_pair(Group::X25519).await.unwrap();
        assert_ne!(alice.public_key(), bob.public_key());

        let a = provider.derive_bits(&alice, bob.public_key(), 256).await.unwrap();
        let b = provider.derive_bits(&bob, alice.public_key(), 256).await.unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn seeded_provider_is_reproducible() {
        let first = provider().generate_key_pair(Group::X25519).await.unwrap();
        let second = provider().generate_key_pair(Group::X25519).await.unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[tokio::test]
    async fn modp_group_unsupported() {
        let err = provider()
            .generate_key_pair(Group::Modp(DomainParameters::educational()))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::UnsupportedGroup { group: "modp(p=23, g=5)".to_owned() });
    }

    #[tokio::test]
    async fn bit_length_validated() {
        let provider = provider();
        let alice = provider.generate_key_pair(Group::X25519).await.unwrap();
        let bob = provider.generate_key_pair(Group::X25519).await.unwrap();

        for bits in [0, 7, MAX_DERIVED_BITS + 8] {
            assert_eq!(
                provider.derive_bits(&alice, bob.public_key(), bits).await,
                Err(ProviderError::InvalidBitLength { bits })
            );
        }
        assert_eq!(
            provider.derive_bits(&alice, &[1, 2, 3], 256).await,
            Err(ProviderError::InvalidKeyLength { expected: 32, actual: 3 })
        );
    }

    #[tokio::test]
    async fn low_order_peer_rejected() {
        let provider = provider();
        let alice = provider.generate_key_pair(Group::X25519).await.unwrap();
        let identity = [0u8; 32];
        assert_eq!(
            provider.derive_bits(&alice, &identity, 256).await,
            Err(ProviderError::WeakPeerKey)
        );
    }

    #[tokio::test]
    async fn aead_round_trip_and_tamper() {
        let cipher = XChaChaCipher;
        let key = [7u8; AEAD_KEY_LEN];
        let iv = [3u8; XNONCE_LEN];

        let mut sealed = cipher.encrypt(&key, &iv, b"meet at noon").await.unwrap();
        assert_eq!(cipher.decrypt(&key, &iv, &sealed).await.unwrap(), b"meet at noon");

        sealed[0] ^= 1;
        assert_eq!(cipher.decrypt(&key, &iv, &sealed).await, Err(ProviderError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn aead_checks_lengths() {
        let cipher = XChaChaCipher;
        assert_eq!(
            cipher.encrypt(&[0; 16], &[0; XNONCE_LEN], b"x").await,
            Err(ProviderError::InvalidKeyLength { expected: 32, actual: 16 })
        );
        assert_eq!(
            cipher.encrypt(&[0; 32], &[0; 12], b"x").await,
            Err(ProviderError::InvalidIvLength { expected: 24, actual: 12 })
        );
    }

    #[tokio::test]
    async fn unavailable_provider_reports_capability() {
        let err = UnavailableProvider.generate_key_pair(Group::X25519).await.unwrap_err();
        assert_eq!(err, ProviderError::Unavailable { capability: "generate_key_pair" });
        assert!(err.is_unavailable());
    }

    #[test]
    fn secret_debug_redacted() {
        let pair = KeyPair::new(Group::X25519, vec![1; 32], [9u8; 32]);
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("9, 9"));
    }
}
