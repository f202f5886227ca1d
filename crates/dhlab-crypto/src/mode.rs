//! Mode-dispatched exchange and the hybrid encryption demo.
//!
//! `Mode::Production` runs key agreement through a [`CryptoProvider`]. When
//! the provider reports [`ProviderError::Unavailable`] the exchange degrades
//! to the pedagogical core instead of failing, and the outcome says so. Any
//! other provider error is returned as is.

use dhlab_core::{
    DomainParameters, Environment, ExchangeError, ExchangeSession, random_private_key,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CryptoError, ProviderError},
    provider::{CryptoProvider, Group, SymmetricCipher, XNONCE_LEN},
    toy::ToyCipher,
};

/// Bits derived by a production exchange (one XChaCha20 key).
pub const DEFAULT_DERIVED_BITS: usize = 256;

/// IV length used by the toy cipher.
pub const TOY_IV_LEN: usize = 8;

/// Which path an exchange takes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Small-integer core, fully synchronous
    #[default]
    Pedagogical,
    /// External provider
    Production,
}

/// Two-party exchange run through a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderExchange {
    /// Provider that ran it
    pub provider: &'static str,
    /// Group used
    pub group: Group,
    /// First party's public key
    pub public_a: Vec<u8>,
    /// Second party's public key
    pub public_b: Vec<u8>,
    /// Bits both parties derived
    pub shared_bits: Vec<u8>,
}

/// Generate two key pairs through `provider`, derive from both sides and
/// compare.
///
/// # Errors
///
/// - Any error the provider reports
/// - `ProviderError::SecretMismatch` if the two derivations differ
pub async fn provider_exchange<P: CryptoProvider>(
    provider: &P,
    group: Group,
    bit_length: usize,
) -> Result<ProviderExchange, ProviderError> {
    let alice = provider.generate_key_pair(group).await?;
    let bob = provider.generate_key_pair(group).await?;

    let bits_a = provider.derive_bits(&alice, bob.public_key(), bit_length).await?;
    let bits_b = provider.derive_bits(&bob, alice.public_key(), bit_length).await?;
    if bits_a != bits_b {
        return Err(ProviderError::SecretMismatch);
    }

    tracing::debug!(provider = provider.name(), %group, bit_length, "provider exchange complete");

    Ok(ProviderExchange {
        provider: provider.name(),
        group,
        public_a: alice.public_key().to_vec(),
        public_b: bob.public_key().to_vec(),
        shared_bits: bits_a,
    })
}

/// Result of [`run_exchange`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExchangeOutcome {
    /// Provider exchange succeeded
    Production(ProviderExchange),
    /// Pedagogical exchange, possibly after a degraded production request
    Pedagogical {
        /// Completed session
        session: ExchangeSession,
        /// Provider error that forced the fallback
        degraded_from: Option<ProviderError>,
    },
}

impl ExchangeOutcome {
    /// Mode that actually ran.
    pub fn mode(&self) -> Mode {
        match self {
            Self::Production(_) => Mode::Production,
            Self::Pedagogical { .. } => Mode::Pedagogical,
        }
    }

    /// Returns true if production was requested but unavailable.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Pedagogical { degraded_from: Some(_), .. })
    }
}

/// Run an exchange in `mode`.
///
/// Pedagogical private keys are drawn from `env` over `params`.
///
/// # Errors
///
/// - `CryptoError::Provider` for provider failures other than
///   `Unavailable`
/// - `CryptoError::Exchange` if the pedagogical exchange fails
pub async fn run_exchange<P: CryptoProvider, E: Environment>(
    mode: Mode,
    provider: &P,
    env: &E,
    params: &DomainParameters,
) -> Result<ExchangeOutcome, CryptoError> {
    match mode {
        Mode::Pedagogical => Ok(pedagogical(env, params, None)?),
        Mode::Production => {
            match provider_exchange(provider, Group::X25519, DEFAULT_DERIVED_BITS).await {
                Ok(exchange) => Ok(ExchangeOutcome::Production(exchange)),
                Err(err) if err.is_unavailable() => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "provider unavailable, degrading to pedagogical mode"
                    );
                    Ok(pedagogical(env, params, Some(err))?)
                },
                Err(err) => Err(err.into()),
            }
        },
    }
}

fn pedagogical<E: Environment>(
    env: &E,
    params: &DomainParameters,
    degraded_from: Option<ProviderError>,
) -> Result<ExchangeOutcome, ExchangeError> {
    let private_a = random_private_key(env, params)?;
    let private_b = random_private_key(env, params)?;
    let session = ExchangeSession::run(*params, private_a, private_b)?;
    Ok(ExchangeOutcome::Pedagogical { session, degraded_from })
}

/// Everything the hybrid demo did, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridTranscript {
    /// Key agreement outcome
    pub exchange: ExchangeOutcome,
    /// Cipher used for the message
    pub cipher: &'static str,
    /// IV drawn for the message
    pub iv: Vec<u8>,
    /// Encrypted message
    pub ciphertext: Vec<u8>,
    /// Decrypted message
    pub recovered: Vec<u8>,
}

impl HybridTranscript {
    /// Returns true if decryption gave back `message`.
    pub fn round_trips(&self, message: &[u8]) -> bool {
        self.recovered == message
    }
}

/// Agree on a key, then encrypt and decrypt `message` under it.
///
/// Production outcomes use the provider's cipher with the derived bits as
/// key. Pedagogical outcomes use [`ToyCipher`] keyed with the big-endian
/// shared secret.
///
/// # Errors
///
/// Same as [`run_exchange`], plus cipher failures.
pub async fn hybrid_demo<P: CryptoProvider, E: Environment>(
    mode: Mode,
    provider: &P,
    env: &E,
    params: &DomainParameters,
    message: &[u8],
) -> Result<HybridTranscript, CryptoError> {
    let exchange = run_exchange(mode, provider, env, params).await?;

    let (cipher, iv, ciphertext, recovered) = match &exchange {
        ExchangeOutcome::Production(agreed) => {
            let mut iv = vec![0u8; XNONCE_LEN];
            env.random_bytes(&mut iv);
            let ciphertext = provider.encrypt(&agreed.shared_bits, &iv, message).await?;
            let recovered = provider.decrypt(&agreed.shared_bits, &iv, &ciphertext).await?;
            (provider.label(), iv, ciphertext, recovered)
        },
        ExchangeOutcome::Pedagogical { session, .. } => {
            let secret = session.shared_secret().ok_or(ExchangeError::InvalidState {
                phase: session.phase(),
                operation: "encrypt with shared secret",
            })?;
            let key = secret.to_be_bytes();
            let mut iv = vec![0u8; TOY_IV_LEN];
            env.random_bytes(&mut iv);
            let ciphertext = ToyCipher.encrypt(&key, &iv, message).await?;
            let recovered = ToyCipher.decrypt(&key, &iv, &ciphertext).await?;
            (ToyCipher.label(), iv, ciphertext, recovered)
        },
    };

    tracing::info!(mode = ?exchange.mode(), cipher, bytes = message.len(), "hybrid demo complete");

    Ok(HybridTranscript { exchange, cipher, iv, ciphertext, recovered })
}
