//! Honest two-party Diffie-Hellman exchange.
//!
//! Free functions cover the primitives ([`generate_key_pair`],
//! [`derive_shared_secret`], [`validate_public_key`]); [`ExchangeSession`]
//! strings them together as a state machine so every intermediate value can
//! be snapshotted and rendered.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ generate_keys ┌───────────────┐ exchange_public_keys ┌─────────────────────┐
//! │ Idle │──────────────>│ KeysGenerated │─────────────────────>│ PublicKeysExchanged │
//! └──────┘               └───────────────┘                      └─────────────────────┘
//!    │                           │                                         │
//!    │                           │ validation error                        │ derive_shared_secrets
//!    ↓                           ↓                                         ↓
//! ┌────────┐                ┌────────┐                              ┌───────────┐
//! │ Failed │<───────────────│ Failed │<─────────────────────────────│ Completed │
//! └────────┘                └────────┘     weak key / mismatch      └───────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    env::Environment,
    error::{ExchangeError, ValidationError},
    modexp::pow,
    params::DomainParameters,
};

/// Name of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    /// Create a party id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side a party is on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Legitimate participant, identified by the name peers expect
    Honest(PartyId),
    /// Adversary in the middle
    Adversary,
}

impl Role {
    /// Role label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Honest(_) => "honest",
            Self::Adversary => "adversary",
        }
    }
}

/// A participant with its key pair for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    id: PartyId,
    private_key: u64,
    public_key: Option<u64>,
    role: Role,
}

impl Party {
    /// Party without keys yet.
    pub fn new(id: impl Into<PartyId>, role: Role) -> Self {
        Self { id: id.into(), private_key: 0, public_key: None, role }
    }

    /// Honest party named `id`.
    pub fn honest(id: impl Into<PartyId>) -> Self {
        let id = id.into();
        Self::new(id.clone(), Role::Honest(id))
    }

    /// Adversary named `id`.
    pub fn adversary(id: impl Into<PartyId>) -> Self {
        Self::new(id, Role::Adversary)
    }

    /// Party id.
    pub fn id(&self) -> &PartyId {
        &self.id
    }

    /// Role.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Private key (`0` until keys are generated).
    pub fn private_key(&self) -> u64 {
        self.private_key
    }

    /// Public key, once generated.
    pub fn public_key(&self) -> Option<u64> {
        self.public_key
    }

    /// Public key, or [`ValidationError::MissingPublicKey`].
    pub fn require_public_key(&self) -> Result<u64, ValidationError> {
        self.public_key.ok_or_else(|| ValidationError::MissingPublicKey { party: self.id.clone() })
    }

    /// Generate this party's key pair from `private_key`.
    ///
    /// See [`generate_key_pair`].
    pub fn with_keys(
        self,
        params: &DomainParameters,
        private_key: u64,
    ) -> Result<Self, ExchangeError> {
        generate_key_pair(params, self.id, self.role, private_key)
    }
}

/// Create a party whose public key is `generator^private_key mod prime`.
///
/// # Errors
///
/// - `ValidationError::PrivateKeyOutOfRange` unless `1 <= private_key <=
///   prime-1`
pub fn generate_key_pair(
    params: &DomainParameters,
    id: impl Into<PartyId>,
    role: Role,
    private_key: u64,
) -> Result<Party, ExchangeError> {
    validate_private_key(private_key, params)?;

    let public_key = pow(params.generator(), private_key, params.modulus());
    let id = id.into();

    tracing::debug!(party = %id, role = role.label(), public_key, "generated key pair");

    Ok(Party { id, private_key, public_key: Some(public_key), role })
}

/// Compute `peer_public^own_private mod prime`.
///
/// The peer's key is validated first: derivation never runs on a weak key.
///
/// # Errors
///
/// - `ValidationError::PrivateKeyOutOfRange` for a private key outside
///   `[1, prime-1]`
/// - `ValidationError::PublicKeyOutOfRange` or `WeakPublicKey` from
///   [`validate_public_key`]
pub fn derive_shared_secret(
    own_private: u64,
    peer_public: u64,
    params: &DomainParameters,
) -> Result<u64, ExchangeError> {
    validate_private_key(own_private, params)?;
    validate_public_key(peer_public, params)?;

    Ok(pow(peer_public, own_private, params.modulus()))
}

/// Reject public keys that are not residues or that sit in a small subgroup.
///
/// `0`, `1` and `prime-1` are refused: they pin the shared secret to at most
/// two values whatever the private key.
pub fn validate_public_key(public_key: u64, params: &DomainParameters) -> Result<(), ValidationError> {
    let prime = params.prime();
    if public_key >= prime {
        return Err(ValidationError::PublicKeyOutOfRange { public_key, prime });
    }
    if public_key <= 1 || public_key == prime - 1 {
        tracing::warn!(public_key, prime, "rejected weak public key");
        return Err(ValidationError::WeakPublicKey { public_key, prime });
    }
    Ok(())
}

fn validate_private_key(private_key: u64, params: &DomainParameters) -> Result<(), ValidationError> {
    if !(1..=params.max_private_key()).contains(&private_key) {
        return Err(ValidationError::PrivateKeyOutOfRange { private_key, prime: params.prime() });
    }
    Ok(())
}

/// Draw a private key whose public key passes [`validate_public_key`].
///
/// The first candidate is uniform in `[2, prime-2]`. If its public key is
/// weak (possible when the generator has small order or the modulus is
/// composite), candidates after it are tried in order, wrapping once
/// around the range.
///
/// # Errors
///
/// - `ValidationError::NoUsableKey` if every candidate maps to a weak public
///   key
pub fn random_private_key<E: Environment>(
    env: &E,
    params: &DomainParameters,
) -> Result<u64, ExchangeError> {
    let low = 2;
    let span = params.prime() - 3;
    let start = env.random_in_range(low, low + span - 1) - low;

    (0..span)
        .map(|offset| low + (start + offset) % span)
        .find(|&candidate| {
            let public_key = pow(params.generator(), candidate, params.modulus());
            validate_public_key(public_key, params).is_ok()
        })
        .ok_or_else(|| {
            ValidationError::NoUsableKey { generator: params.generator(), prime: params.prime() }
                .into()
        })
}

/// Exchange state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangePhase {
    /// No keys yet
    Idle,
    /// Both key pairs generated
    KeysGenerated,
    /// Each party holds the other's validated public key
    PublicKeysExchanged,
    /// Both parties derived the same secret
    Completed,
    /// A validation error ended the exchange
    Failed,
}

/// Honest two-party exchange.
///
/// Owned by the caller. Once [`ExchangePhase::Completed`] the session is
/// immutable: every transition method returns
/// [`ExchangeError::InvalidState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSession {
    parameters: DomainParameters,
    party_a: Party,
    party_b: Party,
    shared_secret_a: Option<u64>,
    shared_secret_b: Option<u64>,
    phase: ExchangePhase,
}

impl ExchangeSession {
    /// Create a session between two honest parties in
    /// [`ExchangePhase::Idle`].
    pub fn new(parameters: DomainParameters, a: impl Into<PartyId>, b: impl Into<PartyId>) -> Self {
        Self {
            parameters,
            party_a: Party::honest(a),
            party_b: Party::honest(b),
            shared_secret_a: None,
            shared_secret_b: None,
            phase: ExchangePhase::Idle,
        }
    }

    /// Run all three steps.
    pub fn run(
        parameters: DomainParameters,
        private_a: u64,
        private_b: u64,
    ) -> Result<Self, ExchangeError> {
        let mut session = Self::new(parameters, "alice", "bob");
        session.generate_keys(private_a, private_b)?;
        session.exchange_public_keys()?;
        session.derive_shared_secrets()?;
        Ok(session)
    }

    /// Generate both key pairs.
    ///
    /// # Errors
    ///
    /// - `ExchangeError::InvalidState` unless `Idle`
    /// - `ValidationError` for an out-of-range private key (session fails)
    pub fn generate_keys(&mut self, private_a: u64, private_b: u64) -> Result<(), ExchangeError> {
        self.expect_phase(ExchangePhase::Idle, "generate keys")?;

        let result = (|| -> Result<_, ExchangeError> {
            let a = self.party_a.clone().with_keys(&self.parameters, private_a)?;
            let b = self.party_b.clone().with_keys(&self.parameters, private_b)?;
            Ok((a, b))
        })();

        let (a, b) = self.fail_on_error(result)?;
        self.party_a = a;
        self.party_b = b;
        self.phase = ExchangePhase::KeysGenerated;
        Ok(())
    }

    /// Hand each public key to the other party, validating as it arrives.
    ///
    /// # Errors
    ///
    /// - `ExchangeError::InvalidState` unless `KeysGenerated`
    /// - `ValidationError::WeakPublicKey` if either key is weak (session
    ///   fails)
    pub fn exchange_public_keys(&mut self) -> Result<(), ExchangeError> {
        self.expect_phase(ExchangePhase::KeysGenerated, "exchange public keys")?;

        let params = self.parameters;
        let result = [&self.party_a, &self.party_b].into_iter().try_for_each(|party| {
            let public_key = party.require_public_key()?;
            validate_public_key(public_key, &params)
        });
        self.fail_on_error(result.map_err(ExchangeError::from))?;

        tracing::debug!(
            party_a = %self.party_a.id,
            party_b = %self.party_b.id,
            "public keys exchanged"
        );

        self.phase = ExchangePhase::PublicKeysExchanged;
        Ok(())
    }

    /// Each party derives the secret from its private key and the peer's
    /// public key.
    ///
    /// # Errors
    ///
    /// - `ExchangeError::InvalidState` unless `PublicKeysExchanged`
    /// - `ExchangeError::SecretMismatch` if the two derivations differ
    pub fn derive_shared_secrets(&mut self) -> Result<u64, ExchangeError> {
        self.expect_phase(ExchangePhase::PublicKeysExchanged, "derive shared secrets")?;

        let result = (|| -> Result<_, ExchangeError> {
            let public_a = self.party_a.require_public_key()?;
            let public_b = self.party_b.require_public_key()?;
            let secret_a = derive_shared_secret(self.party_a.private_key, public_b, &self.parameters)?;
            let secret_b = derive_shared_secret(self.party_b.private_key, public_a, &self.parameters)?;
            Ok((secret_a, secret_b))
        })();
        let (secret_a, secret_b) = self.fail_on_error(result)?;

        self.shared_secret_a = Some(secret_a);
        self.shared_secret_b = Some(secret_b);

        if secret_a != secret_b {
            self.phase = ExchangePhase::Failed;
            return Err(ExchangeError::SecretMismatch { secret_a, secret_b });
        }

        tracing::debug!(shared_secret = secret_a, "exchange completed");

        self.phase = ExchangePhase::Completed;
        Ok(secret_a)
    }

    fn expect_phase(&self, expected: ExchangePhase, operation: &'static str) -> Result<(), ExchangeError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ExchangeError::InvalidState { phase: self.phase, operation })
        }
    }

    fn fail_on_error<T>(&mut self, result: Result<T, ExchangeError>) -> Result<T, ExchangeError> {
        if let Err(error) = &result {
            tracing::debug!(phase = ?self.phase, %error, "exchange failed");
            self.phase = ExchangePhase::Failed;
        }
        result
    }

    /// Current phase.
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Domain parameters.
    pub fn parameters(&self) -> &DomainParameters {
        &self.parameters
    }

    /// First party.
    pub fn party_a(&self) -> &Party {
        &self.party_a
    }

    /// Second party.
    pub fn party_b(&self) -> &Party {
        &self.party_b
    }

    /// Secret derived by party A.
    pub fn shared_secret_a(&self) -> Option<u64> {
        self.shared_secret_a
    }

    /// Secret derived by party B.
    pub fn shared_secret_b(&self) -> Option<u64> {
        self.shared_secret_b
    }

    /// The agreed secret, only once `Completed`.
    pub fn shared_secret(&self) -> Option<u64> {
        match self.phase {
            ExchangePhase::Completed => {
                debug_assert_eq!(self.shared_secret_a, self.shared_secret_b);
                self.shared_secret_a
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DomainParameters {
        DomainParameters::educational()
    }

    #[test]
    fn textbook_exchange() {
        let session = ExchangeSession::run(params(), 6, 15).unwrap();
        assert_eq!(session.phase(), ExchangePhase::Completed);
        assert_eq!(session.party_a().public_key(), Some(8));
        assert_eq!(session.party_b().public_key(), Some(19));
        assert_eq!(session.shared_secret(), Some(2));
    }

    #[test]
    fn derivation_uses_peer_public_and_own_private() {
        assert_eq!(derive_shared_secret(6, 19, &params()).unwrap(), 2);
        assert_eq!(derive_shared_secret(15, 8, &params()).unwrap(), 2);
    }

    #[test]
    fn weak_public_keys_rejected() {
        for weak in [0, 1, 22] {
            let err = derive_shared_secret(6, weak, &params()).unwrap_err();
            assert!(err.is_weak_key(), "{weak} should be weak");
        }
        assert_eq!(
            derive_shared_secret(6, 23, &params()),
            Err(ExchangeError::Validation(ValidationError::PublicKeyOutOfRange {
                public_key: 23,
                prime: 23
            }))
        );
    }

    #[test]
    fn private_key_range() {
        assert!(generate_key_pair(&params(), "alice", Role::Honest("alice".into()), 0).is_err());
        assert!(generate_key_pair(&params(), "alice", Role::Honest("alice".into()), 23).is_err());
        assert!(generate_key_pair(&params(), "alice", Role::Honest("alice".into()), 22).is_ok());
    }

    #[test]
    fn weak_generated_key_fails_session_on_exchange() {
        // 5^11 = -1 mod 23
        let mut session = ExchangeSession::new(params(), "alice", "bob");
        session.generate_keys(11, 15).unwrap();
        assert_eq!(session.party_a().public_key(), Some(22));

        let err = session.exchange_public_keys().unwrap_err();
        assert!(err.is_weak_key());
        assert_eq!(session.phase(), ExchangePhase::Failed);
    }

    #[test]
    fn out_of_range_private_key_fails_session() {
        let mut session = ExchangeSession::new(params(), "alice", "bob");
        assert!(session.generate_keys(0, 15).is_err());
        assert_eq!(session.phase(), ExchangePhase::Failed);
    }

    #[test]
    fn steps_out_of_order_are_rejected_without_failing() {
        let mut session = ExchangeSession::new(params(), "alice", "bob");
        let err = session.derive_shared_secrets().unwrap_err();
        assert_eq!(err, ExchangeError::InvalidState {
            phase: ExchangePhase::Idle,
            operation: "derive shared secrets"
        });
        assert_eq!(session.phase(), ExchangePhase::Idle);
    }

    #[test]
    fn completed_session_is_immutable() {
        let mut session = ExchangeSession::run(params(), 6, 15).unwrap();
        assert!(session.generate_keys(3, 4).is_err());
        assert!(session.exchange_public_keys().is_err());
        assert!(session.derive_shared_secrets().is_err());
        assert_eq!(session.shared_secret(), Some(2));
    }

    #[test]
    fn missing_public_key_reported_by_party() {
        let party = Party::honest("carol");
        assert_eq!(
            party.require_public_key(),
            Err(ValidationError::MissingPublicKey { party: PartyId::new("carol") })
        );
    }

    #[test]
    fn error_messages() {
        let err = derive_shared_secret(6, 22, &params()).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"validation error: weak public key 22 rejected (small subgroup of Z*_23)");

        let err = generate_key_pair(&params(), "alice", Role::Honest("alice".into()), 40).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"validation error: private key 40 outside [1, 22]");
    }
}
