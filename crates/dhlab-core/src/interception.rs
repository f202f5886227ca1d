//! Adversary-in-the-middle simulation.
//!
//! The adversary sits on the wire between two honest parties and substitutes
//! its own public key in both directions. Each honest party completes what it
//! believes is an exchange with the other, but actually shares a secret with
//! the adversary. Every pairwise sub-exchange still commutes; only the
//! end-to-end assumption breaks.
//!
//! ```text
//!   alice ──A──> [adversary] ──M──> bob
//!   alice <──M── [adversary] <──B── bob
//!
//!   alice: M^a        = A^m        : adversary
//!   bob:   M^b        = B^m        : adversary
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    error::{ExchangeError, ValidationError},
    exchange::{Party, PartyId, Role, derive_shared_secret},
    params::DomainParameters,
    signature::{
        KeyAcceptance, SignedPublicKey, SigningKey, VerificationFailure, VerifyingKey,
        accept_public_key, public_key_message, sign_public_key,
    },
};

/// What the adversary ends up holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdversarySession {
    /// The adversary and its key pair
    pub adversary: Party,
    /// Secret shared with the first honest party
    pub secret_with_a: u64,
    /// Secret shared with the second honest party
    pub secret_with_b: u64,
}

/// What one honest party believes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HonestView {
    /// The honest party
    pub party: Party,
    /// Public key it received, believing it came from its peer
    pub received_public_key: u64,
    /// Secret it derived
    pub secret: u64,
}

/// Full result of an interception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interception {
    /// Domain parameters in use
    pub parameters: DomainParameters,
    /// First honest party's view
    pub alice: HonestView,
    /// Second honest party's view
    pub bob: HonestView,
    /// Adversary's secrets
    pub adversary: AdversarySession,
}

impl Interception {
    /// Secret shared by the first honest party and the adversary.
    pub fn secret_alice_adversary(&self) -> u64 {
        self.adversary.secret_with_a
    }

    /// Secret shared by the second honest party and the adversary.
    pub fn secret_bob_adversary(&self) -> u64 {
        self.adversary.secret_with_b
    }

    /// Whether the honest parties ended up with different secrets.
    pub fn end_to_end_broken(&self) -> bool {
        self.alice.secret != self.bob.secret
    }
}

fn require_honest(party: &Party) -> Result<u64, ExchangeError> {
    match party.role() {
        Role::Honest(_) => Ok(party.require_public_key()?),
        Role::Adversary => Err(ValidationError::RoleMismatch {
            party: party.id().clone(),
            expected: "honest",
        }
        .into()),
    }
}

fn require_adversary(party: &Party) -> Result<u64, ExchangeError> {
    match party.role() {
        Role::Adversary => Ok(party.require_public_key()?),
        Role::Honest(_) => Err(ValidationError::RoleMismatch {
            party: party.id().clone(),
            expected: "adversary",
        }
        .into()),
    }
}

/// One honest party and the adversary derive their secret independently.
fn sub_exchange(
    honest: &Party,
    honest_public: u64,
    adversary: &Party,
    adversary_public: u64,
    params: &DomainParameters,
) -> Result<(HonestView, u64), ExchangeError> {
    let honest_secret = derive_shared_secret(honest.private_key(), adversary_public, params)?;
    let adversary_secret = derive_shared_secret(adversary.private_key(), honest_public, params)?;

    if honest_secret != adversary_secret {
        return Err(ExchangeError::SecretMismatch {
            secret_a: honest_secret,
            secret_b: adversary_secret,
        });
    }

    let view = HonestView {
        party: honest.clone(),
        received_public_key: adversary_public,
        secret: honest_secret,
    };
    Ok((view, adversary_secret))
}

/// Run the interception: the adversary substitutes its key toward both
/// honest parties.
///
/// All three parties must already hold key pairs.
///
/// # Errors
///
/// - `ValidationError::RoleMismatch` if `alice`/`bob` are not honest or
///   `adversary` is not an adversary
/// - `ValidationError::MissingPublicKey` if a party has no key pair
/// - `ValidationError::WeakPublicKey` if any public key is weak
pub fn intercept(
    alice: &Party,
    bob: &Party,
    adversary: &Party,
    params: &DomainParameters,
) -> Result<Interception, ExchangeError> {
    let alice_public = require_honest(alice)?;
    let bob_public = require_honest(bob)?;
    let adversary_public = require_adversary(adversary)?;

    let (alice_view, secret_with_a) =
        sub_exchange(alice, alice_public, adversary, adversary_public, params)?;
    let (bob_view, secret_with_b) = sub_exchange(bob, bob_public, adversary, adversary_public, params)?;

    tracing::debug!(
        adversary = %adversary.id(),
        secret_with_a,
        secret_with_b,
        "interception established"
    );

    Ok(Interception {
        parameters: *params,
        alice: alice_view,
        bob: bob_view,
        adversary: AdversarySession { adversary: adversary.clone(), secret_with_a, secret_with_b },
    })
}

/// Honest party that caught a substituted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Party that refused the key
    pub party: PartyId,
    /// Key that was offered in the peer's name
    pub offered_public_key: u64,
    /// Why the signature was refused
    pub failure: VerificationFailure,
}

/// Outcome of an interception against signed public keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterceptionOutcome {
    /// At least one honest party refused the substituted key
    Detected(Vec<Detection>),
    /// Both substituted keys were accepted
    Succeeded(Interception),
}

impl InterceptionOutcome {
    /// Returns true if the adversary was caught.
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// The adversary's substitute offer: its own key, signed with its own
/// signing key but claiming to come from `claimed_signer`.
fn forge_offer(public_key: u64, forger: &SigningKey, claimed_signer: &VerifyingKey) -> SignedPublicKey {
    let mut offer = sign_public_key(public_key, forger);
    offer.signature.signer_modulus = claimed_signer.modulus();
    offer.signature.signer_exponent = Some(claimed_signer.public_exponent());
    debug_assert_eq!(offer.signature.message, public_key_message(public_key));
    offer
}

/// Run the interception when both honest parties authenticate public keys
/// with `authority`.
///
/// The adversary signs its substitute key with `adversary_key` and labels
/// the signature as the authority's. Unless `adversary_key` is the authority
/// key, both honest parties reject the substitute.
///
/// # Errors
///
/// Same as [`intercept`].
pub fn intercept_authenticated(
    alice: &Party,
    bob: &Party,
    adversary: &Party,
    params: &DomainParameters,
    authority: &VerifyingKey,
    adversary_key: &SigningKey,
) -> Result<InterceptionOutcome, ExchangeError> {
    require_honest(alice)?;
    require_honest(bob)?;
    let adversary_public = require_adversary(adversary)?;

    let offer = forge_offer(adversary_public, adversary_key, authority);

    let mut detections = Vec::new();
    for receiver in [alice, bob] {
        match accept_public_key(&offer, authority, params)? {
            KeyAcceptance::Accepted(_) => {},
            KeyAcceptance::Rejected(failure) => {
                tracing::info!(party = %receiver.id(), %failure, "substituted key detected");
                detections.push(Detection {
                    party: receiver.id().clone(),
                    offered_public_key: adversary_public,
                    failure,
                });
            },
        }
    }

    if detections.is_empty() {
        Ok(InterceptionOutcome::Succeeded(intercept(alice, bob, adversary, params)?))
    } else {
        Ok(InterceptionOutcome::Detected(detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parties() -> (Party, Party, Party, DomainParameters) {
        let params = DomainParameters::educational();
        let alice = Party::honest("alice").with_keys(&params, 6).unwrap();
        let bob = Party::honest("bob").with_keys(&params, 15).unwrap();
        let eve = Party::adversary("eve").with_keys(&params, 9).unwrap();
        (alice, bob, eve, params)
    }

    #[test]
    fn textbook_interception() {
        let (alice, bob, eve, params) = parties();
        assert_eq!(eve.public_key(), Some(11));

        let result = intercept(&alice, &bob, &eve, &params).unwrap();
        assert_eq!(result.secret_alice_adversary(), 9);
        assert_eq!(result.secret_bob_adversary(), 10);
        assert_eq!(result.alice.secret, 9);
        assert_eq!(result.bob.secret, 10);
        assert_eq!(result.alice.received_public_key, 11);
        assert!(result.end_to_end_broken());
    }

    #[test]
    fn roles_are_enforced() {
        let (alice, bob, eve, params) = parties();
        let err = intercept(&eve, &bob, &alice, &params).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Validation(ValidationError::RoleMismatch {
                party: PartyId::new("eve"),
                expected: "honest"
            })
        );

        let err = intercept(&alice, &bob, &bob, &params).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Validation(ValidationError::RoleMismatch { expected: "adversary", .. })
        ));
    }

    #[test]
    fn parties_without_keys_are_rejected() {
        let (alice, bob, _, params) = parties();
        let eve = Party::adversary("eve");
        assert!(matches!(
            intercept(&alice, &bob, &eve, &params),
            Err(ExchangeError::Validation(ValidationError::MissingPublicKey { .. }))
        ));
    }

    #[test]
    fn signatures_detect_substitution() {
        let (alice, bob, eve, params) = parties();
        let authority = SigningKey::authority();
        let forger = SigningKey::new(3599, 17, 1433).unwrap();

        let outcome =
            intercept_authenticated(&alice, &bob, &eve, &params, &authority.verifying_key(), &forger)
                .unwrap();

        let InterceptionOutcome::Detected(detections) = outcome else {
            panic!("expected detection, got {outcome:?}");
        };
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].party, PartyId::new("alice"));
        assert_eq!(detections[0].offered_public_key, 11);
        assert!(matches!(detections[0].failure, VerificationFailure::BadSignature { .. }));
    }

    #[test]
    fn stolen_signing_key_defeats_authentication() {
        let (alice, bob, eve, params) = parties();
        let authority = SigningKey::authority();

        let outcome =
            intercept_authenticated(&alice, &bob, &eve, &params, &authority.verifying_key(), &authority)
                .unwrap();

        let InterceptionOutcome::Succeeded(interception) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(interception.secret_alice_adversary(), 9);
    }
}
