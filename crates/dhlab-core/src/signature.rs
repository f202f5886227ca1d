//! Simplified RSA-style signatures over small moduli.
//!
//! Signing raises a message representative to the private exponent,
//! verification raises the signature to the public exponent and compares. The
//! representative is the first eight bytes of the message's SHA-256 digest,
//! reduced mod `n`, so every byte of the message influences it.
//!
//! A failed check is an ordinary outcome: [`check`] returns a
//! [`Verification`] and [`verify`] a `bool`. Neither ever errors.
//!
//! # Security
//!
//! None. Moduli are at most `2^32`, there is no padding and the exponents
//! are textbook-sized. The layer exists to show how binding a public key to a
//! signature defeats an adversary in the middle.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{
    error::{ExchangeError, ValidationError},
    exchange::validate_public_key,
    modexp::{Modulus, pow},
    params::DomainParameters,
};

/// Prefix of the canonical message signed for a DH public key.
pub const PUBLIC_KEY_MESSAGE_PREFIX: &str = "DH_PUBLIC_KEY:";

/// Modulus of the textbook authority key (`61 * 53`).
pub const AUTHORITY_MODULUS: u64 = 3233;

/// Public exponent of the textbook authority key.
pub const AUTHORITY_PUBLIC_EXPONENT: u64 = 17;

/// Private exponent of the textbook authority key.
pub const AUTHORITY_PRIVATE_EXPONENT: u64 = 2753;

/// Residues used to sanity-check a key pair on construction.
const WITNESS_VALUES: [u64; 5] = [2, 3, 5, 7, 11];

/// A signed message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Message that was signed
    pub message: String,
    /// `representative(message)^d mod n`
    pub value: u64,
    /// Modulus of the signing key
    pub signer_modulus: u64,
    /// Public exponent of the signing key, when the signer published it
    pub signer_exponent: Option<u64>,
}

/// Why a signature was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationFailure {
    /// Verification key is not a usable modulus
    InvalidKey {
        /// Offered modulus
        modulus: u64,
    },
    /// Signature claims a different signer
    KeyMismatch {
        /// Modulus of the verification key
        expected: u64,
        /// Modulus recorded in the signature
        actual: u64,
    },
    /// Signature value is not a residue of the verification modulus
    SignatureOutOfRange {
        /// Signature value
        value: u64,
        /// Verification modulus
        modulus: u64,
    },
    /// Signature covers a different message
    MessageMismatch,
    /// `value^e mod n` does not reproduce the message representative
    BadSignature {
        /// Representative of the checked message
        expected: u64,
        /// Representative recovered from the signature
        recovered: u64,
    },
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey { modulus } => write!(f, "verification key modulus {modulus} is unusable"),
            Self::KeyMismatch { expected, actual } => {
                write!(f, "signed under modulus {actual}, expected {expected}")
            },
            Self::SignatureOutOfRange { value, modulus } => {
                write!(f, "signature {value} is not a residue mod {modulus}")
            },
            Self::MessageMismatch => f.write_str("signature covers a different message"),
            Self::BadSignature { expected, recovered } => {
                write!(f, "recovered representative {recovered}, expected {expected}")
            },
        }
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verification {
    /// Signature is valid for the message and key
    Valid,
    /// Signature rejected
    Invalid(VerificationFailure),
}

impl Verification {
    /// Returns true for [`Verification::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<VerificationFailure> {
        match self {
            Self::Valid => None,
            Self::Invalid(failure) => Some(*failure),
        }
    }
}

/// Map a message to a residue mod `modulus`.
pub fn message_representative(message: &str, modulus: Modulus) -> u64 {
    let digest = Sha256::digest(message.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % modulus.get()
}

/// Sign `message` with the private exponent `d` under `modulus`.
///
/// The returned signature does not carry a public exponent; use
/// [`SigningKey::sign`] to publish one.
///
/// # Errors
///
/// - `ValidationError::ZeroModulus` or `OverflowError` for an unusable
///   modulus
pub fn sign(message: &str, private_exponent: u64, modulus: u64) -> Result<Signature, ExchangeError> {
    let n = Modulus::new(modulus)?;
    let value = pow(message_representative(message, n), private_exponent, n);
    Ok(Signature { message: message.to_owned(), value, signer_modulus: modulus, signer_exponent: None })
}

/// Whether `signature` is valid for `message` under `(e, n)`.
pub fn verify(message: &str, signature: &Signature, public_exponent: u64, modulus: u64) -> bool {
    check(message, signature, public_exponent, modulus).is_valid()
}

/// Check `signature` against `message` under `(e, n)` and report why it
/// failed.
///
/// Checks run cheapest first: key, range, message, then the exponentiation.
pub fn check(message: &str, signature: &Signature, public_exponent: u64, modulus: u64) -> Verification {
    let Ok(n) = Modulus::new(modulus) else {
        return Verification::Invalid(VerificationFailure::InvalidKey { modulus });
    };

    if signature.signer_modulus != modulus {
        return Verification::Invalid(VerificationFailure::KeyMismatch {
            expected: modulus,
            actual: signature.signer_modulus,
        });
    }

    if signature.value >= modulus {
        return Verification::Invalid(VerificationFailure::SignatureOutOfRange {
            value: signature.value,
            modulus,
        });
    }

    if signature.message != message {
        return Verification::Invalid(VerificationFailure::MessageMismatch);
    }

    let expected = message_representative(message, n);
    let recovered = pow(signature.value, public_exponent, n);
    if recovered != expected {
        return Verification::Invalid(VerificationFailure::BadSignature { expected, recovered });
    }

    Verification::Valid
}

/// Public half of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyingKey {
    modulus: Modulus,
    public_exponent: u64,
}

impl VerifyingKey {
    /// Modulus `n`.
    pub fn modulus(&self) -> u64 {
        self.modulus.get()
    }

    /// Public exponent `e`.
    pub fn public_exponent(&self) -> u64 {
        self.public_exponent
    }

    /// Check a signature under this key.
    pub fn check(&self, message: &str, signature: &Signature) -> Verification {
        check(message, signature, self.public_exponent, self.modulus.get())
    }
}

/// RSA-style key pair `(n, e, d)`.
///
/// The private exponent is zeroized on drop.
#[derive(Clone)]
pub struct SigningKey {
    modulus: Modulus,
    public_exponent: u64,
    private_exponent: u64,
}

impl SigningKey {
    /// Build a key pair and check that `d` inverts `e` on a few residues.
    ///
    /// # Errors
    ///
    /// - `OverflowError` / `ValidationError::ZeroModulus` for an unusable
    ///   modulus
    /// - `ValidationError::InvalidSigningKey` if the modulus is too small,
    ///   an exponent is not a residue, or `d` does not invert `e`
    pub fn new(modulus: u64, public_exponent: u64, private_exponent: u64) -> Result<Self, ExchangeError> {
        let n = Modulus::new(modulus)?;

        if modulus <= WITNESS_VALUES[WITNESS_VALUES.len() - 1] {
            return Err(invalid_key(format!("modulus {modulus} is too small")));
        }
        for (name, exponent) in [("public", public_exponent), ("private", private_exponent)] {
            if !(1..modulus).contains(&exponent) {
                return Err(invalid_key(format!("{name} exponent outside [1, {modulus})")));
            }
        }
        if let Some(x) =
            WITNESS_VALUES.into_iter().find(|&x| pow(pow(x, public_exponent, n), private_exponent, n) != x)
        {
            return Err(invalid_key(format!("exponents do not invert each other (witness {x})")));
        }

        Ok(Self { modulus: n, public_exponent, private_exponent })
    }

    /// The textbook authority key `n = 3233, e = 17, d = 2753`.
    pub fn authority() -> Self {
        Self {
            modulus: Modulus(AUTHORITY_MODULUS),
            public_exponent: AUTHORITY_PUBLIC_EXPONENT,
            private_exponent: AUTHORITY_PRIVATE_EXPONENT,
        }
    }

    /// Public half.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey { modulus: self.modulus, public_exponent: self.public_exponent }
    }

    /// Sign `message`, recording the public exponent in the signature.
    pub fn sign(&self, message: &str) -> Signature {
        let value = pow(message_representative(message, self.modulus), self.private_exponent, self.modulus);
        Signature {
            message: message.to_owned(),
            value,
            signer_modulus: self.modulus.get(),
            signer_exponent: Some(self.public_exponent),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("modulus", &self.modulus)
            .field("public_exponent", &self.public_exponent)
            .finish_non_exhaustive()
    }
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        self.private_exponent.zeroize();
    }
}

fn invalid_key(reason: String) -> ExchangeError {
    ValidationError::InvalidSigningKey { reason }.into()
}

/// Canonical message for a DH public key.
pub fn public_key_message(public_key: u64) -> String {
    format!("{PUBLIC_KEY_MESSAGE_PREFIX}{public_key}")
}

/// A DH public key with a signature binding it to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPublicKey {
    /// Offered DH public key
    pub public_key: u64,
    /// Signature over [`public_key_message`]
    pub signature: Signature,
}

/// Sign a DH public key.
pub fn sign_public_key(public_key: u64, signing_key: &SigningKey) -> SignedPublicKey {
    SignedPublicKey { public_key, signature: signing_key.sign(&public_key_message(public_key)) }
}

/// Result of offering a signed public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAcceptance {
    /// Signature valid and key not weak
    Accepted(u64),
    /// Signature rejected; the key was not looked at
    Rejected(VerificationFailure),
}

/// Verify a signed offer, then validate the key itself.
///
/// A bad signature is a [`KeyAcceptance::Rejected`] value.
///
/// # Errors
///
/// - `ValidationError` if the signature is valid but the key is out of range
///   or weak
pub fn accept_public_key(
    offer: &SignedPublicKey,
    verifying_key: &VerifyingKey,
    params: &DomainParameters,
) -> Result<KeyAcceptance, ExchangeError> {
    let message = public_key_message(offer.public_key);
    if let Verification::Invalid(failure) = verifying_key.check(&message, &offer.signature) {
        tracing::warn!(public_key = offer.public_key, %failure, "signed public key rejected");
        return Ok(KeyAcceptance::Rejected(failure));
    }

    validate_public_key(offer.public_key, params)?;
    Ok(KeyAcceptance::Accepted(offer.public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> SigningKey {
        SigningKey::authority()
    }

    #[test]
    fn authority_key_is_consistent() {
        let key = SigningKey::new(AUTHORITY_MODULUS, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_PRIVATE_EXPONENT)
            .unwrap();
        assert_eq!(key.verifying_key(), authority().verifying_key());
    }

    #[test]
    fn known_signatures() {
        let key = authority();
        let n = Modulus::new(AUTHORITY_MODULUS).unwrap();
        assert_eq!(message_representative("DH_PUBLIC_KEY:8", n), 2194);
        assert_eq!(key.sign("DH_PUBLIC_KEY:8").value, 193);
        assert_eq!(key.sign("DH_PUBLIC_KEY:19").value, 2315);
        assert_eq!(sign("", AUTHORITY_PRIVATE_EXPONENT, AUTHORITY_MODULUS).unwrap().value, 3195);
    }

    #[test]
    fn sign_then_verify() {
        let signature = sign("hello", AUTHORITY_PRIVATE_EXPONENT, AUTHORITY_MODULUS).unwrap();
        assert!(verify("hello", &signature, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_MODULUS));
        assert_eq!(signature.signer_exponent, None);
    }

    #[test]
    fn altered_message_fails() {
        let signature = authority().sign("DH_PUBLIC_KEY:8");
        assert_eq!(
            check("DH_PUBLIC_KEY:9", &signature, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_MODULUS),
            Verification::Invalid(VerificationFailure::MessageMismatch)
        );
    }

    #[test]
    fn altered_value_fails() {
        let mut signature = authority().sign("DH_PUBLIC_KEY:8");
        signature.value = 194;
        assert!(matches!(
            check("DH_PUBLIC_KEY:8", &signature, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_MODULUS),
            Verification::Invalid(VerificationFailure::BadSignature { expected: 2194, .. })
        ));

        signature.value = AUTHORITY_MODULUS;
        assert_eq!(
            check("DH_PUBLIC_KEY:8", &signature, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_MODULUS),
            Verification::Invalid(VerificationFailure::SignatureOutOfRange {
                value: AUTHORITY_MODULUS,
                modulus: AUTHORITY_MODULUS
            })
        );
    }

    #[test]
    fn forged_message_in_signature_fails() {
        let mut signature = authority().sign("DH_PUBLIC_KEY:8");
        signature.message = "DH_PUBLIC_KEY:11".to_owned();
        assert!(!verify("DH_PUBLIC_KEY:11", &signature, AUTHORITY_PUBLIC_EXPONENT, AUTHORITY_MODULUS));
    }

    #[test]
    fn wrong_key_fails() {
        let adversary = SigningKey::new(3599, 17, 1433).unwrap();
        let signature = adversary.sign("DH_PUBLIC_KEY:11");
        assert_eq!(
            authority().verifying_key().check("DH_PUBLIC_KEY:11", &signature),
            Verification::Invalid(VerificationFailure::KeyMismatch { expected: 3233, actual: 3599 })
        );
    }

    #[test]
    fn unusable_verification_modulus_is_a_failure_not_an_error() {
        let signature = authority().sign("m");
        assert_eq!(
            check("m", &signature, 17, 0),
            Verification::Invalid(VerificationFailure::InvalidKey { modulus: 0 })
        );
    }

    #[test]
    fn mismatched_exponents_rejected() {
        let err = SigningKey::new(3233, 17, 2752).unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(ValidationError::InvalidSigningKey { .. })));
        assert!(SigningKey::new(7, 1, 1).is_err());
        assert!(SigningKey::new(3233, 0, 2753).is_err());
    }

    #[test]
    fn debug_hides_private_exponent() {
        let rendered = format!("{:?}", authority());
        assert!(!rendered.contains("2753"));
    }

    #[test]
    fn signed_public_key_accepted() {
        let params = DomainParameters::educational();
        let offer = sign_public_key(8, &authority());
        assert_eq!(
            accept_public_key(&offer, &authority().verifying_key(), &params).unwrap(),
            KeyAcceptance::Accepted(8)
        );
    }

    #[test]
    fn substituted_public_key_rejected() {
        let params = DomainParameters::educational();
        let mut offer = sign_public_key(8, &authority());
        offer.public_key = 11;
        assert_eq!(
            accept_public_key(&offer, &authority().verifying_key(), &params).unwrap(),
            KeyAcceptance::Rejected(VerificationFailure::MessageMismatch)
        );
    }

    #[test]
    fn signed_weak_key_still_rejected() {
        let params = DomainParameters::educational();
        let offer = sign_public_key(22, &authority());
        let err = accept_public_key(&offer, &authority().verifying_key(), &params).unwrap_err();
        assert!(err.is_weak_key());
    }
}
