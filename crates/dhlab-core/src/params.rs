//! Domain parameters: the prime modulus and generator of the group.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ExchangeError, ValidationError},
    modexp::{MAX_MODULUS, Modulus},
};

/// Textbook prime used throughout the lessons.
pub const EDUCATIONAL_PRIME: u64 = 23;

/// Textbook generator (a primitive root mod 23).
pub const EDUCATIONAL_GENERATOR: u64 = 5;

/// Smallest prime with a non-empty generator range `[2, prime-2]`.
pub const MIN_PRIME: u64 = 5;

/// How strictly to check offered parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterPolicy {
    /// Reject composite moduli.
    #[default]
    Strict,
    /// Accept any modulus in range, trusting the caller's claim of primality.
    Permissive,
}

/// Prime modulus and generator.
///
/// Deserialized values are validated under [`ParameterPolicy::Permissive`]:
/// a serialized group may have been built permissively, but its ranges must
/// still hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct DomainParameters {
    prime: Modulus,
    generator: u64,
}

/// Unvalidated wire form of [`DomainParameters`].
#[derive(Deserialize)]
struct RawParameters {
    prime: u64,
    generator: u64,
}

impl TryFrom<RawParameters> for DomainParameters {
    type Error = ExchangeError;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        Self::with_policy(raw.prime, raw.generator, ParameterPolicy::Permissive)
    }
}

impl DomainParameters {
    /// Validate parameters under [`ParameterPolicy::Strict`].
    pub fn new(prime: u64, generator: u64) -> Result<Self, ExchangeError> {
        Self::with_policy(prime, generator, ParameterPolicy::Strict)
    }

    /// Validate parameters under the given policy.
    ///
    /// # Errors
    ///
    /// - `OverflowError` if `prime > MAX_MODULUS` (checked first, before any
    ///   arithmetic)
    /// - `ValidationError::PrimeTooSmall` if `prime < MIN_PRIME`
    /// - `ValidationError::NotPrime` if strict and `prime` is composite
    /// - `ValidationError::GeneratorOutOfRange` unless `2 <= generator <=
    ///   prime-2`
    pub fn with_policy(
        prime: u64,
        generator: u64,
        policy: ParameterPolicy,
    ) -> Result<Self, ExchangeError> {
        let modulus = Modulus::new(prime)?;

        if prime < MIN_PRIME {
            return Err(ValidationError::PrimeTooSmall { prime, minimum: MIN_PRIME }.into());
        }

        if policy == ParameterPolicy::Strict && !is_prime(prime) {
            return Err(ValidationError::NotPrime { prime }.into());
        }

        if !(2..=prime - 2).contains(&generator) {
            return Err(ValidationError::GeneratorOutOfRange { generator, prime }.into());
        }

        Ok(Self { prime: modulus, generator })
    }

    /// The `p = 23, g = 5` group used in the lessons.
    pub fn educational() -> Self {
        Self { prime: Modulus(EDUCATIONAL_PRIME), generator: EDUCATIONAL_GENERATOR }
    }

    /// Prime modulus.
    pub fn prime(&self) -> u64 {
        self.prime.get()
    }

    /// Prime as a validated modulus.
    pub fn modulus(&self) -> Modulus {
        self.prime
    }

    /// Generator.
    pub fn generator(&self) -> u64 {
        self.generator
    }

    /// Largest private key accepted by key generation.
    pub fn max_private_key(&self) -> u64 {
        self.prime() - 1
    }
}

impl Default for DomainParameters {
    fn default() -> Self {
        Self::educational()
    }
}

/// Deterministic primality test by trial division.
///
/// Exact for the whole exact-integer domain: `sqrt(MAX_MODULUS)` is `65536`,
/// so at most ~33k odd divisors are tried.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut d = 5;
    while d * d <= n {
        if n % d == 0 || n % (d + 2) == 0 {
            return false;
        }
        d += 6;
    }
    true
}

/// Whether `p = 2q + 1` with `q` prime.
pub fn is_safe_prime(p: u64) -> bool {
    p > 4 && p <= MAX_MODULUS && is_prime(p) && is_prime((p - 1) / 2)
}
