//! Binary (square-and-multiply) modular exponentiation.
//!
//! Everything else in the core is built on [`pow`]. Arithmetic is plain `u64`
//! and every intermediate product is `< modulus^2`, so the modulus is capped
//! at [`MAX_MODULUS`]. The cap is enforced when a [`Modulus`] is constructed:
//! out-of-range parameters are rejected at input validation and an overflow
//! can never surface mid-exponentiation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, OverflowError, ValidationError};

/// Largest modulus whose squared residues fit exactly in `u64`.
pub const MAX_MODULUS: u64 = 1 << 32;

/// A validated modulus in `[1, MAX_MODULUS]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Modulus(pub(crate) u64);

impl Modulus {
    /// Validate a modulus.
    ///
    /// # Errors
    ///
    /// - `ValidationError::ZeroModulus` for `0`
    /// - `OverflowError` above [`MAX_MODULUS`]
    pub fn new(value: u64) -> Result<Self, ExchangeError> {
        if value == 0 {
            return Err(ValidationError::ZeroModulus.into());
        }
        if value > MAX_MODULUS {
            return Err(OverflowError { value, max: MAX_MODULUS }.into());
        }
        Ok(Self(value))
    }

    /// Raw modulus value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// `a * b mod self` for residues `a, b < self`.
    pub fn mul(self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.0 && b < self.0);
        a * b % self.0
    }
}

impl TryFrom<u64> for Modulus {
    type Error = ExchangeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Modulus> for u64 {
    fn from(modulus: Modulus) -> Self {
        modulus.0
    }
}

impl fmt::Display for Modulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `base^exponent mod modulus` by square-and-multiply.
///
/// Reduces `base` first, then walks the exponent bits from least to most
/// significant: multiply the running base into the result when the bit is
/// set, then square the running base.
///
/// `exponent = 0` yields `1`, except under modulus `1` where every residue is
/// `0`.
pub fn pow(base: u64, exponent: u64, modulus: Modulus) -> u64 {
    let m = modulus.get();
    if m == 1 {
        return 0;
    }

    let mut result = 1;
    let mut base = base % m;
    let mut exponent = exponent;

    while exponent > 0 {
        if exponent & 1 == 1 {
            result = modulus.mul(result, base);
        }
        exponent >>= 1;
        base = modulus.mul(base, base);
    }

    result
}

/// [`pow`] with an unvalidated modulus.
///
/// # Errors
///
/// Same as [`Modulus::new`]. Validation happens before any arithmetic.
pub fn checked_pow(base: u64, exponent: u64, modulus: u64) -> Result<u64, ExchangeError> {
    Ok(pow(base, exponent, Modulus::new(modulus)?))
}

/// One step of a recorded exponentiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ExpStep {
    /// Result starts at one, base is reduced.
    Initialize {
        /// Base as given
        base: u64,
        /// `base mod modulus`
        reduced: u64,
    },
    /// Bit is set: multiply the running base into the result.
    Multiply {
        /// Bit position
        bit: u32,
        /// Result before the multiplication
        previous: u64,
        /// Running base used
        base: u64,
        /// Result after the multiplication
        result: u64,
    },
    /// Bit is clear: result unchanged.
    Skip {
        /// Bit position
        bit: u32,
        /// Unchanged result
        result: u64,
    },
    /// Square the running base for the next bit.
    Square {
        /// Base before squaring
        previous: u64,
        /// Base after squaring
        base: u64,
    },
}

/// Step-by-step record of `base^exponent mod modulus` for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpTrace {
    /// Base as given
    pub base: u64,
    /// Exponent
    pub exponent: u64,
    /// Modulus
    pub modulus: Modulus,
    /// Steps in execution order
    pub steps: Vec<ExpStep>,
    /// Final result, equal to [`pow`]
    pub result: u64,
}

/// Run square-and-multiply and record every step.
///
/// The walk visits every bit of the binary representation, including the
/// single `0` bit of a zero exponent. The base is not squared after the most
/// significant bit because no later bit consumes it.
pub fn pow_trace(base: u64, exponent: u64, modulus: Modulus) -> ExpTrace {
    let m = modulus.get();
    let reduced = base % m;
    let bit_len = (u64::BITS - exponent.leading_zeros()).max(1);

    let mut steps = Vec::with_capacity(bit_len as usize * 2 + 1);
    steps.push(ExpStep::Initialize { base, reduced });

    let mut result = 1 % m;
    let mut running = reduced;

    for bit in 0..bit_len {
        if (exponent >> bit) & 1 == 1 {
            let previous = result;
            result = modulus.mul(result, running);
            steps.push(ExpStep::Multiply { bit, previous, base: running, result });
        } else {
            steps.push(ExpStep::Skip { bit, result });
        }

        if bit + 1 < bit_len {
            let previous = running;
            running = modulus.mul(running, running);
            steps.push(ExpStep::Square { previous, base: running });
        }
    }

    debug_assert_eq!(result, pow(base, exponent, modulus));

    ExpTrace { base, exponent, modulus, steps, result }
}

impl ExpTrace {
    /// Number of multiplications performed.
    pub fn multiplications(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s, ExpStep::Multiply { .. })).count()
    }

    /// Number of squarings performed.
    pub fn squarings(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s, ExpStep::Square { .. })).count()
    }
}

impl fmt::Display for ExpTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modulus;
        writeln!(f, "binary: {} = {:#b}", self.exponent, self.exponent)?;
        for step in &self.steps {
            match *step {
                ExpStep::Initialize { base, reduced } => {
                    writeln!(f, "initialize: result = 1, base = {base} mod {m} = {reduced}")?;
                },
                ExpStep::Multiply { bit, previous, base, result } => {
                    writeln!(f, "bit {bit} = 1: result = {previous} * {base} mod {m} = {result}")?;
                },
                ExpStep::Skip { bit, .. } => {
                    writeln!(f, "bit {bit} = 0: skip multiplication")?;
                },
                ExpStep::Square { previous, base } => {
                    writeln!(f, "square: base = {previous}^2 mod {m} = {base}")?;
                },
            }
        }
        write!(f, "result: {}^{} mod {m} = {}", self.base, self.exponent, self.result)
    }
}
