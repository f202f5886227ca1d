//! Parameter strength audit.
//!
//! Scores a group by prime size, key length and safe-prime structure using
//! NIST SP 800-57 style size bands. Everything the pedagogical core can
//! represent is far below the first band, so [`audit`] of real
//! [`DomainParameters`] always reports [`StrengthLevel::Weak`];
//! [`audit_sizes`] scores claimed sizes of groups the core cannot hold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::{DomainParameters, is_safe_prime};

/// Smallest prime / key size without a warning.
pub const RECOMMENDED_BITS: u32 = 2048;

/// Size below which a prime or key is considered broken.
pub const MINIMUM_BITS: u32 = 1024;

/// Score at or above which parameters are strong.
pub const STRONG_SCORE: u32 = 80;

/// Score at or above which parameters are medium.
pub const MEDIUM_SCORE: u32 = 50;

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLevel {
    /// Score below [`MEDIUM_SCORE`]
    Weak,
    /// Score below [`STRONG_SCORE`]
    Medium,
    /// Score at or above [`STRONG_SCORE`]
    Strong,
}

impl fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        })
    }
}

/// Result of an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthReport {
    /// Score in `[0, 100]`
    pub score: u32,
    /// Verdict derived from the score
    pub level: StrengthLevel,
    /// Effective security estimate, `min(prime_bits, key_bits)`
    pub entropy_bits: u32,
    /// Problems found
    pub warnings: Vec<String>,
    /// Suggested fixes and positive findings
    pub recommendations: Vec<String>,
}

/// Audit concrete parameters for private keys of `key_bits` bits.
pub fn audit(params: &DomainParameters, key_bits: u32) -> StrengthReport {
    let prime_bits = u64::BITS - params.prime().leading_zeros();
    audit_sizes(prime_bits, key_bits, is_safe_prime(params.prime()), params.generator())
}

/// Audit a group described by its sizes.
pub fn audit_sizes(prime_bits: u32, key_bits: u32, safe_prime: bool, generator: u64) -> StrengthReport {
    let mut score = 0;
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    score += if prime_bits < MINIMUM_BITS {
        warnings.push("Prime is too small for secure use".to_owned());
        10
    } else if prime_bits < RECOMMENDED_BITS {
        warnings.push("Prime size below current recommendations".to_owned());
        30
    } else {
        60
    };

    score += if key_bits < MINIMUM_BITS {
        warnings.push("Key length is insufficient for modern security".to_owned());
        5
    } else if key_bits < RECOMMENDED_BITS {
        warnings.push("Key length below NIST recommendations".to_owned());
        15
    } else {
        25
    };

    if safe_prime {
        score += 15;
        recommendations.push("Prime is a safe prime (p = 2q + 1)".to_owned());
    }

    if prime_bits < RECOMMENDED_BITS {
        recommendations.push(format!("Use a prime of at least {RECOMMENDED_BITS} bits"));
    }
    if key_bits < RECOMMENDED_BITS {
        recommendations.push(format!("Use key length of at least {RECOMMENDED_BITS} bits"));
    }
    if generator < 2 {
        recommendations.push("Generator should be at least 2".to_owned());
        warnings.push("Generator value is too small".to_owned());
    }

    let level = if score >= STRONG_SCORE {
        StrengthLevel::Strong
    } else if score >= MEDIUM_SCORE {
        StrengthLevel::Medium
    } else {
        StrengthLevel::Weak
    };

    debug_assert!(score <= 100);

    StrengthReport { score, level, entropy_bits: prime_bits.min(key_bits), warnings, recommendations }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn educational_group_is_weak() {
        let report = audit(&DomainParameters::educational(), 5);
        assert_eq!(report.level, StrengthLevel::Weak);
        assert_eq!(report.score, 10 + 5 + 15);
        assert_eq!(report.entropy_bits, 5);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn modern_group_is_strong() {
        let report = audit_sizes(2048, 2048, true, 2);
        assert_eq!(report.score, 100);
        assert_eq!(report.level, StrengthLevel::Strong);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn legacy_group_is_medium() {
        let report = audit_sizes(2048, 1024, false, 2);
        assert_eq!(report.score, 75);
        assert_eq!(report.level, StrengthLevel::Medium);
        assert_eq!(report.entropy_bits, 1024);
    }

    #[test]
    fn report_for_textbook_parameters() {
        let report = audit(&DomainParameters::educational(), 5);
        insta::assert_snapshot!(report.recommendations.join("\n"), @r"
        Prime is a safe prime (p = 2q + 1)
        Use a prime of at least 2048 bits
        Use key length of at least 2048 bits
        ");
    }
}
