//! Key generations.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Monotonic generation number, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(u64);

impl GenerationId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Following id.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation status.
///
/// ```text
/// Active ──> Rotating ──> Expired
///   │  <──────┘ abort
///   └──> Compromised      (Rotating ──> Compromised also allowed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// In use
    Active,
    /// Rotation started, still in use until the settle delay elapses
    Rotating,
    /// Retired by rotation; terminal
    Expired,
    /// Retired by a compromise signal; terminal
    Compromised,
}

impl GenerationStatus {
    /// Whether this generation is the session's current one.
    pub fn is_current(self) -> bool {
        matches!(self, Self::Active | Self::Rotating)
    }

    /// Whether the status can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Compromised)
    }
}

/// Public record of one generation.
///
/// Holds no secrets. Private key material lives in the manager and is
/// destroyed when the generation reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyGeneration {
    /// Generation id
    pub id: GenerationId,
    /// Tick the generation's lifetime is measured from
    pub created_at: u64,
    /// Status
    pub status: GenerationStatus,
    /// Encryptions performed under this generation
    pub usage_count: u64,
    /// Decaying security score
    pub security_score: f64,
    /// DH public key
    pub public_key: u64,
    /// Tick the current rotation started, while `Rotating`
    pub rotation_started_at: Option<u64>,
    /// Tick the generation reached a terminal status
    pub retired_at: Option<u64>,
}

/// Private key of a live generation. Zeroized on drop.
pub(crate) struct SecretKey(u64);

impl SecretKey {
    pub(crate) fn new(private_key: u64) -> Self {
        Self(private_key)
    }

    pub(crate) fn expose(&self) -> u64 {
        self.0
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_ordered() {
        let first = GenerationId::new(1);
        assert!(first.next() > first);
        assert_eq!(first.next().get(), 2);
        assert_eq!(first.to_string(), "#1");
    }

    #[test]
    fn status_classes() {
        assert!(GenerationStatus::Active.is_current());
        assert!(GenerationStatus::Rotating.is_current());
        assert!(GenerationStatus::Expired.is_terminal());
        assert!(GenerationStatus::Compromised.is_terminal());
        assert!(!GenerationStatus::Rotating.is_terminal());
    }

    #[test]
    fn secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", SecretKey::new(42)), "SecretKey(..)");
    }
}
