//! Production Environment implementation using OS randomness.
//!
//! `SystemEnv` is the production implementation of the Environment trait:
//! getrandom for private keys and tokio for sleeping. Runs are not
//! reproducible; pass `--seed` to get the seeded simulation environment
//! instead.

use std::time::Duration;

use dhlab_core::Environment;

/// Production environment using cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Drawing private keys without working entropy
/// would make every exchange predictable.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
