//! Seeded simulation environment.
//!
//! `SimEnv` is the deterministic implementation of the Environment trait. The
//! same seed always yields the same private keys, so a failing scenario can
//! be replayed exactly by re-running with its seed.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use dhlab_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default seed used by [`SimEnv::new`].
pub const DEFAULT_SEED: u64 = 0x0D1F_F1E0_4E11_3A4E;

/// Deterministic environment backed by a seeded ChaCha8 stream.
///
/// Clones share the stream, so interleaved draws from several components
/// stay reproducible as long as the call order is.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    seed: u64,
}

impl SimEnv {
    /// Environment seeded with [`DEFAULT_SEED`].
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))), seed }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    /// Completes immediately: simulated time is the lifecycle tick counter.
    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);
        for _ in 0..16 {
            assert_eq!(a.random_u64(), b.random_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = SimEnv::with_seed(1);
        let b = SimEnv::with_seed(2);
        let first: Vec<_> = (0..4).map(|_| a.random_u64()).collect();
        let second: Vec<_> = (0..4).map(|_| b.random_u64()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn clones_share_the_stream() {
        let env = SimEnv::with_seed(3);
        let clone = env.clone();
        let reference = SimEnv::with_seed(3);

        let interleaved = [env.random_u64(), clone.random_u64()];
        let sequential = [reference.random_u64(), reference.random_u64()];
        assert_eq!(interleaved, sequential);
    }

    #[tokio::test]
    async fn sleep_completes_immediately() {
        SimEnv::new().sleep(Duration::from_secs(3600)).await;
    }
}
