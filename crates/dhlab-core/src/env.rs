//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources. The protocol core never
//! reads a clock: time is the discrete tick counter owned by the lifecycle
//! manager. Randomness and sleeping are the only things borrowed from the
//! host, so a seeded environment makes every scenario reproducible.

use std::time::Duration;

/// Abstract environment providing randomness and async sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a simulated environment yields the same byte stream
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by host schedulers (not protocol logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random value in `[low, high]` (inclusive).
    ///
    /// Uses rejection sampling so the result is unbiased. `low > high` is a
    /// caller bug and returns `low`.
    fn random_in_range(&self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }

        let span = high - low;
        if span == u64::MAX {
            return self.random_u64();
        }

        let width = span + 1;
        let zone = u64::MAX - (u64::MAX % width);
        loop {
            let candidate = self.random_u64();
            if candidate < zone {
                return low + candidate % width;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct CountingEnv {
        counter: Arc<AtomicU64>,
    }

    impl Environment for CountingEnv {
        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let value = self.counter.fetch_add(1, Ordering::Relaxed);
            let bytes = value.to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = bytes[i % bytes.len()];
            }
        }
    }

    #[test]
    fn random_in_range_stays_in_bounds() {
        let env = CountingEnv::default();
        for _ in 0..200 {
            let value = env.random_in_range(1, 21);
            assert!((1..=21).contains(&value));
        }
    }

    #[test]
    fn degenerate_range_returns_low() {
        let env = CountingEnv::default();
        assert_eq!(env.random_in_range(7, 7), 7);
        assert_eq!(env.random_in_range(9, 3), 9);
    }
}
