//! Wall-clock comparison of the pedagogical exchange and the real provider.
//!
//! Each benchmark runs a fixed number of operations back to back and reports
//! the elapsed time. Randomness comes from the environment, so a seeded run
//! performs the same work every time; only the timings differ.

use std::time::{Duration, Instant};

use dhlab_core::{DomainParameters, Environment, ExchangeSession, random_private_key};
use dhlab_crypto::{
    AEAD_KEY_LEN, CryptoError, DEFAULT_DERIVED_BITS, DalekProvider, Group, SymmetricCipher,
    XChaChaCipher, XNONCE_LEN, provider_exchange,
};
use serde::Serialize;

/// Largest prime below 2^31 (a Mersenne prime), with primitive root 7.
pub const MERSENNE_GROUP: (u64, u64) = (2_147_483_647, 7);

/// Largest prime below 2^32.
pub const WIDE_GROUP: (u64, u64) = (4_294_967_291, 2);

/// Plaintext size for the cipher benchmark.
pub const CIPHER_MESSAGE_LEN: usize = 1024;

/// Where a benchmark's arithmetic comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchCategory {
    /// Pedagogical core (`u64` square-and-multiply)
    Educational,
    /// Real provider
    Real,
}

/// Operation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Full exchanges per educational group
    pub exchange_ops: u32,
    /// Provider exchanges (two key pairs, two derivations each)
    pub provider_ops: u32,
    /// Seal-then-open round trips
    pub cipher_ops: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self { exchange_ops: 100, provider_ops: 10, cipher_ops: 100 }
    }
}

/// Timing of one benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchResult {
    /// What was measured
    pub algorithm: String,
    /// Pedagogical or real
    pub category: BenchCategory,
    /// Modulus or key size
    pub key_bits: u32,
    /// Operations performed
    pub operations: u32,
    /// Total wall-clock time
    pub elapsed_ms: f64,
    /// Throughput, rounded
    pub ops_per_second: u64,
}

impl BenchResult {
    fn new(
        algorithm: String,
        category: BenchCategory,
        key_bits: u32,
        operations: u32,
        elapsed: Duration,
    ) -> Self {
        let seconds = elapsed.max(Duration::from_nanos(1)).as_secs_f64();
        let ops_per_second = (f64::from(operations) / seconds).round() as u64;

        tracing::debug!(%algorithm, operations, ?elapsed, ops_per_second, "benchmark finished");

        Self {
            algorithm,
            category,
            key_bits,
            operations,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            ops_per_second,
        }
    }
}

/// Run every benchmark in order: both educational groups, the provider
/// exchange and the cipher.
///
/// # Errors
///
/// Any failure of the measured operations. Nothing here is expected to fail
/// for the fixed groups.
pub async fn run_benchmarks<E: Environment>(
    env: &E,
    config: &BenchConfig,
) -> Result<Vec<BenchResult>, CryptoError> {
    let mut results = Vec::with_capacity(4);
    for (prime, generator) in [MERSENNE_GROUP, WIDE_GROUP] {
        let params = DomainParameters::new(prime, generator)?;
        results.push(educational_exchange(env, &params, config.exchange_ops)?);
    }
    results.push(provider_exchanges(env, config.provider_ops).await?);
    results.push(cipher_round_trips(env, config.cipher_ops).await?);
    Ok(results)
}

fn educational_exchange<E: Environment>(
    env: &E,
    params: &DomainParameters,
    operations: u32,
) -> Result<BenchResult, CryptoError> {
    let key_bits = u64::BITS - params.prime().leading_zeros();

    let started = Instant::now();
    for _ in 0..operations {
        let alice = random_private_key(env, params)?;
        let bob = random_private_key(env, params)?;
        ExchangeSession::run(*params, alice, bob)?;
    }

    Ok(BenchResult::new(
        format!("educational DH p = {}", params.prime()),
        BenchCategory::Educational,
        key_bits,
        operations,
        started.elapsed(),
    ))
}

async fn provider_exchanges<E: Environment>(
    env: &E,
    operations: u32,
) -> Result<BenchResult, CryptoError> {
    let provider = DalekProvider::new(env.clone());

    let started = Instant::now();
    for _ in 0..operations {
        provider_exchange(&provider, Group::X25519, DEFAULT_DERIVED_BITS).await?;
    }

    Ok(BenchResult::new(
        "x25519 + hkdf-sha256".to_owned(),
        BenchCategory::Real,
        256,
        operations,
        started.elapsed(),
    ))
}

async fn cipher_round_trips<E: Environment>(
    env: &E,
    operations: u32,
) -> Result<BenchResult, CryptoError> {
    let cipher = XChaChaCipher;
    let mut key = [0u8; AEAD_KEY_LEN];
    let mut iv = [0u8; XNONCE_LEN];
    let mut message = vec![0u8; CIPHER_MESSAGE_LEN];
    env.random_bytes(&mut key);
    env.random_bytes(&mut message);

    let started = Instant::now();
    for _ in 0..operations {
        env.random_bytes(&mut iv);
        let sealed = cipher.encrypt(&key, &iv, &message).await?;
        let opened = cipher.decrypt(&key, &iv, &sealed).await?;
        debug_assert_eq!(opened, message);
    }

    Ok(BenchResult::new(
        cipher.label().to_owned(),
        BenchCategory::Real,
        (AEAD_KEY_LEN * 8) as u32,
        operations,
        started.elapsed(),
    ))
}
