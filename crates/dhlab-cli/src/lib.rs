//! dhlab command-line front end.
//!
//! Host scheduler and textual renderer around the protocol core: parses
//! arguments, picks an environment, runs one scenario and renders the result
//! as text or JSON. All protocol decisions stay in `dhlab-core` and
//! `dhlab-crypto`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bench;
pub mod error;
pub mod render;
pub mod system_env;

use std::time::Duration;

use bench::{BenchConfig, run_benchmarks};
use clap::{Args, Parser, Subcommand};
use dhlab_core::{
    DomainParameters, Environment, ExchangeError, ExchangeSession, LifecycleConfig, LifecycleError,
    LifecycleManager, ParameterPolicy, Party, RotationPolicy, RotationTrigger, SigningKey, audit,
    audit_sizes, intercept, intercept_authenticated, pow_trace, random_private_key,
    signature::{AUTHORITY_MODULUS, AUTHORITY_PRIVATE_EXPONENT, AUTHORITY_PUBLIC_EXPONENT},
};
use dhlab_crypto::{DalekProvider, Mode, UnavailableProvider, hybrid_demo};
pub use error::CliError;
use serde::Serialize;
pub use system_env::SystemEnv;

/// Signing key the adversary uses when it does not hold the authority's.
pub const ADVERSARY_SIGNING_KEY: (u64, u64, u64) = (3599, 17, 1433);

/// Diffie-Hellman teaching lab
#[derive(Parser, Debug)]
#[command(name = "dhlab")]
#[command(about = "Diffie-Hellman key exchange teaching lab")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Seed for a reproducible run
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Scenario to run
    #[command(subcommand)]
    pub command: Command,
}

/// Domain parameters.
#[derive(Args, Debug, Clone)]
pub struct GroupArgs {
    /// Prime modulus (at most 2^32)
    #[arg(long, default_value_t = 23)]
    pub prime: u64,

    /// Generator
    #[arg(long, default_value_t = 5)]
    pub generator: u64,

    /// Accept a modulus without checking primality
    #[arg(long)]
    pub permissive: bool,
}

impl GroupArgs {
    /// Validate into domain parameters.
    pub fn params(&self) -> Result<DomainParameters, ExchangeError> {
        let policy =
            if self.permissive { ParameterPolicy::Permissive } else { ParameterPolicy::Strict };
        DomainParameters::with_policy(self.prime, self.generator, policy)
    }
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an honest two-party exchange
    Exchange {
        /// Group to exchange over
        #[command(flatten)]
        group: GroupArgs,
        /// Alice's private key (random if omitted)
        #[arg(long)]
        alice: Option<u64>,
        /// Bob's private key (random if omitted)
        #[arg(long)]
        bob: Option<u64>,
    },

    /// Put an adversary in the middle of the exchange
    Intercept {
        /// Group to exchange over
        #[command(flatten)]
        group: GroupArgs,
        /// Alice's private key (random if omitted)
        #[arg(long)]
        alice: Option<u64>,
        /// Bob's private key (random if omitted)
        #[arg(long)]
        bob: Option<u64>,
        /// Adversary's private key (random if omitted)
        #[arg(long)]
        eve: Option<u64>,
        /// Authenticate public keys with the authority's signatures
        #[arg(long)]
        signed: bool,
        /// Give the adversary the authority's signing key
        #[arg(long, requires = "signed")]
        stolen_key: bool,
    },

    /// Sign a message and verify the signature
    Sign {
        /// Message to sign
        message: String,
        /// Message to verify against (defaults to the signed one)
        #[arg(long)]
        verify_as: Option<String>,
        /// RSA modulus
        #[arg(long, default_value_t = AUTHORITY_MODULUS)]
        modulus: u64,
        /// Public exponent
        #[arg(long, default_value_t = AUTHORITY_PUBLIC_EXPONENT)]
        public_exponent: u64,
        /// Private exponent
        #[arg(long, default_value_t = AUTHORITY_PRIVATE_EXPONENT)]
        private_exponent: u64,
    },

    /// Step through square-and-multiply
    Trace {
        /// Base
        base: u64,
        /// Exponent
        exponent: u64,
        /// Modulus
        modulus: u64,
    },

    /// Audit parameter strength
    Audit {
        /// Group to audit
        #[command(flatten)]
        group: GroupArgs,
        /// Private key length in bits
        #[arg(long, default_value_t = 256)]
        key_bits: u32,
        /// Audit a hypothetical prime of this many bits instead of --prime
        #[arg(long)]
        prime_bits: Option<u32>,
        /// With --prime-bits: the hypothetical prime is a safe prime
        #[arg(long, requires = "prime_bits")]
        safe_prime: bool,
    },

    /// Simulate key rotation over a number of ticks
    Rotate {
        /// Ticks to run
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Enable the time policy with this interval
        #[arg(long)]
        time: Option<u64>,
        /// Enable the usage policy with this limit
        #[arg(long)]
        usage: Option<u64>,
        /// Enable the threat policy with this threshold
        #[arg(long)]
        threat: Option<u64>,
        /// Encryptions recorded after every tick
        #[arg(long, default_value_t = 0)]
        usage_per_tick: u32,
        /// Report a threat after this tick (repeatable)
        #[arg(long)]
        threat_at: Vec<u64>,
        /// Mark the current generation compromised after this tick
        /// (repeatable)
        #[arg(long)]
        compromise_at: Vec<u64>,
        /// Wall-clock delay between ticks
        #[arg(long, default_value_t = 0)]
        tick_ms: u64,
    },

    /// Agree on a key and encrypt a message with it
    Hybrid {
        /// Message to encrypt
        #[arg(default_value = "hello, diffie-hellman")]
        message: String,
        /// Use the real provider
        #[arg(long)]
        production: bool,
        /// Simulate a host without a provider
        #[arg(long)]
        no_provider: bool,
    },

    /// Time the pedagogical exchange against the real provider
    Bench {
        /// Full exchanges per educational group
        #[arg(long, default_value_t = 100)]
        exchange_ops: u32,
        /// X25519 exchanges through the provider
        #[arg(long, default_value_t = 10)]
        provider_ops: u32,
        /// XChaCha20-Poly1305 seal/open round trips
        #[arg(long, default_value_t = 100)]
        cipher_ops: u32,
    },
}

/// Rendered result of one command.
struct Output {
    text: String,
    json: serde_json::Value,
}

impl Output {
    fn new(text: String, value: &impl Serialize) -> Result<Self, CliError> {
        Ok(Self { text, json: serde_json::to_value(value)? })
    }
}

#[derive(Serialize)]
struct SignReport<'a> {
    signature: &'a dhlab_core::Signature,
    verified_message: &'a str,
    verification: dhlab_core::Verification,
}

#[derive(Serialize)]
struct RotateReport<'a> {
    events: &'a [dhlab_core::LifecycleEvent],
    snapshot: &'a dhlab_core::LifecycleSnapshot,
}

/// Run the parsed command in `env` and return what to print.
///
/// # Errors
///
/// Any error from the scenario, or a rendering failure.
pub async fn run<E: Environment>(cli: &Cli, env: E) -> Result<String, CliError> {
    let output = match &cli.command {
        Command::Exchange { group, alice, bob } => exchange(&env, group, *alice, *bob)?,
        Command::Intercept { group, alice, bob, eve, signed, stolen_key } => {
            interception(&env, group, [*alice, *bob, *eve], *signed, *stolen_key)?
        },
        Command::Sign { message, verify_as, modulus, public_exponent, private_exponent } => {
            let key = SigningKey::new(*modulus, *public_exponent, *private_exponent)?;
            let signature = key.sign(message);
            let verified_message = verify_as.as_deref().unwrap_or(message);
            let verification = key.verifying_key().check(verified_message, &signature);
            let text = render::signature(&signature, &verification)?;
            Output::new(text, &SignReport { signature: &signature, verified_message, verification })?
        },
        Command::Trace { base, exponent, modulus } => {
            let modulus = dhlab_core::Modulus::new(*modulus)?;
            let trace = pow_trace(*base, *exponent, modulus);
            Output::new(trace.to_string(), &trace)?
        },
        Command::Audit { group, key_bits, prime_bits, safe_prime } => {
            let report = match prime_bits {
                Some(bits) => audit_sizes(*bits, *key_bits, *safe_prime, group.generator),
                None => audit(&group.params()?, *key_bits),
            };
            Output::new(render::strength(&report)?, &report)?
        },
        Command::Rotate {
            ticks,
            time,
            usage,
            threat,
            usage_per_tick,
            threat_at,
            compromise_at,
            tick_ms,
        } => {
            let mut config = LifecycleConfig::default();
            for (trigger, threshold) in [
                (RotationTrigger::Time, time),
                (RotationTrigger::Usage, usage),
                (RotationTrigger::Threat, threat),
            ] {
                if let Some(threshold) = threshold {
                    config.policies.set(RotationPolicy::enabled(trigger, *threshold));
                }
            }
            let schedule = RotateSchedule {
                ticks: *ticks,
                usage_per_tick: *usage_per_tick,
                threat_at,
                compromise_at,
                tick: Duration::from_millis(*tick_ms),
            };
            rotate(env, config, &schedule).await?
        },
        Command::Hybrid { message, production, no_provider } => {
            let mode = if *production { Mode::Production } else { Mode::Pedagogical };
            let params = DomainParameters::educational();
            let transcript = if *no_provider {
                hybrid_demo(mode, &UnavailableProvider, &env, &params, message.as_bytes()).await?
            } else {
                let provider = DalekProvider::new(env.clone());
                hybrid_demo(mode, &provider, &env, &params, message.as_bytes()).await?
            };
            Output::new(render::hybrid(&transcript)?, &transcript)?
        },
        Command::Bench { exchange_ops, provider_ops, cipher_ops } => {
            let config = BenchConfig {
                exchange_ops: *exchange_ops,
                provider_ops: *provider_ops,
                cipher_ops: *cipher_ops,
            };
            let results = run_benchmarks(&env, &config).await?;
            Output::new(render::benchmarks(&results)?, &results)?
        },
    };

    if cli.json { Ok(serde_json::to_string_pretty(&output.json)?) } else { Ok(output.text) }
}

fn private_key_or_random<E: Environment>(
    env: &E,
    params: &DomainParameters,
    private_key: Option<u64>,
) -> Result<u64, ExchangeError> {
    private_key.map_or_else(|| random_private_key(env, params), Ok)
}

fn exchange<E: Environment>(
    env: &E,
    group: &GroupArgs,
    alice: Option<u64>,
    bob: Option<u64>,
) -> Result<Output, CliError> {
    let params = group.params()?;
    let alice = private_key_or_random(env, &params, alice)?;
    let bob = private_key_or_random(env, &params, bob)?;

    let session = ExchangeSession::run(params, alice, bob)?;
    Output::new(render::exchange(&session)?, &session)
}

fn interception<E: Environment>(
    env: &E,
    group: &GroupArgs,
    private_keys: [Option<u64>; 3],
    signed: bool,
    stolen_key: bool,
) -> Result<Output, CliError> {
    let params = group.params()?;
    let [alice, bob, eve] = private_keys;
    let alice = private_key_or_random(env, &params, alice)?;
    let bob = private_key_or_random(env, &params, bob)?;
    let eve = private_key_or_random(env, &params, eve)?;

    let alice = Party::honest("alice").with_keys(&params, alice)?;
    let bob = Party::honest("bob").with_keys(&params, bob)?;
    let eve = Party::adversary("eve").with_keys(&params, eve)?;

    if !signed {
        let result = intercept(&alice, &bob, &eve, &params)?;
        return Output::new(render::interception(&result)?, &result);
    }

    let authority = SigningKey::authority();
    let forger = if stolen_key {
        SigningKey::authority()
    } else {
        let (n, e, d) = ADVERSARY_SIGNING_KEY;
        SigningKey::new(n, e, d)?
    };
    let outcome =
        intercept_authenticated(&alice, &bob, &eve, &params, &authority.verifying_key(), &forger)?;
    Output::new(render::authenticated(&outcome)?, &outcome)
}

struct RotateSchedule<'a> {
    ticks: u64,
    usage_per_tick: u32,
    threat_at: &'a [u64],
    compromise_at: &'a [u64],
    tick: Duration,
}

async fn rotate<E: Environment>(
    env: E,
    config: LifecycleConfig,
    schedule: &RotateSchedule<'_>,
) -> Result<Output, CliError> {
    let mut manager = LifecycleManager::new(env.clone(), config)?;
    let mut events = Vec::new();

    for _ in 0..schedule.ticks {
        events.extend(manager.tick()?);
        let now = manager.now();

        if schedule.threat_at.contains(&now) {
            let level = manager.report_threat();
            events.push(dhlab_core::LifecycleEvent::ThreatLevelChanged { level, at: now });
        }
        if schedule.compromise_at.contains(&now) {
            events.extend(manager.mark_compromised()?);
        }
        for _ in 0..schedule.usage_per_tick {
            match manager.record_usage() {
                Ok(_) | Err(LifecycleError::Busy { .. }) => {},
                Err(err) => return Err(err.into()),
            }
        }

        if !schedule.tick.is_zero() {
            env.sleep(schedule.tick).await;
        }
    }

    let snapshot = manager.snapshot();
    let text = render::rotation(&events, &snapshot)?;
    Output::new(text, &RotateReport { events: &events, snapshot: &snapshot })
}
