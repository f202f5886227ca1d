//! Key lifecycle and rotation.
//!
//! [`LifecycleManager`] owns a session's append-only sequence of
//! [`KeyGeneration`]s and the pointer to the current one. It is driven by a
//! discrete clock: the host calls [`tick`](LifecycleManager::tick) once per
//! time unit and executes nothing itself. Every method returns the
//! [`LifecycleEvent`]s it produced for the host to render.
//!
//! # Rotation
//!
//! ```text
//!              policy fires / manual request
//!   ┌────────┐ ─────────────────────────────> ┌──────────┐  settle delay  ┌─────────┐
//!   │ Active │                                │ Rotating │ ─────────────> │ Expired │
//!   └────────┘ <───────────────────────────── └──────────┘                └─────────┘
//!       │                  abort                    │                    + new Active
//!       │ compromise                                │ compromise
//!       ↓                                           ↓
//!   ┌─────────────┐                          ┌─────────────┐
//!   │ Compromised │ + new Active             │ Compromised │ + new Active
//!   └─────────────┘                          └─────────────┘
//! ```
//!
//! Exactly one generation is current (`Active` or `Rotating`) at all times,
//! and exactly one is `Active` whenever no rotation is in flight. The
//! security score decays every tick the generation is current, including
//! during the settle delay.
//!
//! # Forward secrecy
//!
//! Private keys of retired generations are zeroized. The manager never
//! issues a public key twice, so no later generation can reuse retired key
//! material.

mod error;
mod generation;
mod policy;
mod threat;

use std::collections::{BTreeMap, HashSet};

pub use error::LifecycleError;
use generation::SecretKey;
pub use generation::{GenerationId, GenerationStatus, KeyGeneration};
pub use policy::{
    DEFAULT_THREAT_THRESHOLD, DEFAULT_TIME_INTERVAL, DEFAULT_USAGE_LIMIT, PolicyInput, PolicySet,
    RotationPolicy, RotationReason, RotationTrigger,
};
use serde::{Deserialize, Serialize};
pub use threat::{MAX_THREAT_LEVEL, ThreatConfig, ThreatMonitor};
use tokio::sync::watch;

use crate::{
    env::Environment,
    error::ExchangeError,
    exchange::{PartyId, Role, derive_shared_secret, generate_key_pair, validate_public_key},
    modexp::pow,
    params::DomainParameters,
};

/// Ticks a generation stays `Rotating` before it expires.
pub const DEFAULT_SETTLE_TICKS: u64 = 2;

/// Score of a freshly minted generation.
pub const INITIAL_SECURITY_SCORE: f64 = 100.0;

/// Score lost per tick while current.
pub const DEFAULT_SCORE_DECAY: f64 = 0.5;

/// Score below which rotation is forced.
pub const DEFAULT_SCORE_FLOOR: f64 = 20.0;

/// Prime of the default lifecycle group (`2^31 - 1`).
pub const DEFAULT_LIFECYCLE_PRIME: u64 = 2_147_483_647;

/// Generator of the default lifecycle group (a primitive root).
pub const DEFAULT_LIFECYCLE_GENERATOR: u64 = 7;

/// Lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Group each generation's key pair lives in
    pub params: DomainParameters,
    /// Ticks between rotation start and expiry
    pub settle_ticks: u64,
    /// Score of a new generation
    pub initial_score: f64,
    /// Score lost per tick
    pub score_decay: f64,
    /// Score below which rotation is forced
    pub score_floor: f64,
    /// Rotation policies
    pub policies: PolicySet,
    /// Threat monitor settings
    pub threat: ThreatConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            params: DomainParameters::new(DEFAULT_LIFECYCLE_PRIME, DEFAULT_LIFECYCLE_GENERATOR)
                .unwrap_or_default(),
            settle_ticks: DEFAULT_SETTLE_TICKS,
            initial_score: INITIAL_SECURITY_SCORE,
            score_decay: DEFAULT_SCORE_DECAY,
            score_floor: DEFAULT_SCORE_FLOOR,
            policies: PolicySet::default(),
            threat: ThreatConfig::default(),
        }
    }
}

/// Something the manager did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Generation moved to `Rotating`
    RotationStarted {
        /// Rotating generation
        generation: GenerationId,
        /// What started it
        reason: RotationReason,
        /// Tick
        at: u64,
    },
    /// Rotation cancelled, generation back to `Active`
    RotationAborted {
        /// Generation
        generation: GenerationId,
        /// Tick
        at: u64,
    },
    /// Generation retired by rotation
    GenerationExpired {
        /// Generation
        generation: GenerationId,
        /// Tick
        at: u64,
    },
    /// Generation retired by a compromise signal
    GenerationCompromised {
        /// Generation
        generation: GenerationId,
        /// Tick
        at: u64,
    },
    /// New `Active` generation
    GenerationMinted {
        /// New generation
        generation: GenerationId,
        /// Its public key
        public_key: u64,
        /// Why it was minted
        reason: Option<RotationReason>,
        /// Tick
        at: u64,
    },
    /// Threat level changed
    ThreatLevelChanged {
        /// New level
        level: u32,
        /// Tick
        at: u64,
    },
}

/// Complete, serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    /// Current tick
    pub now: u64,
    /// Current generation
    pub current: GenerationId,
    /// Every generation, oldest first
    pub generations: Vec<KeyGeneration>,
    /// Threat level
    pub threat_level: u32,
    /// Policies in force
    pub policies: PolicySet,
    /// Generations whose key material still exists
    pub live_key_material: Vec<GenerationId>,
}

/// Owner of a session's key generations.
///
/// Single writer: every mutation goes through `&mut self`. Readers either
/// take a [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe) to
/// the current-generation register, which only ever holds complete values.
pub struct LifecycleManager<E: Environment> {
    env: E,
    config: LifecycleConfig,
    now: u64,
    generations: Vec<KeyGeneration>,
    /// Index of the current generation in `generations`
    current: usize,
    secrets: BTreeMap<GenerationId, SecretKey>,
    issued_public_keys: HashSet<u64>,
    threat: ThreatMonitor,
    register: watch::Sender<KeyGeneration>,
}

impl<E: Environment> LifecycleManager<E> {
    /// Start a session at tick 0 with generation 1 active.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::KeySpaceExhausted` if the group has no usable key
    pub fn new(env: E, config: LifecycleConfig) -> Result<Self, LifecycleError> {
        let mut secrets = BTreeMap::new();
        let mut issued_public_keys = HashSet::new();
        let threat = ThreatMonitor::new(config.threat);

        let id = GenerationId::new(1);
        let (generation, secret) = mint(&env, &config, &issued_public_keys, id, 0)?;
        issued_public_keys.insert(generation.public_key);
        secrets.insert(id, secret);

        tracing::info!(generation = %id, public_key = generation.public_key, "session started");

        let (register, _) = watch::channel(generation.clone());

        Ok(Self {
            env,
            config,
            now: 0,
            generations: vec![generation],
            current: 0,
            secrets,
            issued_public_keys,
            threat,
            register,
        })
    }

    /// Advance the clock by one tick.
    ///
    /// In order: decay the current generation's score, complete a settled
    /// rotation, apply due threat reliefs, then evaluate policies against
    /// the `Active` generation. The register is republished on every tick,
    /// including one that fails.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::KeySpaceExhausted` if a settled rotation cannot
    ///   mint a successor; the generation stays `Rotating` and the next tick
    ///   retries. Score decay and threat reliefs still apply; a resulting
    ///   level change is visible through [`threat_level`](Self::threat_level)
    ///   only.
    pub fn tick(&mut self) -> Result<Vec<LifecycleEvent>, LifecycleError> {
        self.now += 1;
        let now = self.now;
        let settle_ticks = self.config.settle_ticks;
        let mut events = Vec::new();

        let current = &mut self.generations[self.current];
        current.security_score = (current.security_score - self.config.score_decay).max(0.0);
        let settled_since =
            current.rotation_started_at.filter(|&started| now - started >= settle_ticks);

        let settled = match settled_since {
            Some(started) => self.complete_rotation(started, &mut events),
            None => Ok(()),
        };

        if let Some(level) = self.threat.tick(now) {
            tracing::info!(level, at = now, "threat level relieved");
            events.push(LifecycleEvent::ThreatLevelChanged { level, at: now });
        }

        if let Err(err) = settled {
            tracing::warn!(generation = %self.current().id, at = now, error = %err, "rotation stalled");
            self.publish();
            return Err(err);
        }

        let current = &self.generations[self.current];
        if current.status == GenerationStatus::Active {
            let input = PolicyInput {
                age: now - current.created_at,
                usage_count: current.usage_count,
                threat_level: self.threat.level(),
                security_score: current.security_score,
                score_floor: self.config.score_floor,
            };
            if let Some(reason) = self.config.policies.evaluate(&input) {
                events.push(self.begin_rotation(reason));
            }
        }

        self.publish();
        Ok(events)
    }

    /// Start a manual rotation now.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::Busy` if a rotation is already in flight (nothing
    ///   changes)
    /// - `LifecycleError::ManualRotationDisabled` if the manual policy is off
    pub fn request_rotation(&mut self) -> Result<LifecycleEvent, LifecycleError> {
        self.ensure_not_rotating()?;
        if !self.config.policies.is_enabled(RotationTrigger::Manual) {
            return Err(LifecycleError::ManualRotationDisabled);
        }

        let event = self.begin_rotation(RotationReason::Policy(RotationTrigger::Manual));
        self.publish();
        Ok(event)
    }

    /// Return the rotating generation to `Active`.
    ///
    /// Only possible before the settle delay elapses; after that the
    /// generation has already expired. Policies are evaluated again on the
    /// next tick and may restart the rotation.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::NoRotationInProgress` unless `Rotating`
    pub fn abort_rotation(&mut self) -> Result<LifecycleEvent, LifecycleError> {
        let now = self.now;
        let current = &mut self.generations[self.current];
        if current.status != GenerationStatus::Rotating {
            return Err(LifecycleError::NoRotationInProgress);
        }

        current.status = GenerationStatus::Active;
        current.rotation_started_at = None;
        let generation = current.id;

        tracing::info!(generation = %generation, at = now, "rotation aborted");

        self.publish();
        Ok(LifecycleEvent::RotationAborted { generation, at: now })
    }

    /// Count one encryption under the active generation.
    ///
    /// Returns the generation's new usage count. The usage policy is
    /// evaluated on the next tick.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::Busy` while rotating
    pub fn record_usage(&mut self) -> Result<u64, LifecycleError> {
        self.ensure_not_rotating()?;

        let current = &mut self.generations[self.current];
        current.usage_count += 1;
        let count = current.usage_count;

        self.publish();
        Ok(count)
    }

    /// Retire the current generation as compromised and mint a replacement
    /// immediately.
    ///
    /// Works from `Active` and from `Rotating` (the pending rotation is
    /// superseded).
    ///
    /// # Errors
    ///
    /// - `LifecycleError::KeySpaceExhausted` if no replacement can be
    ///   minted; the current generation is left untouched
    pub fn mark_compromised(&mut self) -> Result<Vec<LifecycleEvent>, LifecycleError> {
        let now = self.now;
        let (successor, secret) = self.mint_successor(now)?;

        let current = &mut self.generations[self.current];
        current.status = GenerationStatus::Compromised;
        current.rotation_started_at = None;
        current.retired_at = Some(now);
        let compromised = current.id;
        self.destroy_key_material(compromised);

        tracing::warn!(generation = %compromised, at = now, "generation compromised");

        let minted = self.install(successor, secret, Some(RotationReason::Compromise));

        self.publish();
        Ok(vec![LifecycleEvent::GenerationCompromised { generation: compromised, at: now }, minted])
    }

    /// Set the threat level directly.
    pub fn set_threat_level(&mut self, level: u32) {
        self.threat.set_level(level);
    }

    /// Record an external threat report; returns the new level.
    pub fn report_threat(&mut self) -> u32 {
        let level = self.threat.report(self.now);
        tracing::info!(level, at = self.now, "threat reported");
        level
    }

    /// Replace a rotation policy.
    pub fn set_policy(&mut self, policy: RotationPolicy) {
        self.config.policies.set(policy);
    }

    /// Derive a DH secret with `generation`'s private key.
    ///
    /// # Errors
    ///
    /// - `LifecycleError::UnknownGeneration` for an id never issued
    /// - `LifecycleError::KeyMaterialRetired` once the generation is
    ///   `Expired` or `Compromised`
    /// - `LifecycleError::Exchange` if `peer_public` is weak or out of range
    pub fn derive_secret(&self, generation: GenerationId, peer_public: u64) -> Result<u64, LifecycleError> {
        if self.generation(generation).is_none() {
            return Err(LifecycleError::UnknownGeneration { generation });
        }
        let secret = self.secrets.get(&generation).ok_or(LifecycleError::KeyMaterialRetired { generation })?;
        Ok(derive_shared_secret(secret.expose(), peer_public, &self.config.params)?)
    }

    /// Receiver for the current-generation register.
    pub fn subscribe(&self) -> watch::Receiver<KeyGeneration> {
        self.register.subscribe()
    }

    /// Complete view of the session.
    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            now: self.now,
            current: self.current().id,
            generations: self.generations.clone(),
            threat_level: self.threat.level(),
            policies: self.config.policies.clone(),
            live_key_material: self.secrets.keys().copied().collect(),
        }
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Current generation (`Active` or `Rotating`).
    pub fn current(&self) -> &KeyGeneration {
        &self.generations[self.current]
    }

    /// All generations, oldest first.
    pub fn generations(&self) -> &[KeyGeneration] {
        &self.generations
    }

    /// Generation by id.
    pub fn generation(&self, id: GenerationId) -> Option<&KeyGeneration> {
        self.generations.iter().find(|g| g.id == id)
    }

    /// Current threat level.
    pub fn threat_level(&self) -> u32 {
        self.threat.level()
    }

    /// Configuration in force.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Whether `generation` still holds private key material.
    pub fn has_key_material(&self, generation: GenerationId) -> bool {
        self.secrets.contains_key(&generation)
    }

    fn ensure_not_rotating(&self) -> Result<(), LifecycleError> {
        let current = self.current();
        match current.status {
            GenerationStatus::Rotating => Err(LifecycleError::Busy { generation: current.id }),
            _ => Ok(()),
        }
    }

    fn begin_rotation(&mut self, reason: RotationReason) -> LifecycleEvent {
        let now = self.now;
        let current = &mut self.generations[self.current];
        debug_assert_eq!(current.status, GenerationStatus::Active);

        current.status = GenerationStatus::Rotating;
        current.rotation_started_at = Some(now);
        let generation = current.id;

        tracing::info!(generation = %generation, %reason, at = now, "rotation started");

        LifecycleEvent::RotationStarted { generation, reason, at: now }
    }

    fn complete_rotation(&mut self, started: u64, events: &mut Vec<LifecycleEvent>) -> Result<(), LifecycleError> {
        let now = self.now;
        let (successor, secret) = self.mint_successor(started)?;

        let current = &mut self.generations[self.current];
        current.status = GenerationStatus::Expired;
        current.rotation_started_at = None;
        current.retired_at = Some(now);
        let expired = current.id;
        self.destroy_key_material(expired);

        tracing::info!(generation = %expired, at = now, "generation expired");
        events.push(LifecycleEvent::GenerationExpired { generation: expired, at: now });

        // Rotation reason is carried by the RotationStarted event
        events.push(self.install(successor, secret, None));
        Ok(())
    }

    fn mint_successor(&self, created_at: u64) -> Result<(KeyGeneration, SecretKey), LifecycleError> {
        let id = self.generations.last().map_or(GenerationId::new(1), |g| g.id.next());
        mint(&self.env, &self.config, &self.issued_public_keys, id, created_at)
    }

    fn install(
        &mut self,
        generation: KeyGeneration,
        secret: SecretKey,
        reason: Option<RotationReason>,
    ) -> LifecycleEvent {
        let id = generation.id;
        let public_key = generation.public_key;

        self.issued_public_keys.insert(public_key);
        self.secrets.insert(id, secret);
        self.generations.push(generation);
        self.current = self.generations.len() - 1;

        tracing::info!(generation = %id, public_key, at = self.now, "generation minted");

        self.debug_check_invariants();
        LifecycleEvent::GenerationMinted { generation: id, public_key, reason, at: self.now }
    }

    fn destroy_key_material(&mut self, generation: GenerationId) {
        // SecretKey zeroizes on drop
        drop(self.secrets.remove(&generation));
    }

    fn publish(&self) {
        self.register.send_replace(self.current().clone());
    }

    fn debug_check_invariants(&self) {
        debug_assert_eq!(
            self.generations.iter().filter(|g| g.status.is_current()).count(),
            1,
            "exactly one current generation"
        );
        debug_assert!(self.generations[self.current].status.is_current());
        debug_assert!(self.generations.windows(2).all(|w| w[0].id < w[1].id));
        debug_assert!(
            self.generations
                .iter()
                .filter(|g| g.status.is_terminal())
                .all(|g| !self.secrets.contains_key(&g.id))
        );
    }
}

/// Mint a generation whose public key is valid and never issued before.
///
/// Draws a random private key in `[2, prime-2]`, then walks forward
/// (wrapping) until a usable public key turns up. The key pair itself comes
/// from [`generate_key_pair`].
fn mint<E: Environment>(
    env: &E,
    config: &LifecycleConfig,
    issued: &HashSet<u64>,
    id: GenerationId,
    created_at: u64,
) -> Result<(KeyGeneration, SecretKey), LifecycleError> {
    let params = &config.params;
    let low = 2;
    let span = params.prime() - 3;
    let start = env.random_in_range(low, low + span - 1) - low;

    let usable = |candidate: u64| {
        let public_key = pow(params.generator(), candidate, params.modulus());
        !issued.contains(&public_key) && validate_public_key(public_key, params).is_ok()
    };

    let private_key = (0..span)
        .map(|offset| low + (start + offset) % span)
        .find(|&candidate| usable(candidate))
        .ok_or(LifecycleError::KeySpaceExhausted { prime: params.prime() })?;

    let owner = PartyId::new(format!("generation-{}", id.get()));
    let party = generate_key_pair(params, owner.clone(), Role::Honest(owner), private_key)?;
    let public_key = party.require_public_key().map_err(ExchangeError::from)?;

    let generation = KeyGeneration {
        id,
        created_at,
        status: GenerationStatus::Active,
        usage_count: 0,
        security_score: config.initial_score,
        public_key,
        rotation_started_at: None,
        retired_at: None,
    };
    Ok((generation, SecretKey::new(party.private_key())))
}
