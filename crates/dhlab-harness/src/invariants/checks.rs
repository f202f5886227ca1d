//! Lifecycle and exchange invariants.

use std::collections::{HashMap, HashSet};

use dhlab_core::{ExchangePhase, GenerationId, GenerationStatus};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Exactly one generation is current, and it is the one the session points
/// at.
///
/// Current means `Active` or `Rotating`. Zero current generations leaves the
/// session without a key; two means a rotation minted a second pending key.
pub struct SingleCurrentGeneration;

impl Invariant for SingleCurrentGeneration {
    fn name(&self) -> &'static str {
        "single_current_generation"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for snapshot in &state.lifecycle {
            let current: Vec<_> =
                snapshot.generations.iter().filter(|g| g.status.is_current()).map(|g| g.id).collect();

            if current != [snapshot.current] {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "tick {}: current generations {:?}, pointer at {}",
                        snapshot.now, current, snapshot.current
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Generation ids strictly increase, within a snapshot and over time.
pub struct GenerationIdMonotonicity;

impl Invariant for GenerationIdMonotonicity {
    fn name(&self) -> &'static str {
        "generation_id_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for snapshot in &state.lifecycle {
            for window in snapshot.generations.windows(2) {
                if window[1].id <= window[0].id {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "tick {}: generation {} follows {}",
                            snapshot.now, window[1].id, window[0].id
                        ),
                    });
                }
            }
        }

        for window in state.lifecycle.windows(2) {
            if window[1].current < window[0].current {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "current generation went back from {} to {}",
                        window[0].current, window[1].current
                    ),
                });
            }
            if window[1].generations.len() < window[0].generations.len() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "history shrank from {} to {} generations",
                        window[0].generations.len(),
                        window[1].generations.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A retired generation keeps its terminal status forever.
pub struct NoResurrection;

impl Invariant for NoResurrection {
    fn name(&self) -> &'static str {
        "no_resurrection"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut retired: HashMap<GenerationId, GenerationStatus> = HashMap::new();

        for snapshot in &state.lifecycle {
            for generation in &snapshot.generations {
                match retired.get(&generation.id) {
                    Some(&status) if status != generation.status => {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "tick {}: generation {} went from {:?} to {:?}",
                                snapshot.now, generation.id, status, generation.status
                            ),
                        });
                    },
                    _ => {},
                }
                if generation.status.is_terminal() {
                    retired.insert(generation.id, generation.status);
                }
            }
        }
        Ok(())
    }
}

/// Retired generations hold no key material and no public key is issued
/// twice.
pub struct ForwardSecrecy;

impl Invariant for ForwardSecrecy {
    fn name(&self) -> &'static str {
        "forward_secrecy"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for snapshot in &state.lifecycle {
            let live: HashSet<_> = snapshot.live_key_material.iter().copied().collect();

            for generation in &snapshot.generations {
                if generation.status.is_terminal() && live.contains(&generation.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "tick {}: retired generation {} still holds key material",
                            snapshot.now, generation.id
                        ),
                    });
                }
            }

            let mut seen = HashSet::new();
            for generation in &snapshot.generations {
                if !seen.insert(generation.public_key) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "tick {}: public key {} reissued to generation {}",
                            snapshot.now, generation.public_key, generation.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Completed exchanges agree on the shared secret.
pub struct SharedSecretAgreement;

impl Invariant for SharedSecretAgreement {
    fn name(&self) -> &'static str {
        "shared_secret_agreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.exchanges {
            if session.phase() != ExchangePhase::Completed {
                continue;
            }
            if session.shared_secret_a().is_none()
                || session.shared_secret_a() != session.shared_secret_b()
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} derived {:?}, {} derived {:?}",
                        session.party_a().id(),
                        session.shared_secret_a(),
                        session.party_b().id(),
                        session.shared_secret_b()
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dhlab_core::{DomainParameters, ExchangeSession, KeyGeneration, LifecycleSnapshot, PolicySet};

    use super::*;

    fn generation(id: u64, status: GenerationStatus, public_key: u64) -> KeyGeneration {
        KeyGeneration {
            id: GenerationId::new(id),
            created_at: 0,
            status,
            usage_count: 0,
            security_score: 100.0,
            public_key,
            rotation_started_at: None,
            retired_at: None,
        }
    }

    fn snapshot(now: u64, current: u64, generations: Vec<KeyGeneration>) -> LifecycleSnapshot {
        let live_key_material =
            generations.iter().filter(|g| !g.status.is_terminal()).map(|g| g.id).collect();
        LifecycleSnapshot {
            now,
            current: GenerationId::new(current),
            generations,
            threat_level: 0,
            policies: PolicySet::default(),
            live_key_material,
        }
    }

    fn state(lifecycle: Vec<LifecycleSnapshot>) -> SystemSnapshot {
        SystemSnapshot { lifecycle, exchanges: Vec::new() }
    }

    #[test]
    fn two_current_generations_detected() {
        let bad = state(vec![snapshot(5, 2, vec![
            generation(1, GenerationStatus::Rotating, 3),
            generation(2, GenerationStatus::Active, 4),
        ])]);
        assert!(SingleCurrentGeneration.check(&bad).is_err());
    }

    #[test]
    fn pointer_must_match_current() {
        let bad = state(vec![snapshot(5, 1, vec![
            generation(1, GenerationStatus::Expired, 3),
            generation(2, GenerationStatus::Active, 4),
        ])]);
        assert!(SingleCurrentGeneration.check(&bad).is_err());
    }

    #[test]
    fn resurrection_detected() {
        let bad = state(vec![
            snapshot(1, 2, vec![
                generation(1, GenerationStatus::Expired, 3),
                generation(2, GenerationStatus::Active, 4),
            ]),
            snapshot(2, 1, vec![
                generation(1, GenerationStatus::Active, 3),
                generation(2, GenerationStatus::Expired, 4),
            ]),
        ]);
        assert!(NoResurrection.check(&bad).is_err());
        assert!(GenerationIdMonotonicity.check(&bad).is_err());
    }

    #[test]
    fn reissued_public_key_detected() {
        let bad = state(vec![snapshot(1, 2, vec![
            generation(1, GenerationStatus::Expired, 9),
            generation(2, GenerationStatus::Active, 9),
        ])]);
        let violation = ForwardSecrecy.check(&bad).unwrap_err();
        assert_eq!(violation.invariant, "forward_secrecy");
    }

    #[test]
    fn retained_key_material_detected() {
        let mut retained = snapshot(1, 2, vec![
            generation(1, GenerationStatus::Compromised, 3),
            generation(2, GenerationStatus::Active, 4),
        ]);
        retained.live_key_material.push(GenerationId::new(1));
        assert!(ForwardSecrecy.check(&state(vec![retained])).is_err());
    }

    #[test]
    fn completed_exchange_agrees() {
        let session = ExchangeSession::run(DomainParameters::educational(), 6, 15).unwrap();
        let snapshot = SystemSnapshot::empty().with_exchange(session);
        assert!(SharedSecretAgreement.check(&snapshot).is_ok());
    }
}
