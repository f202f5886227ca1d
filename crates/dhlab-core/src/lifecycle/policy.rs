//! Rotation policies.
//!
//! A [`PolicySet`] holds one [`RotationPolicy`] per [`RotationTrigger`]; any
//! number may be enabled at once. [`PolicySet::evaluate`] is a pure function
//! of the active generation's observable state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default time-policy interval in ticks.
pub const DEFAULT_TIME_INTERVAL: u64 = 30;

/// Default usage-policy limit (encryptions per generation).
pub const DEFAULT_USAGE_LIMIT: u64 = 10;

/// Default threat-policy level.
pub const DEFAULT_THREAT_THRESHOLD: u64 = 70;

/// What a policy watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationTrigger {
    /// Ticks since the generation was created
    Time,
    /// Encryptions performed under the generation
    Usage,
    /// Externally reported threat level
    Threat,
    /// Explicit caller request
    Manual,
}

impl RotationTrigger {
    /// All triggers in evaluation order.
    pub const ALL: [Self; 4] = [Self::Time, Self::Usage, Self::Threat, Self::Manual];
}

impl fmt::Display for RotationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Time => "time",
            Self::Usage => "usage",
            Self::Threat => "threat",
            Self::Manual => "manual",
        })
    }
}

/// One rotation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// What the policy watches
    pub trigger: RotationTrigger,
    /// Level at which the policy fires (unused for manual)
    pub threshold: u64,
    /// Whether the policy is evaluated
    pub enabled: bool,
}

impl RotationPolicy {
    /// Enabled policy.
    pub fn enabled(trigger: RotationTrigger, threshold: u64) -> Self {
        Self { trigger, threshold, enabled: true }
    }

    /// Disabled policy.
    pub fn disabled(trigger: RotationTrigger, threshold: u64) -> Self {
        Self { trigger, threshold, enabled: false }
    }
}

/// Why a rotation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationReason {
    /// A policy fired
    Policy(RotationTrigger),
    /// Security score fell below the floor
    ScoreFloor,
    /// Generation was compromised and replaced immediately
    Compromise,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(trigger) => write!(f, "{trigger} policy"),
            Self::ScoreFloor => f.write_str("security score floor"),
            Self::Compromise => f.write_str("compromise"),
        }
    }
}

/// Observable state the policies read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInput {
    /// Ticks since the generation's `created_at`
    pub age: u64,
    /// Encryptions under the generation
    pub usage_count: u64,
    /// Current threat level
    pub threat_level: u32,
    /// Current security score
    pub security_score: f64,
    /// Score below which rotation is forced
    pub score_floor: f64,
}

/// One policy per trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    policies: [RotationPolicy; 4],
}

impl Default for PolicySet {
    /// Time every 30 ticks and manual requests enabled; usage (10) and
    /// threat (70) disabled.
    fn default() -> Self {
        Self {
            policies: [
                RotationPolicy::enabled(RotationTrigger::Time, DEFAULT_TIME_INTERVAL),
                RotationPolicy::disabled(RotationTrigger::Usage, DEFAULT_USAGE_LIMIT),
                RotationPolicy::disabled(RotationTrigger::Threat, DEFAULT_THREAT_THRESHOLD),
                RotationPolicy::enabled(RotationTrigger::Manual, 0),
            ],
        }
    }
}

impl PolicySet {
    /// Every policy disabled, thresholds at their defaults.
    pub fn none() -> Self {
        let mut set = Self::default();
        for policy in &mut set.policies {
            policy.enabled = false;
        }
        set
    }

    fn slot(trigger: RotationTrigger) -> usize {
        match trigger {
            RotationTrigger::Time => 0,
            RotationTrigger::Usage => 1,
            RotationTrigger::Threat => 2,
            RotationTrigger::Manual => 3,
        }
    }

    /// Policy for `trigger`.
    pub fn get(&self, trigger: RotationTrigger) -> RotationPolicy {
        self.policies[Self::slot(trigger)]
    }

    /// Replace the policy for `policy.trigger`.
    pub fn set(&mut self, policy: RotationPolicy) {
        self.policies[Self::slot(policy.trigger)] = policy;
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, policy: RotationPolicy) -> Self {
        self.set(policy);
        self
    }

    /// Whether `trigger` is enabled.
    pub fn is_enabled(&self, trigger: RotationTrigger) -> bool {
        self.get(trigger).enabled
    }

    /// All policies in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &RotationPolicy> {
        self.policies.iter()
    }

    /// First satisfied rule, if any.
    ///
    /// Time, usage and threat policies are checked in that order, then the
    /// score floor. Manual policies never fire here.
    pub fn evaluate(&self, input: &PolicyInput) -> Option<RotationReason> {
        let fired = self.iter().filter(|p| p.enabled).find(|p| match p.trigger {
            RotationTrigger::Time => input.age >= p.threshold,
            RotationTrigger::Usage => input.usage_count >= p.threshold,
            RotationTrigger::Threat => u64::from(input.threat_level) >= p.threshold,
            RotationTrigger::Manual => false,
        });

        if let Some(policy) = fired {
            return Some(RotationReason::Policy(policy.trigger));
        }
        (input.security_score < input.score_floor).then_some(RotationReason::ScoreFloor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PolicyInput {
        PolicyInput {
            age: 0,
            usage_count: 0,
            threat_level: 0,
            security_score: 100.0,
            score_floor: 20.0,
        }
    }

    #[test]
    fn defaults() {
        let set = PolicySet::default();
        assert!(set.is_enabled(RotationTrigger::Time));
        assert!(set.is_enabled(RotationTrigger::Manual));
        assert!(!set.is_enabled(RotationTrigger::Usage));
        assert!(!set.is_enabled(RotationTrigger::Threat));
        assert_eq!(set.get(RotationTrigger::Time).threshold, 30);
    }

    #[test]
    fn time_fires_at_threshold() {
        let set = PolicySet::default();
        assert_eq!(set.evaluate(&PolicyInput { age: 29, ..input() }), None);
        assert_eq!(
            set.evaluate(&PolicyInput { age: 30, ..input() }),
            Some(RotationReason::Policy(RotationTrigger::Time))
        );
    }

    #[test]
    fn disabled_policies_never_fire() {
        let set = PolicySet::none();
        let busy = PolicyInput { age: 1000, usage_count: 1000, threat_level: 100, ..input() };
        assert_eq!(set.evaluate(&busy), None);
    }

    #[test]
    fn several_policies_enabled_at_once() {
        let set = PolicySet::none()
            .with(RotationPolicy::enabled(RotationTrigger::Usage, 3))
            .with(RotationPolicy::enabled(RotationTrigger::Threat, 50));

        assert_eq!(
            set.evaluate(&PolicyInput { usage_count: 3, ..input() }),
            Some(RotationReason::Policy(RotationTrigger::Usage))
        );
        assert_eq!(
            set.evaluate(&PolicyInput { threat_level: 50, ..input() }),
            Some(RotationReason::Policy(RotationTrigger::Threat))
        );
        assert_eq!(set.evaluate(&PolicyInput { threat_level: 49, ..input() }), None);
    }

    #[test]
    fn score_floor_applies_without_policies() {
        let set = PolicySet::none();
        assert_eq!(set.evaluate(&PolicyInput { security_score: 20.0, ..input() }), None);
        assert_eq!(
            set.evaluate(&PolicyInput { security_score: 19.5, ..input() }),
            Some(RotationReason::ScoreFloor)
        );
    }
}
