//! Reference model of a lifecycle session.
//!
//! The model tracks statuses, counters and the threat level with no key
//! material at all. It is deliberately naive: a flat list of generations and
//! the same rules the manager documents, written out step by step.

use std::collections::VecDeque;

use dhlab_core::{
    GenerationId, GenerationStatus, LifecycleConfig, LifecycleSnapshot, RotationTrigger,
    lifecycle::MAX_THREAT_LEVEL,
};

use super::operation::{LifecycleOp, OperationError, OperationResult};

/// Model of one key generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGeneration {
    /// Generation id.
    pub id: GenerationId,
    /// Tick it was created at.
    pub created_at: u64,
    /// Status.
    pub status: GenerationStatus,
    /// Encryptions counted.
    pub usage_count: u64,
    /// Security score.
    pub security_score: f64,
    /// Tick the pending rotation started at.
    pub rotation_started_at: Option<u64>,
}

/// State both the model and the real manager expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableLifecycle {
    /// Current tick.
    pub now: u64,
    /// Current generation.
    pub current_id: GenerationId,
    /// Status of the current generation.
    pub current_status: GenerationStatus,
    /// Usage count of the current generation.
    pub usage_count: u64,
    /// Threat level.
    pub threat_level: u32,
    /// Every generation's status, oldest first.
    pub statuses: Vec<GenerationStatus>,
}

impl ObservableLifecycle {
    /// Extract observable state from a real snapshot.
    pub fn from_snapshot(snapshot: &LifecycleSnapshot) -> Self {
        let current = snapshot.generations.iter().find(|g| g.id == snapshot.current);
        Self {
            now: snapshot.now,
            current_id: snapshot.current,
            current_status: current.map_or(GenerationStatus::Expired, |g| g.status),
            usage_count: current.map_or(0, |g| g.usage_count),
            threat_level: snapshot.threat_level,
            statuses: snapshot.generations.iter().map(|g| g.status).collect(),
        }
    }
}

/// Reference lifecycle session.
#[derive(Debug, Clone)]
pub struct ModelLifecycle {
    config: LifecycleConfig,
    now: u64,
    generations: Vec<ModelGeneration>,
    threat_level: u32,
    pending_reliefs: VecDeque<u64>,
}

impl ModelLifecycle {
    /// Session at tick 0 with generation 1 active.
    pub fn new(config: LifecycleConfig) -> Self {
        let first = ModelGeneration {
            id: GenerationId::new(1),
            created_at: 0,
            status: GenerationStatus::Active,
            usage_count: 0,
            security_score: config.initial_score,
            rotation_started_at: None,
        };
        Self {
            config,
            now: 0,
            generations: vec![first],
            threat_level: 0,
            pending_reliefs: VecDeque::new(),
        }
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &LifecycleOp) -> OperationResult {
        match op {
            LifecycleOp::Tick { .. } => {
                for _ in 0..op.ticks() {
                    self.tick();
                }
                OperationResult::Ok
            },
            LifecycleOp::RequestRotation => self.request_rotation(),
            LifecycleOp::AbortRotation => self.abort_rotation(),
            LifecycleOp::RecordUsage => self.record_usage(),
            LifecycleOp::MarkCompromised => {
                self.retire_current(GenerationStatus::Compromised);
                self.push_generation(self.now);
                OperationResult::Ok
            },
            LifecycleOp::ReportThreat => {
                self.threat_level =
                    (self.threat_level + self.config.threat.report_bump).min(MAX_THREAT_LEVEL);
                self.pending_reliefs.push_back(self.now + self.config.threat.relief_delay);
                OperationResult::Ok
            },
            LifecycleOp::SetThreatLevel { level } => {
                self.threat_level = u32::from(*level).min(MAX_THREAT_LEVEL);
                OperationResult::Ok
            },
        }
    }

    /// Observable state.
    pub fn observable(&self) -> ObservableLifecycle {
        let current = self.current();
        ObservableLifecycle {
            now: self.now,
            current_id: current.id,
            current_status: current.status,
            usage_count: current.usage_count,
            threat_level: self.threat_level,
            statuses: self.generations.iter().map(|g| g.status).collect(),
        }
    }

    /// Current generation.
    pub fn current(&self) -> &ModelGeneration {
        // The model always holds at least the first generation and appends
        // successors, so the current one is the last.
        &self.generations[self.generations.len() - 1]
    }

    /// All generations, oldest first.
    pub fn generations(&self) -> &[ModelGeneration] {
        &self.generations
    }

    fn current_mut(&mut self) -> &mut ModelGeneration {
        let last = self.generations.len() - 1;
        &mut self.generations[last]
    }

    fn tick(&mut self) {
        self.now += 1;
        let now = self.now;
        let decay = self.config.score_decay;
        let settle = self.config.settle_ticks;

        let current = self.current_mut();
        current.security_score = (current.security_score - decay).max(0.0);

        if let Some(started) = current.rotation_started_at
            && now - started >= settle
        {
            self.retire_current(GenerationStatus::Expired);
            self.push_generation(started);
        }

        while self.pending_reliefs.front().is_some_and(|&due| due <= now) {
            self.pending_reliefs.pop_front();
            self.threat_level = self.threat_level.saturating_sub(self.config.threat.relief);
        }

        if self.current().status == GenerationStatus::Active && self.rotation_due() {
            let current = self.current_mut();
            current.status = GenerationStatus::Rotating;
            current.rotation_started_at = Some(now);
        }
    }

    fn rotation_due(&self) -> bool {
        let policies = &self.config.policies;
        let current = self.current();
        let fires = |trigger: RotationTrigger, value: u64| {
            let policy = policies.get(trigger);
            policy.enabled && value >= policy.threshold
        };

        fires(RotationTrigger::Time, self.now - current.created_at)
            || fires(RotationTrigger::Usage, current.usage_count)
            || fires(RotationTrigger::Threat, u64::from(self.threat_level))
            || current.security_score < self.config.score_floor
    }

    fn request_rotation(&mut self) -> OperationResult {
        if self.current().status == GenerationStatus::Rotating {
            return OperationResult::Error(OperationError::Busy);
        }
        if !self.config.policies.is_enabled(RotationTrigger::Manual) {
            return OperationResult::Error(OperationError::ManualRotationDisabled);
        }
        let now = self.now;
        let current = self.current_mut();
        current.status = GenerationStatus::Rotating;
        current.rotation_started_at = Some(now);
        OperationResult::Ok
    }

    fn abort_rotation(&mut self) -> OperationResult {
        let current = self.current_mut();
        if current.status != GenerationStatus::Rotating {
            return OperationResult::Error(OperationError::NoRotationInProgress);
        }
        current.status = GenerationStatus::Active;
        current.rotation_started_at = None;
        OperationResult::Ok
    }

    fn record_usage(&mut self) -> OperationResult {
        let current = self.current_mut();
        if current.status == GenerationStatus::Rotating {
            return OperationResult::Error(OperationError::Busy);
        }
        current.usage_count += 1;
        OperationResult::Ok
    }

    fn retire_current(&mut self, status: GenerationStatus) {
        let current = self.current_mut();
        current.status = status;
        current.rotation_started_at = None;
    }

    fn push_generation(&mut self, created_at: u64) {
        let id = self.current().id.next();
        self.generations.push(ModelGeneration {
            id,
            created_at,
            status: GenerationStatus::Active,
            usage_count: 0,
            security_score: self.config.initial_score,
            rotation_started_at: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelLifecycle {
        ModelLifecycle::new(LifecycleConfig::default())
    }

    fn ticks(model: &mut ModelLifecycle, n: u8) {
        for _ in 0..n {
            model.apply(&LifecycleOp::Tick { count: 0 });
        }
    }

    #[test]
    fn time_policy_rotates_every_thirty_ticks() {
        let mut model = model();
        ticks(&mut model, 29);
        assert_eq!(model.current().status, GenerationStatus::Active);

        ticks(&mut model, 1);
        assert_eq!(model.current().status, GenerationStatus::Rotating);

        ticks(&mut model, 2);
        assert_eq!(model.current().id, GenerationId::new(2));
        assert_eq!(model.current().created_at, 30);
        assert_eq!(model.generations()[0].status, GenerationStatus::Expired);
    }

    #[test]
    fn second_rotation_request_is_busy() {
        let mut model = model();
        assert!(model.apply(&LifecycleOp::RequestRotation).is_ok());
        assert_eq!(
            model.apply(&LifecycleOp::RequestRotation),
            OperationResult::Error(OperationError::Busy)
        );
        assert_eq!(
            model.apply(&LifecycleOp::RecordUsage),
            OperationResult::Error(OperationError::Busy)
        );
    }

    #[test]
    fn abort_requires_rotation() {
        let mut model = model();
        assert_eq!(
            model.apply(&LifecycleOp::AbortRotation),
            OperationResult::Error(OperationError::NoRotationInProgress)
        );
        model.apply(&LifecycleOp::RequestRotation);
        assert!(model.apply(&LifecycleOp::AbortRotation).is_ok());
        assert_eq!(model.current().status, GenerationStatus::Active);
    }

    #[test]
    fn compromise_mints_immediately() {
        let mut model = model();
        ticks(&mut model, 3);
        model.apply(&LifecycleOp::MarkCompromised);

        let observable = model.observable();
        assert_eq!(observable.current_id, GenerationId::new(2));
        assert_eq!(observable.statuses, vec![
            GenerationStatus::Compromised,
            GenerationStatus::Active
        ]);
        assert_eq!(model.current().created_at, 3);
    }

    #[test]
    fn threat_report_relieved_after_delay() {
        let mut model = model();
        model.apply(&LifecycleOp::ReportThreat);
        assert_eq!(model.observable().threat_level, 30);
        ticks(&mut model, 4);
        assert_eq!(model.observable().threat_level, 30);
        ticks(&mut model, 1);
        assert_eq!(model.observable().threat_level, 20);
    }
}
