//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! lifecycle manager behaves identically to the reference model, while the
//! standard invariants hold after every step.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<LifecycleOp>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!    ModelLifecycle   RealLifecycle    Compare
//!     (reference)    (SimEnv seeded)   Results
//! ```

use dhlab_core::{LifecycleConfig, LifecycleManager, RotationPolicy, RotationTrigger};
use dhlab_harness::{
    InvariantRegistry, LifecycleOp, ModelLifecycle, ObservableLifecycle, OperationResult, SimEnv,
    SystemSnapshot,
};
use proptest::prelude::*;

/// Real manager wrapper that mirrors ModelLifecycle's interface.
struct RealLifecycle {
    manager: LifecycleManager<SimEnv>,
    history: SystemSnapshot,
}

impl RealLifecycle {
    fn new(config: LifecycleConfig, seed: u64) -> Self {
        let manager = LifecycleManager::new(SimEnv::with_seed(seed), config)
            .expect("default group has usable keys");
        let history = SystemSnapshot::from_manager(&manager);
        Self { manager, history }
    }

    fn apply(&mut self, op: &LifecycleOp) -> OperationResult {
        let result = match op {
            LifecycleOp::Tick { .. } => {
                let mut result = OperationResult::Ok;
                for _ in 0..op.ticks() {
                    result = self.manager.tick().into();
                    self.history.record(&self.manager);
                    if result.is_err() {
                        break;
                    }
                }
                return result;
            },
            LifecycleOp::RequestRotation => self.manager.request_rotation().into(),
            LifecycleOp::AbortRotation => self.manager.abort_rotation().into(),
            LifecycleOp::RecordUsage => self.manager.record_usage().into(),
            LifecycleOp::MarkCompromised => self.manager.mark_compromised().into(),
            LifecycleOp::ReportThreat => {
                self.manager.report_threat();
                OperationResult::Ok
            },
            LifecycleOp::SetThreatLevel { level } => {
                self.manager.set_threat_level(u32::from(*level));
                OperationResult::Ok
            },
        };
        self.history.record(&self.manager);
        result
    }

    fn observable(&self) -> ObservableLifecycle {
        ObservableLifecycle::from_snapshot(&self.manager.snapshot())
    }
}

fn lifecycle_op() -> impl Strategy<Value = LifecycleOp> {
    prop_oneof![
        // Weight towards the clock so rotations actually settle
        6 => any::<u8>().prop_map(|count| LifecycleOp::Tick { count }),
        2 => Just(LifecycleOp::RequestRotation),
        1 => Just(LifecycleOp::AbortRotation),
        3 => Just(LifecycleOp::RecordUsage),
        1 => Just(LifecycleOp::MarkCompromised),
        1 => Just(LifecycleOp::ReportThreat),
        1 => any::<u8>().prop_map(|level| LifecycleOp::SetThreatLevel { level }),
    ]
}

fn all_policies() -> LifecycleConfig {
    let mut config = LifecycleConfig::default();
    config.policies.set(RotationPolicy::enabled(RotationTrigger::Usage, 5));
    config.policies.set(RotationPolicy::enabled(RotationTrigger::Threat, 70));
    config
}

fn run_and_compare(
    config: LifecycleConfig,
    seed: u64,
    ops: &[LifecycleOp],
) -> Result<(), TestCaseError> {
    let mut model = ModelLifecycle::new(config.clone());
    let mut real = RealLifecycle::new(config, seed);
    let registry = InvariantRegistry::standard();

    for (i, op) in ops.iter().enumerate() {
        let model_result = model.apply(op);
        let real_result = real.apply(op);

        prop_assert_eq!(
            &model_result,
            &real_result,
            "Divergence at operation {}: {:?}",
            i,
            op
        );
        prop_assert_eq!(model.observable(), real.observable(), "State divergence after {:?}", op);

        if let Err(violations) = registry.check_all(&real.history) {
            return Err(TestCaseError::fail(format!("after {op:?}: {violations:?}")));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Verify that results and observable state match between model and real
    /// manager under the default policies.
    #[test]
    fn model_matches_real_default_policies(
        seed in any::<u64>(),
        ops in prop::collection::vec(lifecycle_op(), 1..80),
    ) {
        run_and_compare(LifecycleConfig::default(), seed, &ops)?;
    }

    /// Same comparison with usage and threat policies switched on.
    #[test]
    fn model_matches_real_all_policies(
        seed in any::<u64>(),
        ops in prop::collection::vec(lifecycle_op(), 1..80),
    ) {
        run_and_compare(all_policies(), seed, &ops)?;
    }

    /// Busy rejects a second rotation without changing anything.
    #[test]
    fn busy_leaves_state_untouched(ticks in 0u8..20) {
        let mut real = RealLifecycle::new(LifecycleConfig::default(), 1);
        for _ in 0..ticks {
            real.apply(&LifecycleOp::Tick { count: 0 });
        }
        if real.apply(&LifecycleOp::RequestRotation).is_ok() {
            let before = real.observable();
            prop_assert!(real.apply(&LifecycleOp::RequestRotation).is_err());
            prop_assert!(real.apply(&LifecycleOp::RecordUsage).is_err());
            prop_assert_eq!(before, real.observable());
        }
    }

    /// Arbitrary byte input decodes into a sequence the model and the real
    /// manager agree on.
    #[test]
    fn decoded_operations_agree(
        seed in any::<u64>(),
        data in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let ops = LifecycleOp::sequence_from_bytes(&data);
        run_and_compare(LifecycleConfig::default(), seed, &ops)?;
    }
}

#[test]
fn same_seed_same_keys() {
    let ops = [
        LifecycleOp::RequestRotation,
        LifecycleOp::Tick { count: 3 },
        LifecycleOp::MarkCompromised,
    ];

    let mut first = RealLifecycle::new(LifecycleConfig::default(), 42);
    let mut second = RealLifecycle::new(LifecycleConfig::default(), 42);
    for op in &ops {
        first.apply(op);
        second.apply(op);
    }

    assert_eq!(first.manager.snapshot(), second.manager.snapshot());
}
