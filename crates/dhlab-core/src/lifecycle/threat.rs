//! Threat level tracking.
//!
//! Reports raise the level by a fixed bump; each report schedules a relief
//! that lowers it again a few ticks later. The lifecycle manager advances the
//! monitor on every tick and its threat policy reads [`ThreatMonitor::level`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Highest threat level.
pub const MAX_THREAT_LEVEL: u32 = 100;

/// Threat monitor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatConfig {
    /// Level added per report
    pub report_bump: u32,
    /// Level removed by each scheduled relief
    pub relief: u32,
    /// Ticks between a report and its relief
    pub relief_delay: u64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self { report_bump: 30, relief: 10, relief_delay: 5 }
    }
}

/// Current threat level plus pending reliefs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatMonitor {
    config: ThreatConfig,
    level: u32,
    /// Due ticks, oldest first
    pending_reliefs: VecDeque<u64>,
}

impl ThreatMonitor {
    /// Monitor at level zero.
    pub fn new(config: ThreatConfig) -> Self {
        Self { config, level: 0, pending_reliefs: VecDeque::new() }
    }

    /// Current level in `[0, MAX_THREAT_LEVEL]`.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Override the level. Pending reliefs still apply.
    pub fn set_level(&mut self, level: u32) {
        self.level = level.min(MAX_THREAT_LEVEL);
    }

    /// Record a threat report at tick `now` and return the new level.
    pub fn report(&mut self, now: u64) -> u32 {
        self.level = (self.level + self.config.report_bump).min(MAX_THREAT_LEVEL);
        self.pending_reliefs.push_back(now + self.config.relief_delay);
        self.level
    }

    /// Apply reliefs due at or before `now`.
    ///
    /// Returns the new level if it changed.
    pub fn tick(&mut self, now: u64) -> Option<u32> {
        let before = self.level;
        while self.pending_reliefs.front().is_some_and(|&due| due <= now) {
            self.pending_reliefs.pop_front();
            self.level = self.level.saturating_sub(self.config.relief);
        }
        (self.level != before).then_some(self.level)
    }
}

impl Default for ThreatMonitor {
    fn default() -> Self {
        Self::new(ThreatConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_bumps_and_caps() {
        let mut monitor = ThreatMonitor::default();
        assert_eq!(monitor.report(0), 30);
        assert_eq!(monitor.report(0), 60);
        assert_eq!(monitor.report(0), 90);
        assert_eq!(monitor.report(0), 100);
    }

    #[test]
    fn relief_after_delay() {
        let mut monitor = ThreatMonitor::default();
        monitor.report(10);
        assert_eq!(monitor.tick(14), None);
        assert_eq!(monitor.tick(15), Some(20));
        assert_eq!(monitor.tick(16), None);
    }

    #[test]
    fn relief_saturates_at_zero() {
        let mut monitor = ThreatMonitor::default();
        monitor.report(0);
        monitor.set_level(5);
        assert_eq!(monitor.tick(5), Some(0));
    }

    #[test]
    fn set_level_clamps() {
        let mut monitor = ThreatMonitor::default();
        monitor.set_level(250);
        assert_eq!(monitor.level(), MAX_THREAT_LEVEL);
    }
}
