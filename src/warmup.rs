use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

pub const ACTION_HISTORY_LEN: usize = 20;
pub const ACTION_PROB_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmupConfig {
    pub enabled: bool,
    /// Simulation time (s) after which warm-up ends regardless of convergence.
    pub max_time: f64,
    pub history_len: usize,
    pub prob_threshold: f64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_time: 50.0,
            history_len: ACTION_HISTORY_LEN,
            prob_threshold: ACTION_PROB_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmupState {
    WarmingUp,
    Converged,
}

/// Decides when an agent's CW choice has settled. Once converged it stays converged.
#[derive(Debug, Clone)]
pub struct WarmupDetector {
    config: WarmupConfig,
    history: VecDeque<usize>,
    state: WarmupState,
    converged_at: Option<f64>,
}

impl WarmupDetector {
    pub fn new(config: WarmupConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.history_len),
            state: WarmupState::WarmingUp,
            converged_at: None,
        }
    }

    pub fn state(&self) -> WarmupState {
        self.state
    }

    pub fn is_converged(&self) -> bool {
        self.state == WarmupState::Converged
    }

    /// Simulation time of the step that ended warm-up.
    pub fn converged_at(&self) -> Option<f64> {
        self.converged_at
    }

    pub fn history(&self) -> impl Iterator<Item = &usize> {
        self.history.iter()
    }

    /// Feeds the CW chosen at simulation time `time`; returns the end-of-warm-up flag.
    pub fn observe(&mut self, cw: usize, time: f64) -> bool {
        if self.is_converged() {
            return true;
        }

        if !self.config.enabled || time > self.config.max_time {
            return self.converge(time);
        }

        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(cw);

        if self.history.len() < self.config.history_len {
            return false;
        }

        if self.max_probability() > self.config.prob_threshold {
            return self.converge(time);
        }

        false
    }

    /// Share of the window taken by its most frequent value.
    pub fn max_probability(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for cw in &self.history {
            *counts.entry(*cw).or_insert(0) += 1;
        }
        let top = counts.values().copied().max().unwrap_or(0);
        top as f64 / self.history.len() as f64
    }

    fn converge(&mut self, time: f64) -> bool {
        self.state = WarmupState::Converged;
        self.converged_at = Some(time);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> WarmupConfig {
        WarmupConfig {
            enabled: true,
            max_time: 50.0,
            ..WarmupConfig::default()
        }
    }

    #[test]
    fn converges_exactly_when_window_fills() {
        let mut detector = WarmupDetector::new(enabled());
        for step in 1..ACTION_HISTORY_LEN {
            assert!(!detector.observe(3, step as f64 * 0.5), "converged early at step {}", step);
        }
        assert!(detector.observe(3, 10.0));
        assert_eq!(detector.converged_at(), Some(10.0));
    }

    #[test]
    fn never_reverts_once_converged() {
        let mut detector = WarmupDetector::new(enabled());
        for _ in 0..ACTION_HISTORY_LEN {
            detector.observe(5, 1.0);
        }
        assert!(detector.is_converged());
        for cw in 0..40 {
            assert!(detector.observe(cw, 2.0));
        }
        assert_eq!(detector.state(), WarmupState::Converged);
    }

    #[test]
    fn disabled_warmup_ends_immediately() {
        let mut detector = WarmupDetector::new(WarmupConfig::default());
        assert!(detector.observe(0, 0.0));
        assert_eq!(detector.history().count(), 0);
    }

    #[test]
    fn time_bound_ends_before_accumulating() {
        let mut detector = WarmupDetector::new(WarmupConfig {
            max_time: 5.0,
            ..enabled()
        });
        assert!(detector.observe(1, 5.5));
        assert_eq!(detector.history().count(), 0);
    }

    #[test]
    fn mixed_window_stays_warming_up() {
        let mut detector = WarmupDetector::new(enabled());
        // 18 of 20 is exactly 0.9, not above the threshold
        for i in 0..ACTION_HISTORY_LEN {
            let cw = if i < 2 { 7 } else { 3 };
            assert!(!detector.observe(cw, 1.0));
        }
        assert!((detector.max_probability() - 0.9).abs() < 1e-12);

        // oldest outlier evicted: 19 of 20
        assert!(detector.observe(3, 1.5));
    }

    #[test]
    fn window_is_bounded() {
        let mut detector = WarmupDetector::new(enabled());
        for i in 0..100 {
            detector.observe(i % 4, 1.0);
        }
        assert_eq!(detector.history().count(), ACTION_HISTORY_LEN);
        assert!(!detector.is_converged());
    }
}
