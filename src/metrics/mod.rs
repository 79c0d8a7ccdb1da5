pub mod logger;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: usize,
    pub seed: u64,
    pub mean_reward: f64,
    pub last_reward: Option<f64>,
    pub last_cw: Option<usize>,
    pub warmup_end: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub scenario: String,
    pub agent_name: String,
    pub steps: u64,
    pub last_time: f64,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub agents: Vec<AgentSummary>,
}

/// Running per-agent statistics gathered by the driver.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    steps: u64,
    last_time: f64,
    reward_sums: Vec<f64>,
    last_rewards: Vec<Option<f64>>,
    last_cws: Vec<Option<usize>>,
    started_at: DateTime<Local>,
}

impl MetricsCollector {
    pub fn new(agents: usize) -> Self {
        Self {
            steps: 0,
            last_time: 0.0,
            reward_sums: vec![0.0; agents],
            last_rewards: vec![None; agents],
            last_cws: vec![None; agents],
            started_at: Local::now(),
        }
    }

    pub fn record_reward(&mut self, agent: usize, reward: f64) {
        if let Some(sum) = self.reward_sums.get_mut(agent) {
            *sum += reward;
            self.last_rewards[agent] = Some(reward);
        }
    }

    pub fn record_cw(&mut self, agent: usize, cw: usize) {
        if let Some(slot) = self.last_cws.get_mut(agent) {
            *slot = Some(cw);
        }
    }

    pub fn end_step(&mut self, time: f64) {
        self.steps += 1;
        self.last_time = time;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn mean_reward(&self, agent: usize) -> f64 {
        match (self.reward_sums.get(agent), self.steps) {
            (Some(sum), steps) if steps > 0 => sum / steps as f64,
            _ => 0.0,
        }
    }

    pub fn last_cw(&self, agent: usize) -> Option<usize> {
        self.last_cws.get(agent).copied().flatten()
    }

    pub fn last_reward(&self, agent: usize) -> Option<f64> {
        self.last_rewards.get(agent).copied().flatten()
    }

    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}
