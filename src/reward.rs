use crate::error::ConfigError;
use crate::transport::Env;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Latency (s) at which the latency term reaches zero.
pub const LATENCY_THRESHOLD: f64 = 0.01;

/// Normalised terms of one agent's step. Higher is better for every term except
/// `plr` and `collision_index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardTerms {
    pub fairness: f64,
    pub throughput: f64,
    pub latency: f64,
    pub plr: f64,
    pub collision_index: f64,
}

impl RewardTerms {
    /// `data_rate` is the throughput (Mb/s) that maps to a term of 1.
    pub fn compute(env: &Env, agent: usize, data_rate: f64, latency_threshold: f64) -> Result<Self> {
        let obs = env.agent(agent)?;

        // No transmissions is scored as the worst case for both ratios.
        let (plr, collision_index) = if obs.tx == 0.0 {
            (1.0, 1.0)
        } else {
            (obs.lost / obs.tx, obs.collisions / obs.tx)
        };

        let terms = Self {
            fairness: 1.0 + 10.0 * (env.fairness - 1.0),
            throughput: obs.throughput / data_rate,
            latency: 1.0 - env.latency / latency_threshold,
            plr,
            collision_index,
        };

        debug!(
            "agent {} THR: {:.3} Mb/s plr: {:.3} collision index: {:.3} TX: {} LOST: {} collisions: {}",
            agent, obs.throughput, terms.plr, terms.collision_index, obs.tx, obs.lost, obs.collisions
        );

        Ok(terms)
    }
}

/// Weights of the fairness, throughput, latency and collision terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub fairness: f64,
    pub throughput: f64,
    pub latency: f64,
    pub collision: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            fairness: 0.0,
            throughput: 1.0,
            latency: 0.0,
            collision: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RewardPolicy {
    /// Dot product of the weights with the fairness, throughput, latency and
    /// `1 - collision_index` terms.
    Weighted(RewardWeights),
    /// `1 - collision_index`.
    CollisionOnly,
}

impl RewardPolicy {
    pub fn score(&self, terms: &RewardTerms) -> f64 {
        match self {
            RewardPolicy::Weighted(w) => [
                (w.fairness, terms.fairness),
                (w.throughput, terms.throughput),
                (w.latency, terms.latency),
                (w.collision, 1.0 - terms.collision_index),
            ]
            .into_iter()
            // unweighted terms must not leak NaN into the reward
            .filter(|(weight, _)| *weight != 0.0)
            .map(|(weight, term)| weight * term)
            .sum(),
            RewardPolicy::CollisionOnly => 1.0 - terms.collision_index,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RewardPolicy::Weighted(_) => "weighted",
            RewardPolicy::CollisionOnly => "collision",
        }
    }
}

/// Selector used on the command line; weights are supplied separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    Weighted,
    Collision,
}

impl FromStr for RewardKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted" => Ok(RewardKind::Weighted),
            "collision" | "collision-only" => Ok(RewardKind::Collision),
            other => Err(ConfigError::UnknownRewardPolicy(other.to_string())),
        }
    }
}

/// Scalar reward of `agent` for this step.
pub fn reward(
    env: &Env,
    agent: usize,
    policy: &RewardPolicy,
    data_rate: f64,
    latency_threshold: f64,
) -> Result<f64> {
    let terms = RewardTerms::compute(env, agent, data_rate, latency_threshold)?;
    Ok(policy.score(&terms))
}
