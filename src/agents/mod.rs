pub mod backend;
pub mod egreedy;
pub mod thompson;
pub mod ucb;

pub use backend::{AgentId, Backend, MabBackend};

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the pass-through mode that leaves the simulator's own CW algorithm running.
pub const FIXED_POLICY: &str = "wifi";

/// A bandit algorithm over a fixed number of arms.
pub trait Policy: Send + Sync + fmt::Debug {
    fn select(&mut self) -> usize;
    fn update(&mut self, arm: usize, reward: f64);
    fn name(&self) -> &str;
    fn n_arms(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EGreedyParams {
    pub e: f64,
    pub optimistic_start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UcbParams {
    pub c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThompsonParams {
    pub alpha: f64,
    pub beta: f64,
    pub mu: f64,
    pub lam: f64,
}

/// Hyperparameters of every registered algorithm; only the selected one is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    pub egreedy: EGreedyParams,
    pub ucb: UcbParams,
    pub thompson: ThompsonParams,
}

impl AgentParams {
    pub fn single_agent() -> Self {
        Self {
            egreedy: EGreedyParams {
                e: 0.05,
                optimistic_start: 1.0,
            },
            ucb: UcbParams { c: 0.01 },
            thompson: ThompsonParams {
                alpha: 1.0,
                beta: 1.0,
                mu: 1.0,
                lam: 0.0,
            },
        }
    }

    pub fn multi_agent() -> Self {
        Self {
            thompson: ThompsonParams {
                alpha: 10.0,
                beta: 0.2,
                mu: 1.0,
                lam: 0.0,
            },
            ..Self::single_agent()
        }
    }
}

impl Default for AgentParams {
    fn default() -> Self {
        Self::multi_agent()
    }
}

type PolicyFactory = Box<dyn Fn(&AgentParams, usize, u64) -> Box<dyn Policy> + Send + Sync>;

pub struct PolicyRegistry {
    policies: HashMap<String, PolicyFactory>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            policies: HashMap::new(),
        };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("EGreedy", |p, arms, seed| {
            Box::new(egreedy::EGreedy::new(arms, p.egreedy, seed))
        });
        self.register("UCB", |p, arms, seed| Box::new(ucb::Ucb::new(arms, p.ucb, seed)));
        self.register("NormalThompsonSampling", |p, arms, seed| {
            Box::new(thompson::NormalThompsonSampling::new(arms, p.thompson, seed))
        });
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&AgentParams, usize, u64) -> Box<dyn Policy> + Send + Sync + 'static,
    {
        self.policies.insert(name.to_lowercase(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(&name.to_lowercase())
    }

    pub fn create(&self, name: &str, params: &AgentParams, n_arms: usize, seed: u64) -> Option<Box<dyn Policy>> {
        self.policies
            .get(&name.to_lowercase())
            .map(|factory| factory(params, n_arms, seed))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static PolicyRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<PolicyRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PolicyRegistry::new)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the largest value, ties broken uniformly at random.
pub(crate) fn argmax_random_tie(values: &[f64], rng: &mut StdRng) -> usize {
    let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ties: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == best)
        .map(|(i, _)| i)
        .collect();

    match ties.len() {
        0 => rng.gen_range(0..values.len()),
        1 => ties[0],
        n => ties[rng.gen_range(0..n)],
    }
}
