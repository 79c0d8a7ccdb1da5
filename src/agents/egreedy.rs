use super::{EGreedyParams, Policy, argmax_random_tie};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sample-average epsilon-greedy with optimistic initial values.
#[derive(Debug, Clone)]
pub struct EGreedy {
    e: f64,
    q: Vec<f64>,
    counts: Vec<u64>,
    rng: StdRng,
}

impl EGreedy {
    pub fn new(n_arms: usize, params: EGreedyParams, seed: u64) -> Self {
        Self {
            e: params.e,
            q: vec![params.optimistic_start; n_arms],
            counts: vec![0; n_arms],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn estimates(&self) -> &[f64] {
        &self.q
    }
}

impl Policy for EGreedy {
    fn select(&mut self) -> usize {
        if self.rng.r#gen::<f64>() < self.e {
            self.rng.gen_range(0..self.q.len())
        } else {
            argmax_random_tie(&self.q, &mut self.rng)
        }
    }

    fn update(&mut self, arm: usize, reward: f64) {
        self.counts[arm] += 1;
        self.q[arm] += (reward - self.q[arm]) / self.counts[arm] as f64;
    }

    fn name(&self) -> &str {
        "EGreedy"
    }

    fn n_arms(&self) -> usize {
        self.q.len()
    }
}
