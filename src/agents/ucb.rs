use super::{Policy, UcbParams, argmax_random_tie};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Upper confidence bound: `Q[a] + c * sqrt(ln t / N[a])`, untried arms first.
#[derive(Debug, Clone)]
pub struct Ucb {
    c: f64,
    q: Vec<f64>,
    counts: Vec<u64>,
    total: u64,
    rng: StdRng,
}

impl Ucb {
    pub fn new(n_arms: usize, params: UcbParams, seed: u64) -> Self {
        Self {
            c: params.c,
            q: vec![0.0; n_arms],
            counts: vec![0; n_arms],
            total: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn bounds(&self) -> Vec<f64> {
        let ln_total = (self.total.max(1) as f64).ln();
        self.q
            .iter()
            .zip(&self.counts)
            .map(|(q, n)| {
                if *n == 0 {
                    f64::INFINITY
                } else {
                    q + self.c * (ln_total / *n as f64).sqrt()
                }
            })
            .collect()
    }
}

impl Policy for Ucb {
    fn select(&mut self) -> usize {
        let bounds = self.bounds();
        argmax_random_tie(&bounds, &mut self.rng)
    }

    fn update(&mut self, arm: usize, reward: f64) {
        self.total += 1;
        self.counts[arm] += 1;
        self.q[arm] += (reward - self.q[arm]) / self.counts[arm] as f64;
    }

    fn name(&self) -> &str {
        "UCB"
    }

    fn n_arms(&self) -> usize {
        self.q.len()
    }
}
