use super::{Policy, ThompsonParams, argmax_random_tie};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, Normal};

#[derive(Debug, Clone, Copy, PartialEq)]
struct NormalGamma {
    mu: f64,
    lam: f64,
    alpha: f64,
    beta: f64,
}

impl NormalGamma {
    fn update(&mut self, reward: f64) {
        let lam = self.lam + 1.0;
        self.beta += 0.5 * self.lam * (reward - self.mu).powi(2) / lam;
        self.mu = (self.lam * self.mu + reward) / lam;
        self.alpha += 0.5;
        self.lam = lam;
    }
}

/// Thompson sampling with a Normal-Gamma prior over each arm's mean and precision.
#[derive(Debug, Clone)]
pub struct NormalThompsonSampling {
    arms: Vec<NormalGamma>,
    rng: StdRng,
}

impl NormalThompsonSampling {
    pub fn new(n_arms: usize, params: ThompsonParams, seed: u64) -> Self {
        let prior = NormalGamma {
            mu: params.mu,
            lam: params.lam,
            alpha: params.alpha,
            beta: params.beta,
        };
        Self {
            arms: vec![prior; n_arms],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn posterior_mean(&self, arm: usize) -> f64 {
        self.arms[arm].mu
    }

    // A zero pseudo-count means unbounded spread, so such arms win the draw.
    fn draw(&mut self, arm: usize) -> f64 {
        let NormalGamma { mu, lam, alpha, beta } = self.arms[arm];
        if lam <= 0.0 {
            return f64::INFINITY;
        }

        let tau = match Gamma::new(alpha, 1.0 / beta) {
            Ok(gamma) => gamma.sample(&mut self.rng),
            Err(_) => return mu,
        };
        let std = 1.0 / (lam * tau).sqrt();
        match Normal::new(mu, std) {
            Ok(normal) if std.is_finite() => normal.sample(&mut self.rng),
            _ => f64::INFINITY,
        }
    }
}

impl Policy for NormalThompsonSampling {
    fn select(&mut self) -> usize {
        let draws: Vec<f64> = (0..self.arms.len()).map(|arm| self.draw(arm)).collect();
        argmax_random_tie(&draws, &mut self.rng)
    }

    fn update(&mut self, arm: usize, reward: f64) {
        self.arms[arm].update(reward);
    }

    fn name(&self) -> &str {
        "NormalThompsonSampling"
    }

    fn n_arms(&self) -> usize {
        self.arms.len()
    }
}
