use super::{AgentParams, Policy, PolicyRegistry};
use crate::error::BackendError;
use crate::metrics::logger::MetricsLogger;
use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

pub type AgentId = usize;

/// Learning side of the loop: one independent bandit per initialised agent.
pub trait Backend {
    fn init(&mut self, seed: u64) -> Result<AgentId>;
    /// Credits `reward` to the agent's previous choice and picks the next arm.
    fn sample(&mut self, reward: f64, agent: AgentId) -> Result<usize>;
    fn log(&mut self, name: &str, value: f64, agent: AgentId) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct AgentState {
    policy: Box<dyn Policy>,
    last_action: Option<usize>,
}

pub struct MabBackend {
    name: String,
    params: AgentParams,
    n_arms: usize,
    agents: Vec<AgentState>,
    logger: Option<MetricsLogger>,
}

impl MabBackend {
    pub fn new(name: &str, params: AgentParams, n_arms: usize) -> Result<Self> {
        if !PolicyRegistry::global().contains(name) {
            return Err(BackendError::UnknownPolicy(name.to_string()).into());
        }
        Ok(Self {
            name: name.to_string(),
            params,
            n_arms,
            agents: Vec::new(),
            logger: None,
        })
    }

    /// Appends sampled rewards and logged metrics to a CSV file.
    pub fn with_metric_log(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match MetricsLogger::new(path) {
            Ok(logger) => {
                info!("Metric log: {}", path.display());
                self.logger = Some(logger);
            }
            Err(e) => warn!("Metric log {} unavailable: {}", path.display(), e),
        }
        self
    }

    fn record(&mut self, name: &str, value: f64) {
        let Some(logger) = self.logger.as_mut() else {
            return;
        };
        if let Err(e) = logger.record(name, value) {
            warn!("Metric log write failed, disabling it: {}", e);
            self.logger = None;
        }
    }
}

impl Backend for MabBackend {
    fn init(&mut self, seed: u64) -> Result<AgentId> {
        let policy = PolicyRegistry::global()
            .create(&self.name, &self.params, self.n_arms, seed)
            .ok_or_else(|| BackendError::UnknownPolicy(self.name.clone()))?;

        let id = self.agents.len();
        debug!("Agent {} initialised: {} over {} arms, seed {}", id, policy.name(), self.n_arms, seed);
        self.agents.push(AgentState {
            policy,
            last_action: None,
        });
        Ok(id)
    }

    fn sample(&mut self, reward: f64, agent: AgentId) -> Result<usize> {
        if !reward.is_finite() {
            return Err(BackendError::InvalidReward { agent, reward }.into());
        }
        let state = self
            .agents
            .get_mut(agent)
            .ok_or(BackendError::UnknownAgent(agent))?;

        if let Some(previous) = state.last_action {
            state.policy.update(previous, reward);
        }
        let action = state.policy.select();
        state.last_action = Some(action);

        self.record(&format!("reward{}", agent), reward);
        Ok(action)
    }

    fn log(&mut self, name: &str, value: f64, agent: AgentId) -> Result<()> {
        if agent >= self.agents.len() {
            return Err(BackendError::UnknownAgent(agent).into());
        }
        self.record(name, value);
        Ok(())
    }

    /// Flushes the metric log and drops every agent. A failed flush is only reported.
    fn close(&mut self) -> Result<()> {
        if let Some(mut logger) = self.logger.take() {
            if let Err(e) = logger.finish() {
                warn!("Metric log flush failed: {}", e);
            }
        }
        self.agents.clear();
        Ok(())
    }
}
