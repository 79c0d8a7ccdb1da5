pub mod config;
pub mod process;

pub use config::{ExperimentConfig, Scenario, SettingValue, WifiSettings};
pub use process::{Ns3Process, Simulator};

use crate::agent::AgentSlot;
use crate::agents::{Backend, MabBackend};
use crate::metrics::logger::save_summary;
use crate::metrics::{AgentSummary, MetricsCollector, RunSummary};
use crate::reward;
use crate::transport::{RecordLayout, ShmTransport, StepSnapshot, Transport};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Steps between progress lines in the log.
const PROGRESS_INTERVAL: u64 = 100;

/// Runs one experiment against a simulator, one snapshot at a time.
///
/// Every agent slot is handled in index order within a step, and the whole Act record
/// is written before the snapshot goes back to the transport. The transport, the backend
/// and the simulator are torn down exactly once however the run ends.
pub struct Driver<T: Transport, S: Simulator> {
    config: ExperimentConfig,
    layout: RecordLayout,
    data_rate: f64,
    transport: T,
    simulator: S,
    backend: Option<Box<dyn Backend>>,
    slots: Vec<AgentSlot>,
    metrics: MetricsCollector,
    cancel: CancellationToken,
}

impl<T: Transport, S: Simulator> Driver<T, S> {
    /// Fails with a [`ConfigError`](crate::error::ConfigError) before touching the
    /// transport or the simulator.
    pub fn new(config: ExperimentConfig, transport: T, simulator: S) -> Result<Self> {
        config.validate()?;

        let count = config.agent_count();
        let slots = (0..count)
            .map(|i| AgentSlot::new(i, config.seed, config.warmup))
            .collect();

        Ok(Self {
            layout: config.layout(),
            data_rate: config.data_rate(),
            transport,
            simulator,
            backend: None,
            slots,
            metrics: MetricsCollector::new(count),
            cancel: CancellationToken::new(),
            config,
        })
    }

    /// Uses `backend` instead of building one from the configured agent name.
    pub fn with_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(mut self) -> Result<RunSummary> {
        info!(
            "Experiment {}: {} with {} agent(s) using {}",
            self.config.name,
            self.config.scenario.program(),
            self.slots.len(),
            self.config.agent_name
        );

        let outcome = self.execute().await;
        let teardown = self.teardown().await;

        match outcome {
            Ok(exit_code) => {
                teardown?;
                Ok(self.summary(exit_code))
            }
            Err(e) => {
                if let Err(t) = teardown {
                    warn!("Teardown after failed run also failed: {}", t);
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<Option<i32>> {
        self.attach_agents()?;
        self.simulator.launch(&self.config).await?;
        self.step_loop().await?;

        let cancel = self.cancel.clone();
        tokio::select! {
            exit = self.simulator.wait() => exit,
            _ = cancel.cancelled() => {
                warn!("Cancelled while waiting for the simulator to exit");
                Ok(None)
            }
        }
    }

    fn attach_agents(&mut self) -> Result<()> {
        if self.config.is_fixed_policy() {
            info!("Fixed policy: the simulator keeps its own contention window algorithm");
            if self.backend.take().is_some() {
                debug!("Ignoring the supplied backend under the fixed policy");
            }
            return Ok(());
        }

        if self.backend.is_none() {
            let backend = MabBackend::new(
                &self.config.agent_name,
                self.config.agent_params,
                self.config.action_space.size(),
            )?
            .with_metric_log(self.config.metric_log_path());
            self.backend = Some(Box::new(backend));
        }

        if let Some(backend) = self.backend.as_mut() {
            for slot in &mut self.slots {
                slot.attach(&mut **backend)?;
            }
        }
        Ok(())
    }

    async fn step_loop(&mut self) -> Result<()> {
        loop {
            if self.transport.is_finished() {
                debug!("Simulator signalled completion");
                break;
            }

            let acquired = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Run cancelled after {} steps", self.metrics.steps());
                    None
                }
                snapshot = self.transport.acquire() => snapshot?,
            };
            let Some(mut snapshot) = acquired else {
                break;
            };

            let applied = self.apply(&mut snapshot);
            let released = self.transport.release(snapshot);
            applied?;
            released?;

            let steps = self.metrics.steps();
            if steps % PROGRESS_INTERVAL == 0 {
                info!("Step {} at {:.2}s", steps, self.metrics.last_time());
            }
        }

        info!("Step loop finished after {} steps", self.metrics.steps());
        Ok(())
    }

    /// Fills in the Act record for every agent.
    fn apply(&mut self, snapshot: &mut StepSnapshot) -> Result<()> {
        let time = snapshot.env.time;
        let mut all_converged = true;

        for slot in &mut self.slots {
            let i = slot.index();
            let reward = reward::reward(
                &snapshot.env,
                i,
                &self.config.reward,
                self.data_rate,
                self.config.latency_threshold,
            )?;
            self.metrics.record_reward(i, reward);

            let (Some(backend), Some(handle)) = (self.backend.as_mut(), slot.handle()) else {
                continue;
            };

            let index = backend.sample(reward, handle)?;
            let action = self.config.action_space.decode(index)?;
            if let Err(e) = backend.log(&slot.metric_name(), action.cw as f64, handle) {
                warn!("Could not log {}: {}", slot.metric_name(), e);
            }

            snapshot.act.set_cw(i, action.cw)?;
            if self.layout.carries_link_flags() {
                snapshot
                    .act
                    .set_link_flags(i, action.rts_cts_enabled(), action.ampdu_enabled())?;
            }
            self.metrics.record_cw(i, action.cw);

            let was_converged = slot.warmup().is_converged();
            let converged = slot.warmup_mut().observe(action.cw, time);
            if converged && !was_converged {
                info!("Agent {} finished warm-up at {:.2}s", i, time);
            }
            all_converged &= converged;
        }

        if self.backend.is_some() {
            snapshot.act.end_warmup = all_converged;
        }
        self.metrics.end_step(time);
        Ok(())
    }

    /// Releases everything the run holds. Every step is attempted; the first error wins.
    async fn teardown(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Err(e) = self.transport.close() {
            warn!("Transport close failed: {}", e);
            first_error.get_or_insert(e);
        }
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.close() {
                warn!("Backend close failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.simulator.shutdown().await {
            warn!("Simulator shutdown failed: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn summary(&self, exit_code: Option<i32>) -> RunSummary {
        let agents = self
            .slots
            .iter()
            .map(|slot| AgentSummary {
                agent: slot.index(),
                seed: slot.seed(),
                mean_reward: self.metrics.mean_reward(slot.index()),
                last_reward: self.metrics.last_reward(slot.index()),
                last_cw: self.metrics.last_cw(slot.index()),
                warmup_end: slot.warmup().converged_at(),
            })
            .collect();

        RunSummary {
            name: self.config.name.clone(),
            scenario: self.config.scenario.program().to_string(),
            agent_name: self.config.agent_name.clone(),
            steps: self.metrics.steps(),
            last_time: self.metrics.last_time(),
            exit_code,
            started_at: self.metrics.started_at(),
            finished_at: Some(chrono::Local::now()),
            agents,
        }
    }
}

/// Runs `config` against ns-3 over shared memory and writes the run summary.
pub async fn run_experiment(config: ExperimentConfig, cancel: CancellationToken) -> Result<RunSummary> {
    config.validate()?;

    let transport = ShmTransport::open(
        config.mempool_key,
        config.mem_size,
        config.memblock_key,
        config.layout(),
    )?;
    let simulator = Ns3Process::new(config.ns3_path.clone());
    let summary_path = config.summary_path();

    let summary = Driver::new(config, transport, simulator)?
        .with_cancel(cancel)
        .run()
        .await?;

    match save_summary(&summary, &summary_path) {
        Ok(()) => info!("Summary saved to: {}", summary_path.display()),
        Err(e) => warn!("Could not save summary to {}: {}", summary_path.display(), e),
    }
    Ok(summary)
}
