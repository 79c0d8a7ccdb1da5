use super::config::ExperimentConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// The external simulation the driver talks to over the transport.
#[allow(async_fn_in_trait)]
pub trait Simulator {
    async fn launch(&mut self, config: &ExperimentConfig) -> Result<()>;
    /// Waits for the simulation to exit and returns its exit code, if it had one.
    async fn wait(&mut self) -> Result<Option<i32>>;
    /// Stops the simulation if it is still running. Safe to call more than once.
    async fn shutdown(&mut self) -> Result<()>;
}

/// `ns3 run` child process of one experiment.
pub struct Ns3Process {
    ns3_path: PathBuf,
    child: Option<Child>,
}

impl Ns3Process {
    pub fn new(ns3_path: impl Into<PathBuf>) -> Self {
        Self {
            ns3_path: ns3_path.into(),
            child: None,
        }
    }

    /// `<program> --key=value ...`, the single argument handed to `ns3 run`.
    pub fn run_target(config: &ExperimentConfig) -> String {
        let mut target = config.scenario.program().to_string();
        for (key, value) in config.settings() {
            target.push_str(&format!(" --{}={}", key, value));
        }
        target
    }

    /// Tells the simulator where to find the shared memory pool.
    pub fn global_values(config: &ExperimentConfig) -> String {
        format!(
            "SharedMemoryKey={};SharedMemoryPoolSize={};",
            config.mempool_key, config.mem_size
        )
    }
}

impl Simulator for Ns3Process {
    async fn launch(&mut self, config: &ExperimentConfig) -> Result<()> {
        let target = Self::run_target(config);
        let output = || {
            if config.show_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };

        debug!("ns3 run \"{}\"", target);
        let child = Command::new(self.ns3_path.join("ns3"))
            .arg("run")
            .arg(&target)
            .current_dir(&self.ns3_path)
            .env("NS_GLOBAL_VALUE", Self::global_values(config))
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch ns-3 from {}", self.ns3_path.display()))?;

        info!(
            "Launched {} (pid {})",
            config.scenario.program(),
            child.id().map(|id| id.to_string()).unwrap_or_else(|| "?".into())
        );
        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child.wait().await?;
        self.child = None;

        if !status.success() {
            warn!("Simulator exited with {}", status);
        }
        Ok(status.code())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!("Simulator already exited with {}", status);
            return Ok(());
        }

        info!("Stopping simulator");
        child.kill().await?;
        Ok(())
    }
}
