#![allow(dead_code)]

use anyhow::{Result, anyhow};
use cwlearn::agents::{AgentId, Backend};
use cwlearn::simulation::{ExperimentConfig, Simulator};
use cwlearn::transport::{Act, Env, MAX_CHEATERS, StepSnapshot, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct TransportCalls {
    pub acquires: usize,
    pub releases: usize,
    pub closes: usize,
    pub released: Vec<Act>,
}

/// Hands out a fixed list of snapshots, then reports the simulator as finished.
pub struct ScriptedTransport {
    envs: VecDeque<Env>,
    capacity: usize,
    fail_on_acquire: Option<usize>,
    step: u64,
    pub calls: Arc<Mutex<TransportCalls>>,
}

impl ScriptedTransport {
    pub fn new(envs: Vec<Env>, capacity: usize) -> Self {
        Self {
            envs: envs.into(),
            capacity,
            fail_on_acquire: None,
            step: 0,
            calls: Arc::new(Mutex::new(TransportCalls::default())),
        }
    }

    /// Makes the `n`th acquire (1-based) fail.
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_acquire = Some(n);
        self
    }
}

impl Transport for ScriptedTransport {
    fn is_finished(&self) -> bool {
        self.envs.is_empty()
    }

    async fn acquire(&mut self) -> Result<Option<StepSnapshot>> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.acquires += 1;
            calls.acquires
        };
        if self.fail_on_acquire == Some(count) {
            return Err(anyhow!("scripted failure on acquire {}", count));
        }

        let Some(env) = self.envs.pop_front() else {
            return Ok(None);
        };
        let snapshot = StepSnapshot::new(self.step, env, self.capacity);
        self.step += 1;
        Ok(Some(snapshot))
    }

    fn release(&mut self, snapshot: StepSnapshot) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.releases += 1;
        calls.released.push(snapshot.act);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BackendCalls {
    pub inits: Vec<u64>,
    pub samples: Vec<(f64, AgentId)>,
    pub logs: Vec<(String, f64)>,
    pub closes: usize,
}

/// Always picks the same arm and remembers what it was asked.
pub struct CountingBackend {
    action: usize,
    failing_logs: bool,
    pub calls: Arc<Mutex<BackendCalls>>,
}

impl CountingBackend {
    pub fn new(action: usize) -> Self {
        Self {
            action,
            failing_logs: false,
            calls: Arc::new(Mutex::new(BackendCalls::default())),
        }
    }

    /// Makes every `log` call fail after recording it.
    pub fn failing_logs(mut self) -> Self {
        self.failing_logs = true;
        self
    }
}

impl Backend for CountingBackend {
    fn init(&mut self, seed: u64) -> Result<AgentId> {
        let mut calls = self.calls.lock().unwrap();
        calls.inits.push(seed);
        Ok(calls.inits.len() - 1)
    }

    fn sample(&mut self, reward: f64, agent: AgentId) -> Result<usize> {
        self.calls.lock().unwrap().samples.push((reward, agent));
        Ok(self.action)
    }

    fn log(&mut self, name: &str, value: f64, _agent: AgentId) -> Result<()> {
        self.calls.lock().unwrap().logs.push((name.to_string(), value));
        if self.failing_logs {
            return Err(anyhow!("metric sink unavailable"));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimulatorCalls {
    pub launches: usize,
    pub waits: usize,
    pub shutdowns: usize,
    pub settings: Vec<String>,
}

pub struct NoopSimulator {
    pub calls: Arc<Mutex<SimulatorCalls>>,
}

impl NoopSimulator {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(SimulatorCalls::default())),
        }
    }
}

impl Simulator for NoopSimulator {
    async fn launch(&mut self, config: &ExperimentConfig) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.launches += 1;
        calls.settings = config.settings().into_iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        Ok(())
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        self.calls.lock().unwrap().waits += 1;
        Ok(Some(0))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.calls.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}

/// Multi-agent observation where agent 0 sent 10 frames and 1 collided.
pub fn cheater_env(time: f64) -> Env {
    let mut env = Env {
        time,
        fairness: 1.0,
        latency: 0.002,
        plr: 0.0,
        throughput: vec![0.0; MAX_CHEATERS],
        tx_list: vec![0.0; MAX_CHEATERS],
        lost_list: vec![0.0; MAX_CHEATERS],
        collisions: vec![0.0; MAX_CHEATERS],
    };
    env.throughput[0] = 40.0;
    env.tx_list[0] = 10.0;
    env.collisions[0] = 1.0;
    env
}

/// Single-agent observation with the given throughput (Mb/s).
pub fn station_env(time: f64, throughput: f64) -> Env {
    Env {
        time,
        fairness: 1.0,
        latency: 0.0,
        plr: 0.0,
        throughput: vec![throughput],
        ..Env::default()
    }
}
