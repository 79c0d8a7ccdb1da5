use crate::action::ActionSpace;
use crate::agents::{AgentParams, FIXED_POLICY, PolicyRegistry};
use crate::error::ConfigError;
use crate::reward::{LATENCY_THRESHOLD, RewardPolicy, RewardWeights};
use crate::transport::{RecordLayout, ShmTransport};
use crate::warmup::WarmupConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Key of the record channel inside the memory pool.
pub const MEMBLOCK_KEY: u32 = 2333;
pub const MEMPOOL_KEY: i32 = 2333;

/// Ceiling (Mb/s) of the throughput denominator for saturated scenarios.
const MAX_DATA_RATE: f64 = 115.0;

/// ns-3 program to run, with the fields only that program understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scenario", rename_all = "snake_case")]
pub enum Scenario {
    /// `scenario_mgr`: one agent controls every station.
    Centralized {
        data_rate: u32,
        max_queue_size: u32,
        agent_number: u32,
    },
    /// `scenario_mgr_multi_agent`: one agent per cheating station.
    MultiAgent {
        data_rate: u32,
        max_queue_size: u32,
        cheater_number: u32,
    },
    /// `adhoc`: constant-interval traffic in an ad hoc network.
    Adhoc {
        inter_packet_interval: f64,
        mcs: u32,
        thr_path: String,
    },
}

impl Scenario {
    pub fn program(&self) -> &'static str {
        match self {
            Scenario::Centralized { .. } => "scenario_mgr",
            Scenario::MultiAgent { .. } => "scenario_mgr_multi_agent",
            Scenario::Adhoc { .. } => "adhoc",
        }
    }

    pub fn is_multi_agent(&self) -> bool {
        matches!(self, Scenario::MultiAgent { .. })
    }

    pub fn layout(&self) -> RecordLayout {
        if self.is_multi_agent() {
            RecordLayout::multi_agent()
        } else {
            RecordLayout::single_agent()
        }
    }

    fn settings(&self) -> Vec<(String, SettingValue)> {
        match self {
            Scenario::Centralized {
                data_rate,
                max_queue_size,
                agent_number,
            } => vec![
                setting("agentNumber", *agent_number),
                setting("dataRate", *data_rate),
                setting("maxQueueSize", *max_queue_size),
            ],
            Scenario::MultiAgent {
                data_rate,
                max_queue_size,
                cheater_number,
            } => vec![
                setting("cheaterNumber", *cheater_number),
                setting("dataRate", *data_rate),
                setting("maxQueueSize", *max_queue_size),
            ],
            Scenario::Adhoc {
                inter_packet_interval,
                mcs,
                thr_path,
            } => vec![
                setting("interPacketInterval", *inter_packet_interval),
                setting("mcs", *mcs),
                setting("thrPath", thr_path.as_str()),
            ],
        }
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    /// Scenario with its default fields, looked up by ns-3 program name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scenario_mgr" => Ok(Scenario::Centralized {
                data_rate: 100,
                max_queue_size: 100,
                agent_number: 1,
            }),
            "scenario_mgr_multi_agent" => Ok(Scenario::MultiAgent {
                data_rate: 100,
                max_queue_size: 100,
                cheater_number: 10,
            }),
            "adhoc" => Ok(Scenario::Adhoc {
                inter_packet_interval: 0.5,
                mcs: 11,
                thr_path: "thr.txt".to_string(),
            }),
            other => Err(ConfigError::UnknownScenario(other.to_string())),
        }
    }
}

/// A single `--key=value` argument for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::Int(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::Int(v as i64)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v as i64)
    }
}

impl From<u64> for SettingValue {
    fn from(v: u64) -> Self {
        SettingValue::Int(v as i64)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Str(v.to_string())
    }
}

fn setting(key: &str, value: impl Into<SettingValue>) -> (String, SettingValue) {
    (key.to_string(), value.into())
}

/// Settings every scenario passes to ns-3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSettings {
    pub ampdu: bool,
    pub channel_width: u32,
    pub csv_log_path: String,
    pub csv_path: String,
    /// Fixed CW for the native algorithm, -1 leaves it adaptive.
    pub cw: i32,
    pub distance: f64,
    pub flowmon_path: String,
    pub fuzz_time: f64,
    pub interaction_time: f64,
    pub n_wifi: u32,
    pub packet_size: u32,
    pub rts_cts: bool,
    pub simulation_time: f64,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            ampdu: true,
            channel_width: 20,
            csv_log_path: "log.csv".to_string(),
            csv_path: "results.csv".to_string(),
            cw: -1,
            distance: 10.0,
            flowmon_path: "flowmon.xml".to_string(),
            fuzz_time: 5.0,
            interaction_time: 0.5,
            n_wifi: 10,
            packet_size: 1500,
            rts_cts: false,
            simulation_time: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub scenario: Scenario,
    pub wifi: WifiSettings,
    /// Bandit algorithm name, or `wifi` for the simulator's own CW algorithm.
    pub agent_name: String,
    pub agent_params: AgentParams,
    pub reward: RewardPolicy,
    pub latency_threshold: f64,
    pub warmup: WarmupConfig,
    pub seed: u64,
    pub mempool_key: i32,
    pub memblock_key: u32,
    pub mem_size: usize,
    pub action_space: ActionSpace,
    pub ns3_path: PathBuf,
    pub show_output: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::for_scenario(Scenario::MultiAgent {
            data_rate: 100,
            max_queue_size: 100,
            cheater_number: 10,
        })
    }
}

impl ExperimentConfig {
    /// Defaults tuned for `scenario`: pool size, action space, reward and Thompson priors
    /// differ between single and multi-agent programs.
    pub fn for_scenario(scenario: Scenario) -> Self {
        let multi = scenario.is_multi_agent();
        let (n_wifi, simulation_time) = if multi { (10, 40.0) } else { (5, 50.0) };
        Self {
            name: scenario.program().to_string(),
            wifi: WifiSettings {
                n_wifi,
                simulation_time,
                ..WifiSettings::default()
            },
            agent_name: "UCB".to_string(),
            agent_params: if multi {
                AgentParams::multi_agent()
            } else {
                AgentParams::single_agent()
            },
            reward: if multi {
                RewardPolicy::CollisionOnly
            } else {
                RewardPolicy::Weighted(RewardWeights::default())
            },
            latency_threshold: LATENCY_THRESHOLD,
            warmup: WarmupConfig::default(),
            seed: 4,
            mempool_key: MEMPOOL_KEY,
            memblock_key: MEMBLOCK_KEY,
            mem_size: if multi { 512 } else { 128 },
            action_space: if multi {
                ActionSpace::multi_agent()
            } else {
                ActionSpace::single_agent()
            },
            ns3_path: PathBuf::from("."),
            show_output: true,
            scenario,
        }
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_warmup(mut self, warmup: WarmupConfig) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_reward(mut self, reward: RewardPolicy) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_csv_paths(mut self, csv_path: impl Into<String>, csv_log_path: impl Into<String>) -> Self {
        self.wifi.csv_path = csv_path.into();
        self.wifi.csv_log_path = csv_log_path.into();
        self
    }

    /// True when the simulator's own CW algorithm runs without a learning backend.
    pub fn is_fixed_policy(&self) -> bool {
        self.agent_name.eq_ignore_ascii_case(FIXED_POLICY)
    }

    /// Rejects anything that would fail once resources exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_fixed_policy() && !PolicyRegistry::global().contains(&self.agent_name) {
            return Err(ConfigError::UnknownAgent(self.agent_name.clone()));
        }

        let layout = self.layout();
        let count = self.agent_count();
        if count == 0 || count > layout.capacity {
            return Err(ConfigError::AgentCount {
                scenario: self.scenario.program().to_string(),
                count,
                capacity: layout.capacity,
            });
        }

        if self.action_space.is_empty() {
            return Err(ConfigError::EmptyActionSpace(self.action_space.as_tuple()));
        }

        let data_rate = self.data_rate();
        if !(data_rate.is_finite() && data_rate > 0.0) {
            return Err(ConfigError::DataRate(data_rate));
        }

        let needed = ShmTransport::required_size(&layout);
        if self.mem_size < needed {
            return Err(ConfigError::PoolTooSmall {
                pool: self.mem_size,
                needed,
            });
        }

        Ok(())
    }

    /// Throughput (Mb/s) that maps to a reward term of 1.
    pub fn data_rate(&self) -> f64 {
        let n_wifi = self.wifi.n_wifi as f64;
        match &self.scenario {
            Scenario::Centralized { data_rate, .. } | Scenario::MultiAgent { data_rate, .. } => {
                MAX_DATA_RATE.min(*data_rate as f64 * n_wifi)
            }
            Scenario::Adhoc {
                inter_packet_interval,
                ..
            } => self.wifi.packet_size as f64 * n_wifi / inter_packet_interval / 1e6,
        }
    }

    /// Number of agent slots driven each step.
    pub fn agent_count(&self) -> usize {
        match &self.scenario {
            Scenario::MultiAgent { cheater_number, .. } => *cheater_number as usize,
            _ => 1,
        }
    }

    pub fn layout(&self) -> RecordLayout {
        self.scenario.layout()
    }

    /// Command line arguments for the ns-3 program, sorted by key.
    pub fn settings(&self) -> Vec<(String, SettingValue)> {
        let w = &self.wifi;
        let mut settings = vec![
            setting("agentName", self.agent_name.as_str()),
            setting("ampdu", w.ampdu),
            setting("channelWidth", w.channel_width),
            setting("csvLogPath", w.csv_log_path.as_str()),
            setting("csvPath", w.csv_path.as_str()),
            setting("cw", w.cw),
            setting("distance", w.distance),
            setting("flowmonPath", w.flowmon_path.as_str()),
            setting("fuzzTime", w.fuzz_time),
            setting("interactionTime", w.interaction_time),
            setting("nWifi", w.n_wifi),
            setting("packetSize", w.packet_size),
            setting("rtsCts", w.rts_cts),
            setting("simulationTime", w.simulation_time),
            setting("RngRun", self.seed),
        ];
        settings.extend(self.scenario.settings());
        settings.sort_by(|a, b| a.0.cmp(&b.0));
        settings
    }

    /// Path of the backend metric log, next to the simulator's own CSV.
    pub fn metric_log_path(&self) -> PathBuf {
        let csv = PathBuf::from(&self.wifi.csv_path);
        let file = csv
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.wifi.csv_path.clone());
        csv.with_file_name(format!("rlib_{}", file))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.metric_log_path().with_extension("json")
    }
}
