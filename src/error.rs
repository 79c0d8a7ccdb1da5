use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid agent type: {0}")]
    UnknownAgent(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Agent count {count} outside 1..={capacity} for scenario {scenario}")]
    AgentCount {
        scenario: String,
        count: usize,
        capacity: usize,
    },

    #[error("Action space cardinalities must be non-zero, got {0:?}")]
    EmptyActionSpace((usize, usize, usize)),

    #[error("Memory pool of {pool} bytes cannot hold {needed} bytes of records")]
    PoolTooSmall { pool: usize, needed: usize },

    #[error("Throughput denominator must be positive and finite, got {0} Mb/s")]
    DataRate(f64),

    #[error("Invalid reward policy: {0}")]
    UnknownRewardPolicy(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Action index {index} outside action space of size {size}")]
    OutOfRange { index: usize, size: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Unknown agent handle {0}")]
    UnknownAgent(usize),

    #[error("Non-finite reward {reward} for agent {agent}")]
    InvalidReward { agent: usize, reward: f64 },

    #[error("No policy registered under {0}")]
    UnknownPolicy(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Shared memory {op} failed for key {key}: {source}")]
    SharedMemory {
        op: &'static str,
        key: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("Record field {0} not present in schema")]
    UnknownField(&'static str),

    #[error("Agent index {index} outside record capacity {capacity}")]
    AgentIndex { index: usize, capacity: usize },

    #[error("Transport already closed")]
    Closed,
}
