pub mod action;
pub mod agent;
pub mod agents;
pub mod error;
pub mod metrics;
pub mod reward;
pub mod simulation;
pub mod transport;
pub mod warmup;

pub use agent::AgentSlot;
pub use agents::{Backend, MabBackend, PolicyRegistry};
pub use simulation::{Driver, ExperimentConfig, Scenario};
pub use transport::{ShmTransport, Transport};

pub mod prelude {
    pub use crate::action::{ActionSpace, DecodedAction};
    pub use crate::agent::AgentSlot;
    pub use crate::agents::{AgentParams, Backend, FIXED_POLICY, MabBackend, PolicyRegistry};
    pub use crate::error::{ActionError, BackendError, ConfigError, TransportError};
    pub use crate::metrics::RunSummary;
    pub use crate::reward::{RewardPolicy, RewardWeights};
    pub use crate::simulation::{Driver, ExperimentConfig, Ns3Process, Scenario, Simulator, run_experiment};
    pub use crate::transport::{Act, Env, RecordLayout, ShmTransport, StepSnapshot, Transport};
    pub use crate::warmup::{WarmupConfig, WarmupDetector};
}
