pub mod record;
pub mod schema;
pub mod shm;

pub use record::{Act, AgentObservation, Env, RecordLayout, MAX_CHEATERS};
pub use schema::{Field, FieldKind, Schema};
pub use shm::ShmTransport;

use anyhow::Result;

/// One exchange with the simulator. Env is read-only for the driver, Act is write-only.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSnapshot {
    pub step: u64,
    pub env: Env,
    pub act: Act,
}

impl StepSnapshot {
    pub fn new(step: u64, env: Env, capacity: usize) -> Self {
        Self {
            step,
            env,
            act: Act::new(capacity),
        }
    }
}

/// Request/response channel to the running simulator.
///
/// A snapshot handed out by [`Transport::acquire`] must go back through
/// [`Transport::release`] before the next one is acquired; releasing is what lets the
/// simulator continue. `Ok(None)` from `acquire` means the simulator has nothing more
/// to say.
#[allow(async_fn_in_trait)]
pub trait Transport {
    fn is_finished(&self) -> bool;
    async fn acquire(&mut self) -> Result<Option<StepSnapshot>>;
    fn release(&mut self, snapshot: StepSnapshot) -> Result<()>;
    /// Frees the underlying resource. Called exactly once by the driver.
    fn close(&mut self) -> Result<()>;
}
