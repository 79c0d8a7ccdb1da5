use crate::agents::{AgentId, Backend};
use crate::warmup::{WarmupConfig, WarmupDetector};
use anyhow::Result;

/// Per-agent state carried across steps of one run.
#[derive(Debug, Clone)]
pub struct AgentSlot {
    index: usize,
    seed: u64,
    handle: Option<AgentId>,
    warmup: WarmupDetector,
}

impl AgentSlot {
    /// Seeds are `base_seed + index` so agents explore independently.
    pub fn new(index: usize, base_seed: u64, warmup: WarmupConfig) -> Self {
        Self {
            index,
            seed: base_seed.wrapping_add(index as u64),
            handle: None,
            warmup: WarmupDetector::new(warmup),
        }
    }

    /// Registers this agent with a learning backend.
    pub fn attach(&mut self, backend: &mut dyn Backend) -> Result<AgentId> {
        let handle = backend.init(self.seed)?;
        self.handle = Some(handle);
        Ok(handle)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn handle(&self) -> Option<AgentId> {
        self.handle
    }

    pub fn metric_name(&self) -> String {
        format!("cw{}", self.index)
    }

    pub fn warmup(&self) -> &WarmupDetector {
        &self.warmup
    }

    pub fn warmup_mut(&mut self) -> &mut WarmupDetector {
        &mut self.warmup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_offset_by_index() {
        let slots: Vec<AgentSlot> = (0..3)
            .map(|i| AgentSlot::new(i, 4, WarmupConfig::default()))
            .collect();
        let seeds: Vec<u64> = slots.iter().map(AgentSlot::seed).collect();
        assert_eq!(seeds, vec![4, 5, 6]);
        assert_eq!(slots[2].metric_name(), "cw2");
        assert!(slots[0].handle().is_none());
    }
}
