use super::schema::{Field, FieldKind, Schema};
use crate::error::TransportError;
use serde::{Deserialize, Serialize};

/// Upper bound of cheater slots compiled into the multi-agent scenario.
pub const MAX_CHEATERS: usize = 10;

const MULTI_ENV_FIELDS: &[Field] = &[
    Field::scalar("fairness", FieldKind::F64),
    Field::scalar("latency", FieldKind::F64),
    Field::scalar("plr", FieldKind::F64),
    Field::scalar("time", FieldKind::F64),
    Field::array("tx_list", FieldKind::F64, MAX_CHEATERS),
    Field::array("lost_list", FieldKind::F64, MAX_CHEATERS),
    Field::array("throughput", FieldKind::F64, MAX_CHEATERS),
    Field::array("collisions", FieldKind::F64, MAX_CHEATERS),
];

const MULTI_ENV: Schema = Schema::new(MULTI_ENV_FIELDS);

const MULTI_ACT_FIELDS: &[Field] = &[
    Field::scalar("end_warmup", FieldKind::Bool),
    Field::array("cw", FieldKind::I32, MAX_CHEATERS),
];

const MULTI_ACT: Schema = Schema::new(MULTI_ACT_FIELDS);

const SINGLE_ENV_FIELDS: &[Field] = &[
    Field::scalar("fairness", FieldKind::F64),
    Field::scalar("latency", FieldKind::F64),
    Field::scalar("plr", FieldKind::F64),
    Field::scalar("throughput", FieldKind::F64),
    Field::scalar("time", FieldKind::F64),
];

const SINGLE_ENV: Schema = Schema::new(SINGLE_ENV_FIELDS);

const SINGLE_ACT_FIELDS: &[Field] = &[
    Field::scalar("end_warmup", FieldKind::Bool),
    Field::scalar("cw", FieldKind::I32),
    Field::scalar("rts_cts", FieldKind::Bool),
    Field::scalar("ampdu", FieldKind::Bool),
];

const SINGLE_ACT: Schema = Schema::new(SINGLE_ACT_FIELDS);

/// Env/Act schema pair of one simulator scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub env: Schema,
    pub act: Schema,
    pub capacity: usize,
}

impl RecordLayout {
    pub const fn multi_agent() -> Self {
        Self {
            env: MULTI_ENV,
            act: MULTI_ACT,
            capacity: MAX_CHEATERS,
        }
    }

    pub const fn single_agent() -> Self {
        Self {
            env: SINGLE_ENV,
            act: SINGLE_ACT,
            capacity: 1,
        }
    }

    pub fn env_size(&self) -> usize {
        self.env.size()
    }

    pub fn act_size(&self) -> usize {
        self.act.size()
    }

    pub fn carries_link_flags(&self) -> bool {
        self.act.has("rts_cts") && self.act.has("ampdu")
    }
}

/// Simulator-owned observation for one interaction step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Env {
    pub time: f64,
    pub fairness: f64,
    pub latency: f64,
    pub plr: f64,
    pub throughput: Vec<f64>,
    pub tx_list: Vec<f64>,
    pub lost_list: Vec<f64>,
    pub collisions: Vec<f64>,
}

/// Per-agent slice of an [`Env`]. Counters the layout does not carry read as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentObservation {
    pub throughput: f64,
    pub tx: f64,
    pub lost: f64,
    pub collisions: f64,
}

impl Env {
    pub fn decode(layout: &RecordLayout, bytes: &[u8]) -> Result<Self, TransportError> {
        let schema = &layout.env;
        let optional = |name: &'static str| -> Result<Vec<f64>, TransportError> {
            if schema.has(name) {
                schema.read_f64s(bytes, name)
            } else {
                Ok(Vec::new())
            }
        };

        Ok(Self {
            time: schema.read_f64(bytes, "time")?,
            fairness: schema.read_f64(bytes, "fairness")?,
            latency: schema.read_f64(bytes, "latency")?,
            plr: schema.read_f64(bytes, "plr")?,
            throughput: schema.read_f64s(bytes, "throughput")?,
            tx_list: optional("tx_list")?,
            lost_list: optional("lost_list")?,
            collisions: optional("collisions")?,
        })
    }

    pub fn agent(&self, index: usize) -> Result<AgentObservation, TransportError> {
        let throughput = *self.throughput.get(index).ok_or(TransportError::AgentIndex {
            index,
            capacity: self.throughput.len(),
        })?;
        let at = |values: &[f64]| values.get(index).copied().unwrap_or(0.0);

        Ok(AgentObservation {
            throughput,
            tx: at(&self.tx_list),
            lost: at(&self.lost_list),
            collisions: at(&self.collisions),
        })
    }
}

/// Driver-owned reply. A CW of -1 leaves the simulator's own setting in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub end_warmup: bool,
    pub cw: Vec<i32>,
    pub rts_cts: Vec<bool>,
    pub ampdu: Vec<bool>,
}

impl Act {
    pub const UNSET_CW: i32 = -1;

    pub fn new(capacity: usize) -> Self {
        Self {
            end_warmup: false,
            cw: vec![Self::UNSET_CW; capacity],
            rts_cts: vec![false; capacity],
            ampdu: vec![false; capacity],
        }
    }

    pub fn set_cw(&mut self, index: usize, cw: usize) -> Result<(), TransportError> {
        let capacity = self.cw.len();
        let slot = self
            .cw
            .get_mut(index)
            .ok_or(TransportError::AgentIndex { index, capacity })?;
        *slot = cw as i32;
        Ok(())
    }

    pub fn set_link_flags(&mut self, index: usize, rts_cts: bool, ampdu: bool) -> Result<(), TransportError> {
        let capacity = self.rts_cts.len();
        if index >= capacity {
            return Err(TransportError::AgentIndex { index, capacity });
        }
        self.rts_cts[index] = rts_cts;
        self.ampdu[index] = ampdu;
        Ok(())
    }

    pub fn encode(&self, layout: &RecordLayout, bytes: &mut [u8]) -> Result<(), TransportError> {
        let schema = &layout.act;
        schema.write_bool(bytes, "end_warmup", 0, self.end_warmup)?;
        for (i, cw) in self.cw.iter().enumerate().take(layout.capacity) {
            schema.write_i32(bytes, "cw", i, *cw)?;
        }
        if layout.carries_link_flags() {
            for i in 0..layout.capacity.min(self.rts_cts.len()) {
                schema.write_bool(bytes, "rts_cts", i, self.rts_cts[i])?;
                schema.write_bool(bytes, "ampdu", i, self.ampdu[i])?;
            }
        }
        Ok(())
    }
}
