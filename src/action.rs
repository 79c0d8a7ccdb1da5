// Flat bandit arm index <-> structured MAC decision.

use crate::error::ActionError;
use serde::{Deserialize, Serialize};

/// Cardinalities of the three sub-decisions, in unravel order (CW is the slowest axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    pub cw_levels: usize,
    pub rts_cts_levels: usize,
    pub ampdu_levels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedAction {
    pub cw: usize,
    pub rts_cts: usize,
    pub ampdu: usize,
}

impl DecodedAction {
    pub fn rts_cts_enabled(&self) -> bool {
        self.rts_cts != 0
    }

    pub fn ampdu_enabled(&self) -> bool {
        self.ampdu != 0
    }
}

impl ActionSpace {
    pub const fn new(cw_levels: usize, rts_cts_levels: usize, ampdu_levels: usize) -> Self {
        Self {
            cw_levels,
            rts_cts_levels,
            ampdu_levels,
        }
    }

    /// CW exponent, RTS/CTS on/off, AMPDU on/off.
    pub const fn single_agent() -> Self {
        Self::new(7, 2, 2)
    }

    /// Cheater slots only carry a CW value.
    pub const fn multi_agent() -> Self {
        Self::new(24, 1, 1)
    }

    pub fn size(&self) -> usize {
        self.cw_levels * self.rts_cts_levels * self.ampdu_levels
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.cw_levels, self.rts_cts_levels, self.ampdu_levels)
    }

    /// Row-major unravel: the AMPDU axis varies fastest.
    pub fn decode(&self, index: usize) -> Result<DecodedAction, ActionError> {
        let size = self.size();
        if index >= size {
            return Err(ActionError::OutOfRange { index, size });
        }

        let ampdu = index % self.ampdu_levels;
        let rest = index / self.ampdu_levels;
        let rts_cts = rest % self.rts_cts_levels;
        let cw = rest / self.rts_cts_levels;

        Ok(DecodedAction { cw, rts_cts, ampdu })
    }

    pub fn encode(&self, action: &DecodedAction) -> usize {
        (action.cw * self.rts_cts_levels + action.rts_cts) * self.ampdu_levels + action.ampdu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn last_axis_varies_fastest() {
        let space = ActionSpace::single_agent();
        assert_eq!(space.decode(0).unwrap(), DecodedAction { cw: 0, rts_cts: 0, ampdu: 0 });
        assert_eq!(space.decode(1).unwrap(), DecodedAction { cw: 0, rts_cts: 0, ampdu: 1 });
        assert_eq!(space.decode(2).unwrap(), DecodedAction { cw: 0, rts_cts: 1, ampdu: 0 });
        assert_eq!(space.decode(5).unwrap(), DecodedAction { cw: 1, rts_cts: 0, ampdu: 1 });
        assert_eq!(space.decode(27).unwrap(), DecodedAction { cw: 6, rts_cts: 1, ampdu: 1 });
    }

    #[test]
    fn unit_axes_collapse_to_cw() {
        let space = ActionSpace::multi_agent();
        assert_eq!(space.size(), 24);
        for i in 0..24 {
            let a = space.decode(i).unwrap();
            assert_eq!((a.cw, a.rts_cts, a.ampdu), (i, 0, 0));
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let space = ActionSpace::new(24, 1, 2);
        assert_eq!(
            space.decode(48),
            Err(ActionError::OutOfRange { index: 48, size: 48 })
        );
        assert!(space.decode(47).is_ok());
    }

    proptest! {
        #[test]
        fn encode_inverts_decode(
            c1 in 1usize..32,
            c2 in 1usize..4,
            c3 in 1usize..4,
            seed in any::<usize>(),
        ) {
            let space = ActionSpace::new(c1, c2, c3);
            let index = seed % space.size();
            let action = space.decode(index).unwrap();
            prop_assert!(action.cw < c1 && action.rts_cts < c2 && action.ampdu < c3);
            prop_assert_eq!(space.encode(&action), index);
        }
    }
}
