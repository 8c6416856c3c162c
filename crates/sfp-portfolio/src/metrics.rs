//! Mark-to-market unrealized PnL for a single reconstructed position.

use crate::types::PositionState;

fn i128_to_i64_clamp(x: i128) -> i64 {
    if x > i64::MAX as i128 {
        i64::MAX
    } else if x < i64::MIN as i128 {
        i64::MIN
    } else {
        x as i64
    }
}

/// `Σ (mark - entry) * qty` over long lots, `Σ (entry - mark) * |qty|`
/// over short lots. Updated whenever a new tick arrives for the symbol.
pub fn unrealized_pnl_micros(pos: &PositionState, mark_micros: i64) -> i64 {
    let mut pnl: i128 = 0;
    for lot in &pos.lots {
        let entry = lot.entry_price_micros as i128;
        let mark = mark_micros as i128;
        let q = lot.qty_signed as i128;
        if q > 0 {
            pnl += (mark - entry) * q;
        } else if q < 0 {
            pnl += (entry - mark) * (-q);
        }
    }
    i128_to_i64_clamp(pnl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Lot;

    #[test]
    fn long_position_gains_when_mark_rises() {
        let pos = PositionState {
            lots: vec![Lot::long(10, 100_000_000)],
            ..Default::default()
        };
        assert_eq!(unrealized_pnl_micros(&pos, 115_000_000), 150_000_000);
    }

    #[test]
    fn short_position_gains_when_mark_falls() {
        let pos = PositionState {
            lots: vec![Lot::short(10, 100_000_000)],
            ..Default::default()
        };
        assert_eq!(unrealized_pnl_micros(&pos, 90_000_000), 100_000_000);
    }

    #[test]
    fn flat_position_has_zero_unrealized_pnl() {
        let pos = PositionState::default();
        assert_eq!(unrealized_pnl_micros(&pos, 123_000_000), 0);
    }
}
