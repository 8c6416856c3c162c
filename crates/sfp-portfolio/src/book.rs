//! Reconstructs `Position` records from the ordered FILLED-order log. A
//! `PositionBook` is pure and deterministic: replaying the same fill
//! sequence from scratch always yields the same state as applying it
//! incrementally, which is what makes a position "reconstructable from
//! the order log alone".

use std::collections::BTreeMap;

use sfp_types::position::{Position, PositionStatus};

use crate::accounting::apply_fill;
use crate::metrics::unrealized_pnl_micros;
use crate::types::{Fill, PositionState};

/// All invariant violations `PositionBook` can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    NonPositiveQty { qty: i64 },
    NegativePrice { price_micros: i64 },
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveQty { qty } => write!(f, "fill qty must be > 0, got {qty}"),
            Self::NegativePrice { price_micros } => {
                write!(f, "fill price_micros must be >= 0, got {price_micros}")
            }
        }
    }
}

impl std::error::Error for PositionError {}

#[derive(Default)]
pub struct PositionBook {
    positions: BTreeMap<(String, String), PositionState>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fill into the book, updating the `(user, symbol)`
    /// position's lots, realized PnL, and open/close timestamps.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), PositionError> {
        if fill.qty <= 0 {
            return Err(PositionError::NonPositiveQty { qty: fill.qty });
        }
        if fill.price_micros < 0 {
            return Err(PositionError::NegativePrice { price_micros: fill.price_micros });
        }

        let key = (fill.user_id.clone(), fill.symbol.clone());
        let pos = self.positions.entry(key).or_default();

        let was_flat = pos.is_flat();
        apply_fill(pos, fill.side, fill.qty, fill.price_micros);

        if was_flat {
            pos.opened_at_millis = Some(fill.ts_millis);
            pos.closed_at_millis = None;
        }
        if pos.is_flat() {
            pos.closed_at_millis = Some(fill.ts_millis);
        }

        Ok(())
    }

    /// Rebuild a book from scratch by folding an ordered fill log. Used
    /// to verify incremental application matches a from-scratch replay.
    pub fn from_fill_log(fills: &[Fill]) -> Result<Self, PositionError> {
        let mut book = Self::new();
        for fill in fills {
            book.apply_fill(fill)?;
        }
        Ok(book)
    }

    /// Project the current `(user, symbol)` state as a `Position`
    /// record. `mark_micros` supplies the latest tick for unrealized PnL;
    /// `None` when no tick has been observed yet (unrealized stays 0).
    pub fn position(&self, user_id: &str, symbol: &str, mark_micros: Option<i64>) -> Option<Position> {
        let pos = self.positions.get(&(user_id.to_string(), symbol.to_string()))?;
        let unrealized = mark_micros.map(|m| unrealized_pnl_micros(pos, m)).unwrap_or(0);

        Some(Position {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            qty_signed: pos.qty_signed(),
            avg_price_micros: pos.avg_price_micros(),
            realized_pnl_micros: pos.realized_pnl_micros,
            unrealized_pnl_micros: unrealized,
            status: if pos.is_flat() { PositionStatus::Closed } else { PositionStatus::Open },
            opened_at_millis: pos.opened_at_millis.unwrap_or(0),
            closed_at_millis: pos.closed_at_millis,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfp_types::order::Side;

    fn fill(user: &str, symbol: &str, side: Side, qty: i64, price_micros: i64, ts: i64) -> Fill {
        Fill { user_id: user.into(), symbol: symbol.into(), side, qty, price_micros, ts_millis: ts }
    }

    #[test]
    fn rejects_non_positive_qty() {
        let mut book = PositionBook::new();
        let err = book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 0, 100, 1));
        assert_eq!(err, Err(PositionError::NonPositiveQty { qty: 0 }));
    }

    #[test]
    fn position_open_after_first_fill() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 10, 100_000_000, 1000)).unwrap();
        let pos = book.position("u1", "RELIANCE", None).unwrap();
        assert_eq!(pos.qty_signed, 10);
        assert_eq!(pos.status, PositionStatus::Open);
        assert_eq!(pos.opened_at_millis, 1000);
        assert!(pos.closed_at_millis.is_none());
    }

    #[test]
    fn position_closes_when_flattened() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 10, 100_000_000, 1000)).unwrap();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Sell, 10, 110_000_000, 2000)).unwrap();
        let pos = book.position("u1", "RELIANCE", None).unwrap();
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.closed_at_millis, Some(2000));
        assert_eq!(pos.realized_pnl_micros, 100_000_000);
    }

    #[test]
    fn reopening_after_close_resets_opened_at() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 10, 100_000_000, 1000)).unwrap();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Sell, 10, 110_000_000, 2000)).unwrap();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 5, 120_000_000, 3000)).unwrap();
        let pos = book.position("u1", "RELIANCE", None).unwrap();
        assert_eq!(pos.opened_at_millis, 3000);
        assert!(pos.closed_at_millis.is_none());
    }

    #[test]
    fn users_and_symbols_are_independent() {
        let mut book = PositionBook::new();
        book.apply_fill(&fill("u1", "RELIANCE", Side::Buy, 10, 100_000_000, 1)).unwrap();
        book.apply_fill(&fill("u2", "RELIANCE", Side::Sell, 5, 100_000_000, 1)).unwrap();
        assert_eq!(book.position("u1", "RELIANCE", None).unwrap().qty_signed, 10);
        assert_eq!(book.position("u2", "RELIANCE", None).unwrap().qty_signed, -5);
    }

    #[test]
    fn from_scratch_replay_matches_incremental_application() {
        let fills = vec![
            fill("u1", "TCS", Side::Buy, 10, 100_000_000, 1),
            fill("u1", "TCS", Side::Buy, 5, 110_000_000, 2),
            fill("u1", "TCS", Side::Sell, 8, 120_000_000, 3),
        ];

        let mut incremental = PositionBook::new();
        for f in &fills {
            incremental.apply_fill(f).unwrap();
        }
        let replayed = PositionBook::from_fill_log(&fills).unwrap();

        assert_eq!(
            incremental.position("u1", "TCS", None),
            replayed.position("u1", "TCS", None)
        );
    }

    #[test]
    fn unknown_position_is_none() {
        let book = PositionBook::new();
        assert!(book.position("u1", "TCS", None).is_none());
    }
}
