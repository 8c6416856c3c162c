//! Per-symbol tick ring buffer: the in-process mirror of the bounded
//! recovery stream, serving the hot matching loop without a Redis
//! round-trip on every tick.

use std::collections::VecDeque;

use dashmap::DashMap;

use sfp_types::tick::Tick;

pub struct TickRings {
    capacity: usize,
    rings: DashMap<String, VecDeque<Tick>>,
}

impl TickRings {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rings: DashMap::new(),
        }
    }

    pub fn push(&self, symbol: &str, tick: Tick) {
        let mut ring = self.rings.entry(symbol.to_string()).or_insert_with(VecDeque::new);
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(tick);
    }

    pub fn latest(&self, symbol: &str) -> Option<Tick> {
        self.rings.get(symbol).and_then(|r| r.back().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.rings.get(symbol).map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(last: i64) -> Tick {
        Tick::new(last - 1, last + 1, last, last)
    }

    #[test]
    fn latest_reflects_most_recent_push() {
        let rings = TickRings::new(4);
        rings.push("RELIANCE", tick(100));
        rings.push("RELIANCE", tick(101));
        assert_eq!(rings.latest("RELIANCE").unwrap().last_micros, 101);
    }

    #[test]
    fn ring_drops_oldest_past_capacity() {
        let rings = TickRings::new(2);
        rings.push("RELIANCE", tick(1));
        rings.push("RELIANCE", tick(2));
        rings.push("RELIANCE", tick(3));
        assert_eq!(rings.len("RELIANCE"), 2);
        assert_eq!(rings.latest("RELIANCE").unwrap().last_micros, 3);
    }

    #[test]
    fn unknown_symbol_has_no_latest() {
        let rings = TickRings::new(4);
        assert!(rings.latest("TCS").is_none());
    }

    #[test]
    fn symbols_are_independent() {
        let rings = TickRings::new(4);
        rings.push("RELIANCE", tick(1));
        rings.push("TCS", tick(2));
        assert_eq!(rings.len("RELIANCE"), 1);
        assert_eq!(rings.len("TCS"), 1);
    }
}
