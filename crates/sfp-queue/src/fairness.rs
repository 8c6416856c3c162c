//! The fairness tick: a per-worker draw counter that forces a draw from the
//! lowest non-empty priority every Mth claim, so strict priority ordering
//! can never starve the low-priority stream.

use sfp_types::queue::Priority;

pub struct FairnessTick {
    every_m: u32,
    draws: u32,
}

impl FairnessTick {
    pub fn new(every_m: u32) -> Self {
        Self {
            every_m: every_m.max(1),
            draws: 0,
        }
    }

    /// Given the streams with pending items (in priority order, highest
    /// first), decide which priority to draw from next. Advances internal
    /// state regardless of the outcome.
    pub fn next_priority(&mut self, non_empty: &[Priority]) -> Option<Priority> {
        self.draws += 1;
        if non_empty.is_empty() {
            return None;
        }

        if self.draws % self.every_m == 0 {
            // Force a draw from the lowest non-empty priority.
            return non_empty.iter().max().copied();
        }

        // Otherwise strict priority: lowest numeric value (High=1) first.
        non_empty.iter().min().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Priority::*;

    #[test]
    fn strict_priority_drawn_on_non_forced_ticks() {
        let mut tick = FairnessTick::new(8);
        for _ in 0..7 {
            assert_eq!(tick.next_priority(&[High, Normal, Low]), Some(High));
        }
    }

    #[test]
    fn eighth_draw_is_forced_to_lowest_priority() {
        let mut tick = FairnessTick::new(8);
        for _ in 0..7 {
            tick.next_priority(&[High, Normal, Low]);
        }
        assert_eq!(tick.next_priority(&[High, Normal, Low]), Some(Low));
    }

    #[test]
    fn empty_streams_yield_none() {
        let mut tick = FairnessTick::new(8);
        assert_eq!(tick.next_priority(&[]), None);
    }

    #[test]
    fn forced_draw_falls_back_to_only_non_empty_stream() {
        let mut tick = FairnessTick::new(1);
        assert_eq!(tick.next_priority(&[High]), Some(High));
    }
}
