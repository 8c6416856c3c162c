//! Monotonic match deadline, checked independent of tick arrival.

use tokio::time::{Duration, Instant};

pub struct MatchDeadline {
    deadline: Instant,
}

impl MatchDeadline {
    pub fn starting_now(timeout_ms: i64) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_millis(timeout_ms.max(0) as u64),
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn not_expired_before_deadline() {
        let d = MatchDeadline::starting_now(60_000);
        tokio::time::advance(Duration::from_millis(59_999)).await;
        assert!(!d.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_after_deadline() {
        let d = MatchDeadline::starting_now(60_000);
        tokio::time::advance(Duration::from_millis(60_001)).await;
        assert!(d.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let d = MatchDeadline::starting_now(10_000);
        tokio::time::advance(Duration::from_millis(4_000)).await;
        assert_eq!(d.remaining(), Duration::from_millis(6_000));
    }
}
