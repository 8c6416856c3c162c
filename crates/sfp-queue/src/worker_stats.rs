//! Per-worker statistics, kept in an in-process map and exposed via the
//! daemon's status endpoint.

use dashmap::DashMap;

#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub claimed: u64,
    pub processed: u64,
    pub failed: u64,
    total_processing_ms: u64,
}

impl WorkerStats {
    pub fn avg_processing_ms(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.total_processing_ms as f64 / self.processed as f64
        }
    }
}

#[derive(Default)]
pub struct WorkerStatsRegistry {
    stats: DashMap<String, WorkerStats>,
}

impl WorkerStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_claim(&self, worker_id: &str) {
        self.stats.entry(worker_id.to_string()).or_default().claimed += 1;
    }

    pub fn record_processed(&self, worker_id: &str, elapsed_ms: u64) {
        let mut entry = self.stats.entry(worker_id.to_string()).or_default();
        entry.processed += 1;
        entry.total_processing_ms += elapsed_ms;
    }

    pub fn record_failed(&self, worker_id: &str) {
        self.stats.entry(worker_id.to_string()).or_default().failed += 1;
    }

    pub fn snapshot(&self, worker_id: &str) -> WorkerStats {
        self.stats.get(worker_id).map(|s| s.clone()).unwrap_or_default()
    }

    pub fn all(&self) -> Vec<(String, WorkerStats)> {
        self.stats.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_processing_ms_is_zero_with_no_samples() {
        let stats = WorkerStats::default();
        assert_eq!(stats.avg_processing_ms(), 0.0);
    }

    #[test]
    fn records_accumulate_per_worker() {
        let reg = WorkerStatsRegistry::new();
        reg.record_claim("w1");
        reg.record_processed("w1", 50);
        reg.record_processed("w1", 150);
        reg.record_failed("w1");

        let snap = reg.snapshot("w1");
        assert_eq!(snap.claimed, 1);
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.avg_processing_ms(), 100.0);
    }

    #[test]
    fn unknown_worker_has_default_stats() {
        let reg = WorkerStatsRegistry::new();
        let snap = reg.snapshot("ghost");
        assert_eq!(snap.claimed, 0);
    }
}
