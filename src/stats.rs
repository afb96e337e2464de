//! Cumulative transformer statistics across batches

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::report::{EntityCounts, TransformationReport};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationStats {
    pub batches_processed: u64,
    pub samples_processed: u64,
    pub samples_failed: u64,
    /// Cluster rollups that failed; not counted against samples
    pub aggregation_failures: u64,
    pub entities_created: u64,
    pub clusters_created: u64,
    pub validation_warnings: u64,
    pub retries: u64,
    /// Moving average over batches
    pub processing_time_ms: f64,
    pub last_processed: Option<DateTime<Utc>>,
}

impl TransformationStats {
    pub fn error_rate(&self) -> f64 {
        if self.samples_processed == 0 {
            0.0
        } else {
            self.samples_failed as f64 / self.samples_processed as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: RwLock<TransformationStats>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&self, report: &TransformationReport) {
        let EntityCounts { clusters, .. } = report.entities_created;
        let mut stats = self.inner.write();
        stats.processing_time_ms = if stats.batches_processed == 0 {
            report.duration_ms
        } else {
            (stats.processing_time_ms + report.duration_ms) / 2.0
        };
        stats.batches_processed += 1;
        stats.samples_processed += report.samples_processed as u64;
        let failed = report.samples_processed.saturating_sub(report.success_count);
        stats.samples_failed += failed as u64;
        stats.aggregation_failures += report.error_count.saturating_sub(failed) as u64;
        stats.entities_created += report.entities_created.total() as u64;
        stats.clusters_created += clusters as u64;
        stats.validation_warnings += report.validation_warnings.len() as u64;
        stats.retries += report.retries as u64;
        stats.last_processed = Some(Utc::now());
    }

    pub fn snapshot(&self) -> TransformationStats {
        self.inner.read().clone()
    }

    pub fn reset(&self) {
        *self.inner.write() = TransformationStats::default();
    }

    /// Health summary, banded by cumulative error rate
    pub fn health(&self) -> serde_json::Value {
        let stats = self.snapshot();
        let error_rate = stats.error_rate();

        let status = if error_rate < 0.05 {
            "healthy"
        } else if error_rate < 0.20 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "total_processed": stats.samples_processed,
            "total_failed": stats.samples_failed,
            "aggregation_failures": stats.aggregation_failures,
            "error_rate": error_rate,
            "avg_processing_time_ms": stats.processing_time_ms,
            "batches_processed": stats.batches_processed,
            "stats": stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(samples: usize, errors: usize, duration_ms: f64) -> TransformationReport {
        TransformationReport {
            samples_processed: samples,
            success_count: samples - errors,
            error_count: errors,
            duration_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_accumulates_across_batches() {
        let recorder = StatsRecorder::new();
        recorder.record_batch(&report(10, 1, 4.0));
        recorder.record_batch(&report(10, 0, 8.0));

        let stats = recorder.snapshot();
        assert_eq!(stats.batches_processed, 2);
        assert_eq!(stats.samples_processed, 20);
        assert_eq!(stats.samples_failed, 1);
        assert_eq!(stats.processing_time_ms, 6.0);
        assert!(stats.last_processed.is_some());
    }

    #[test]
    fn test_health_bands() {
        let recorder = StatsRecorder::new();
        assert_eq!(recorder.health()["status"], "healthy");

        recorder.record_batch(&report(10, 1, 1.0));
        assert_eq!(recorder.health()["status"], "degraded");

        recorder.record_batch(&report(10, 5, 1.0));
        assert_eq!(recorder.health()["status"], "unhealthy");

        recorder.reset();
        assert_eq!(recorder.snapshot(), TransformationStats::default());
    }

    #[test]
    fn test_cluster_errors_do_not_count_as_failed_samples() {
        let recorder = StatsRecorder::new();
        // every sample failed and one cluster rollup failed on top
        recorder.record_batch(&TransformationReport {
            samples_processed: 2,
            success_count: 0,
            error_count: 3,
            ..Default::default()
        });
        // all samples built, one cluster rollup failed
        recorder.record_batch(&TransformationReport {
            samples_processed: 2,
            success_count: 2,
            error_count: 1,
            ..Default::default()
        });

        let stats = recorder.snapshot();
        assert_eq!(stats.samples_failed, 2);
        assert_eq!(stats.aggregation_failures, 2);
        assert_eq!(stats.error_rate(), 0.5);
        assert!(stats.error_rate() <= 1.0);
    }
}
