//! Per-batch report and provenance metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKind;
use crate::error::SynthesisError;

/// Provenance stamped onto every entity of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationMetadata {
    pub batch_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub source_sample_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub clusters: usize,
    pub brokers: usize,
    pub topics: usize,
    pub consumer_groups: usize,
}

impl EntityCounts {
    pub fn record(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Cluster => self.clusters += 1,
            EntityKind::Broker => self.brokers += 1,
            EntityKind::Topic => self.topics += 1,
            EntityKind::ConsumerGroup => self.consumer_groups += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.clusters + self.brokers + self.topics + self.consumer_groups
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub classification_ms: f64,
    pub build_ms: f64,
    pub aggregation_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    Classification,
    Build,
    Aggregation,
}

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationErrorEntry {
    /// Position of the offending sample; `None` for cluster-level failures
    pub index: Option<usize>,
    pub stage: ErrorStage,
    pub code: String,
    pub message: String,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

impl TransformationErrorEntry {
    pub fn for_sample(index: usize, stage: ErrorStage, error: &SynthesisError, attempts: u32) -> Self {
        TransformationErrorEntry {
            index: Some(index),
            stage,
            code: error.error_code().to_string(),
            message: error.to_string(),
            attempts,
            cluster_name: None,
        }
    }

    pub fn for_cluster(cluster_name: &str, error: &SynthesisError) -> Self {
        TransformationErrorEntry {
            index: None,
            stage: ErrorStage::Aggregation,
            code: error.error_code().to_string(),
            message: error.to_string(),
            attempts: 1,
            cluster_name: Some(cluster_name.to_string()),
        }
    }
}

/// Batch summary returned alongside the entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationReport {
    pub samples_processed: usize,
    pub entities_created: EntityCounts,
    pub validation_warnings: Vec<String>,
    pub retries: u32,
    pub success_count: usize,
    pub error_count: usize,
    pub timings: StageTimings,
    pub duration_ms: f64,
}

impl TransformationReport {
    pub fn success_rate(&self) -> f64 {
        if self.samples_processed == 0 {
            return 1.0;
        }
        self.success_count as f64 / self.samples_processed as f64
    }
}
