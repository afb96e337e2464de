//! Kafka Entity Synthesis
//!
//! Turns loosely-typed broker, topic and consumer-group monitoring samples
//! into a normalized entity hierarchy with stable identities, validated
//! metrics, health and lag-stability scores, and per-cluster rollups.
//!
//! # Flow
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ RawSample[] │───▶│ Classifier   │───▶│ EntityBuilder│───▶│ Cluster     │
//! │             │    │ (kind field) │    │ broker/topic/│    │ Aggregator  │
//! │             │    │              │    │ group        │    │             │
//! └─────────────┘    └──────────────┘    └──────────────┘    └─────────────┘
//!                                               │
//!                                               ▼
//!                                        ┌──────────────┐
//!                                        │ TopicBroker  │
//!                                        │ Cache        │
//!                                        └──────────────┘
//! ```
//!
//! # Modules
//!
//! - `sample`: raw samples and kind classification
//! - `fields` / `resolver`: field catalog and tolerant value lookup
//! - `validator`: per-metric range checks
//! - `identity`: deterministic `account|domain|type|hash` identities
//! - `builders`: one builder per sample kind
//! - `lag` / `health`: scoring policies
//! - `aggregator`: cluster rollups
//! - `pipeline`: batch orchestration, reporting and statistics
//!
//! # Example
//!
//! ```
//! use kafka_entity_synthesis::{RawSample, SynthesisConfig, TransformationPipeline};
//! use serde_json::json;
//!
//! let pipeline = TransformationPipeline::new(SynthesisConfig::default()).unwrap();
//! let sample = RawSample::from_value(json!({
//!     "kind": "broker",
//!     "clusterName": "orders-prod",
//!     "broker.id": 1,
//!     "broker.cpuPercent": 42.0,
//! }))
//! .unwrap();
//!
//! let result = pipeline.transform(&[sample]);
//! assert_eq!(result.entities.len(), 2);
//! assert!(result.errors.is_empty());
//! ```

pub mod aggregator;
pub mod builders;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod health;
pub mod identity;
pub mod lag;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod sample;
pub mod stats;
pub mod validator;

// Re-export the main types for convenience
pub use aggregator::ClusterAggregator;
pub use builders::{BuildContext, Built, EntityBuilder};
pub use cache::TopicBrokerCache;
pub use config::SynthesisConfig;
pub use entity::{Entity, EntityKind, EntityScore};
pub use error::{Result, SynthesisError};
pub use health::{HealthInputs, HealthPolicy, HealthStatus};
pub use identity::{EntityIdentity, IdentityGenerator};
pub use lag::{calculate_consumer_lag_metrics, ConsumerLagMetrics, LagPolicy, LagTrend};
pub use pipeline::{TransformationPipeline, TransformationResult};
pub use report::{
    EntityCounts, ErrorStage, StageTimings, TransformationErrorEntry, TransformationMetadata,
    TransformationReport,
};
pub use sample::{RawSample, SampleKind};
pub use stats::TransformationStats;
pub use validator::{MetricCheck, MetricValidator, Threshold};

/// Crate version, reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
