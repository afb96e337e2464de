//! Normalized entity records
//!
//! Entities are the only thing the engine hands back. Metrics, tags and
//! flags sit in ordered maps so serialized output is stable across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::identity::EntityIdentity;
use crate::report::TransformationMetadata;
use crate::sample::SampleKind;

/// Kind of entity the engine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Cluster,
    Broker,
    Topic,
    ConsumerGroup,
}

impl EntityKind {
    /// Fixed type tag embedded in every identity
    pub fn type_tag(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "KAFKA_CLUSTER",
            EntityKind::Broker => "KAFKA_BROKER",
            EntityKind::Topic => "KAFKA_TOPIC",
            EntityKind::ConsumerGroup => "KAFKA_CONSUMER_GROUP",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "cluster",
            EntityKind::Broker => "broker",
            EntityKind::Topic => "topic",
            EntityKind::ConsumerGroup => "consumerGroup",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SampleKind> for EntityKind {
    fn from(kind: SampleKind) -> Self {
        match kind {
            SampleKind::Broker => EntityKind::Broker,
            SampleKind::Topic => EntityKind::Topic,
            SampleKind::ConsumerGroup => EntityKind::ConsumerGroup,
        }
    }
}

/// Derived score carried by every entity
///
/// Clusters, brokers and topics carry a health score; consumer groups carry
/// a lag stability score. Both range over 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum EntityScore {
    Health(u8),
    LagStability(u8),
}

impl EntityScore {
    pub fn value(&self) -> u8 {
        match self {
            EntityScore::Health(v) | EntityScore::LagStability(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub kind: EntityKind,
    pub identity: EntityIdentity,
    pub display_name: String,
    pub cluster_name: String,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
    pub score: EntityScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TransformationMetadata>,
}

impl Entity {
    pub fn new(
        kind: EntityKind,
        identity: EntityIdentity,
        display_name: impl Into<String>,
        cluster_name: impl Into<String>,
        score: EntityScore,
    ) -> Self {
        Entity {
            kind,
            identity,
            display_name: sanitize_name(&display_name.into()),
            cluster_name: cluster_name.into(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            flags: BTreeMap::new(),
            score,
            metadata: None,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    pub fn set_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    pub fn set_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }
}

/// Deployment environment guessed from the cluster name
pub fn infer_environment(cluster_name: &str) -> &'static str {
    let lowered = cluster_name.to_ascii_lowercase();
    if lowered.contains("prod") {
        "production"
    } else if lowered.contains("staging") || lowered.contains("stg") {
        "staging"
    } else if lowered.contains("dev") {
        "development"
    } else if lowered.contains("test") {
        "test"
    } else {
        "production"
    }
}

/// Strip characters that break entity names downstream
///
/// Blank names become `unknown`. Separators and whitespace turn into `_`,
/// line breaks are dropped.
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    trimmed
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            ':' | '/' | '@' | '#' | ' ' | '\t' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(EntityKind::Cluster.type_tag(), "KAFKA_CLUSTER");
        assert_eq!(EntityKind::ConsumerGroup.type_tag(), "KAFKA_CONSUMER_GROUP");
        assert_eq!(EntityKind::from(SampleKind::Topic), EntityKind::Topic);
    }

    #[test]
    fn test_environment_inference() {
        assert_eq!(infer_environment("orders-PROD-1"), "production");
        assert_eq!(infer_environment("payments-stg"), "staging");
        assert_eq!(infer_environment("staging-east"), "staging");
        assert_eq!(infer_environment("dev-cluster"), "development");
        assert_eq!(infer_environment("load-test"), "test");
        assert_eq!(infer_environment("analytics"), "production");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  "), "unknown");
        assert_eq!(sanitize_name("a:b/c@d#e f\tg"), "a_b_c_d_e_f_g");
        assert_eq!(sanitize_name("line\r\nbreak"), "linebreak");
        assert_eq!(sanitize_name("orders-broker-1"), "orders-broker-1");
    }

    #[test]
    fn test_score_serializes_tagged() {
        let json = serde_json::to_value(EntityScore::LagStability(55)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "lagStability", "value": 55}));
        assert_eq!(EntityScore::Health(80).value(), 80);
    }
}
