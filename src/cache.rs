//! Per-topic-per-broker entity cache
//!
//! In per-broker mode every broker reporting a topic yields its own topic
//! entity. The cache keeps those reports grouped by `(cluster, topic)` so a
//! logical, cluster-wide view of each topic can be folded on demand. It is
//! owned by one pipeline and lives until `reset()`.

use dashmap::DashMap;

use crate::entity::{Entity, EntityKind, EntityScore};
use crate::fields::tags;
use crate::health::{HealthInputs, HealthPolicy};
use crate::identity::IdentityGenerator;

/// Throughput-style metrics that add up across brokers; the rest take the max
const SUMMED_METRICS: &[&str] = &[
    "bytesInPerSecond",
    "bytesOutPerSecond",
    "messagesInPerSecond",
    "bytesRejectedPerSecond",
    "fetchRequestsPerSecond",
    "produceRequestsPerSecond",
    "diskSize",
    "diskSizeMB",
];

pub const REPORTING_BROKERS_METRIC: &str = "reportingBrokerCount";

type TopicKey = (String, String);

#[derive(Debug)]
pub struct TopicBrokerCache {
    entries: DashMap<TopicKey, Vec<Entity>>,
    identity: IdentityGenerator,
    provider: String,
    health: HealthPolicy,
}

impl TopicBrokerCache {
    pub fn new(identity: IdentityGenerator, provider: impl Into<String>, health: HealthPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            identity,
            provider: provider.into(),
            health,
        }
    }

    /// Remember a per-broker topic entity; a repeated identity replaces the older report
    pub fn record(&self, topic_name: &str, entity: &Entity) {
        let key = (entity.cluster_name.clone(), topic_name.to_string());
        let mut reports = self.entries.entry(key).or_default();
        match reports.iter_mut().find(|e| e.identity == entity.identity) {
            Some(existing) => *existing = entity.clone(),
            None => reports.push(entity.clone()),
        }
    }

    pub fn reset(&self) {
        self.entries.clear();
    }

    /// Number of distinct `(cluster, topic)` pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-broker reports for one topic
    pub fn reports(&self, cluster_name: &str, topic_name: &str) -> Vec<Entity> {
        self.entries
            .get(&(cluster_name.to_string(), topic_name.to_string()))
            .map(|reports| reports.value().clone())
            .unwrap_or_default()
    }

    /// Sorted `(cluster, topic)` keys currently cached
    pub fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Fold the per-broker reports of one topic into a cluster-wide topic entity
    pub fn topic_view(&self, cluster_name: &str, topic_name: &str) -> Option<Entity> {
        let reports = self.reports(cluster_name, topic_name);
        let first = reports.first()?;

        let identity = self.identity.identity(
            EntityKind::Topic,
            &[self.provider.as_str(), cluster_name, topic_name],
        );

        let mut view = Entity::new(
            EntityKind::Topic,
            identity,
            format!("{}-{}", cluster_name, topic_name),
            cluster_name,
            EntityScore::Health(100),
        );

        for (name, value) in &first.tags {
            if name != tags::BROKER_ID {
                view.set_tag(name.clone(), value.clone());
            }
        }

        for report in &reports {
            for (name, value) in &report.metrics {
                let folded = match view.metrics.get(name) {
                    None => *value,
                    Some(current) if SUMMED_METRICS.contains(&name.as_str()) => current + value,
                    Some(current) => current.max(*value),
                };
                view.metrics.insert(name.clone(), folded);
            }
        }
        view.set_metric(REPORTING_BROKERS_METRIC, reports.len() as f64);

        let (score, status) = self.health.status(&HealthInputs {
            under_replicated_partitions: view.metric("underReplicatedPartitions").unwrap_or(0.0),
            ..Default::default()
        });
        view.score = EntityScore::Health(score);
        view.set_tag(tags::HEALTH_STATUS, status.as_str());

        Some(view)
    }

    /// Logical views for every cached topic, sorted by cluster then topic
    pub fn topic_views(&self) -> Vec<Entity> {
        self.keys()
            .iter()
            .filter_map(|(cluster, topic)| self.topic_view(cluster, topic))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TopicBrokerCache {
        TopicBrokerCache::new(
            IdentityGenerator::new("123456789012", "INFRA").unwrap(),
            "aws-msk",
            HealthPolicy::default(),
        )
    }

    fn report(cache: &TopicBrokerCache, broker: &str, bytes_in: f64, partitions: f64) -> Entity {
        let broker_key = format!("broker-{}", broker);
        let id = cache.identity.identity(
            EntityKind::Topic,
            &["aws-msk", "c1", "orders", broker_key.as_str()],
        );
        let mut entity = Entity::new(EntityKind::Topic, id, "c1-orders", "c1", EntityScore::Health(100));
        entity.set_tag(tags::TOPIC_NAME, "orders");
        entity.set_tag(tags::BROKER_ID, broker);
        entity.set_metric("bytesInPerSecond", bytes_in);
        entity.set_metric("partitionCount", partitions);
        entity
    }

    #[test]
    fn test_record_dedupes_by_identity() {
        let cache = cache();
        cache.record("orders", &report(&cache, "1", 10.0, 6.0));
        cache.record("orders", &report(&cache, "1", 15.0, 6.0));
        cache.record("orders", &report(&cache, "2", 20.0, 6.0));

        let reports = cache.reports("c1", "orders");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].metric("bytesInPerSecond"), Some(15.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_topic_view_sums_throughput_and_maxes_config() {
        let cache = cache();
        cache.record("orders", &report(&cache, "1", 10.0, 6.0));
        cache.record("orders", &report(&cache, "2", 20.0, 8.0));

        let view = cache.topic_view("c1", "orders").unwrap();
        assert_eq!(view.metric("bytesInPerSecond"), Some(30.0));
        assert_eq!(view.metric("partitionCount"), Some(8.0));
        assert_eq!(view.metric(REPORTING_BROKERS_METRIC), Some(2.0));
        assert_eq!(view.tag(tags::BROKER_ID), None);
        assert_eq!(view.tag(tags::TOPIC_NAME), Some("orders"));
        assert_eq!(view.score, EntityScore::Health(100));

        let expected = cache
            .identity
            .identity(EntityKind::Topic, &["aws-msk", "c1", "orders"]);
        assert_eq!(view.identity, expected);
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = cache();
        cache.record("orders", &report(&cache, "1", 10.0, 6.0));
        assert!(!cache.is_empty());
        cache.reset();
        assert!(cache.is_empty());
        assert!(cache.topic_view("c1", "orders").is_none());
        assert!(cache.topic_views().is_empty());
    }
}
