//! Cluster rollups
//!
//! Reduces the leaf entities of one cluster into a single cluster entity.
//! Runs only after every leaf of the batch has been built.

use std::collections::BTreeMap;
use tracing::debug;

use crate::builders::apply_base_tags;
use crate::config::SynthesisConfig;
use crate::entity::{Entity, EntityKind, EntityScore};
use crate::error::{Result, SynthesisError};
use crate::fields::{names, tags};
use crate::health::HealthInputs;
use crate::identity::IdentityGenerator;

/// Broker metrics summed into the cluster under the same name
const SUMMED_BROKER_METRICS: &[&str] = &[
    "bytesInPerSecond",
    "bytesOutPerSecond",
    "messagesInPerSecond",
    "messagesOutPerSecond",
    "requestsPerSecond",
    "bytesRejectedPerSecond",
    "underReplicatedPartitions",
    "offlinePartitionsCount",
    "activeControllerCount",
    "underMinIsrPartitions",
];

/// Broker gauges rolled up as average and maximum over reporting brokers
const RESOURCE_GAUGES: &[(&str, &str, &str)] = &[
    ("cpuPercent", names::CPU_PERCENT_AVERAGE, names::CPU_PERCENT_MAXIMUM),
    ("memoryPercent", names::MEMORY_PERCENT_AVERAGE, names::MEMORY_PERCENT_MAXIMUM),
    ("diskPercent", names::DISK_PERCENT_AVERAGE, names::DISK_PERCENT_MAXIMUM),
];

#[derive(Debug, Default, Clone, Copy)]
struct Gauge {
    sum: f64,
    max: f64,
    count: usize,
}

impl Gauge {
    fn observe(&mut self, value: f64) {
        self.max = if self.count == 0 { value } else { self.max.max(value) };
        self.sum += value;
        self.count += 1;
    }

    fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    fn maximum(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.max)
        }
    }
}

fn gauge<'e>(entities: impl Iterator<Item = &'e Entity>, metric: &str) -> Gauge {
    let mut gauge = Gauge::default();
    for value in entities.filter_map(|e| e.metric(metric)) {
        gauge.observe(value);
    }
    gauge
}

pub struct ClusterAggregator<'a> {
    config: &'a SynthesisConfig,
    identity: &'a IdentityGenerator,
}

impl<'a> ClusterAggregator<'a> {
    pub fn new(config: &'a SynthesisConfig, identity: &'a IdentityGenerator) -> Self {
        Self { config, identity }
    }

    /// Roll one cluster's leaves into a cluster entity
    ///
    /// Returns `Ok(None)` when there are no brokers. Entities from another
    /// cluster, or of the wrong kind, are an error rather than silently
    /// folded in.
    pub fn aggregate(
        &self,
        brokers: &[Entity],
        topics: &[Entity],
        groups: &[Entity],
    ) -> Result<Option<Entity>> {
        let cluster_name = match brokers.first() {
            Some(first) => first.cluster_name.clone(),
            None => return Ok(None),
        };

        check_members(&cluster_name, brokers, EntityKind::Broker)?;
        check_members(&cluster_name, topics, EntityKind::Topic)?;
        check_members(&cluster_name, groups, EntityKind::ConsumerGroup)?;

        // Repeated reports of one broker: the last one wins
        let mut distinct: BTreeMap<&str, &Entity> = BTreeMap::new();
        for broker in brokers {
            distinct.insert(broker.identity.as_str(), broker);
        }
        let brokers: Vec<&Entity> = distinct.into_values().collect();

        let mut metrics: BTreeMap<String, f64> = BTreeMap::new();

        for name in SUMMED_BROKER_METRICS {
            let mut reported = false;
            let mut total = 0.0;
            for value in brokers.iter().filter_map(|b| b.metric(name)) {
                reported = true;
                total += value;
            }
            if reported {
                metrics.insert(name.to_string(), total);
            }
        }

        for (source, average_name, maximum_name) in RESOURCE_GAUGES {
            let g = gauge(brokers.iter().copied(), source);
            if let (Some(average), Some(maximum)) = (g.average(), g.maximum()) {
                metrics.insert(average_name.to_string(), average);
                metrics.insert(maximum_name.to_string(), maximum);
            }
        }

        let online = brokers
            .iter()
            .filter(|b| {
                b.metric("cpuPercent").map_or(false, |v| v > 0.0)
                    || b.metric("memoryPercent").map_or(false, |v| v > 0.0)
            })
            .count();
        let offline_brokers = brokers.len() - online;
        metrics.insert(names::BROKER_COUNT.to_string(), brokers.len() as f64);
        metrics.insert(names::BROKERS_ONLINE.to_string(), online as f64);
        metrics.insert(names::BROKERS_OFFLINE.to_string(), offline_brokers as f64);

        self.roll_up_topics(topics, &mut metrics);
        let total_lag = self.roll_up_groups(groups, &mut metrics);

        if let Some((name, value)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SynthesisError::aggregation(format!(
                "cluster {} metric {} reduced to a non-finite value ({})",
                cluster_name, name, value
            )));
        }

        let (score, status) = self.config.health.status(&HealthInputs {
            offline_partitions: metrics.get("offlinePartitionsCount").copied().unwrap_or(0.0),
            under_replicated_partitions: metrics
                .get("underReplicatedPartitions")
                .copied()
                .unwrap_or(0.0),
            broker_count: brokers.len(),
            offline_brokers,
            peak_cpu_percent: metrics.get(names::CPU_PERCENT_MAXIMUM).copied(),
            peak_memory_percent: metrics.get(names::MEMORY_PERCENT_MAXIMUM).copied(),
            network_processor_idle_percent: gauge(
                brokers.iter().copied(),
                "networkProcessorAvgIdlePercent",
            )
            .average(),
            request_handler_idle_percent: gauge(
                brokers.iter().copied(),
                "requestHandlerAvgIdlePercent",
            )
            .average(),
            total_consumer_lag: total_lag,
        });
        metrics.insert(names::HEALTH_SCORE.to_string(), score as f64);

        let identity = self.identity.identity(
            EntityKind::Cluster,
            &[self.config.provider.as_str(), cluster_name.as_str()],
        );
        let mut cluster = Entity::new(
            EntityKind::Cluster,
            identity,
            cluster_name.as_str(),
            cluster_name.as_str(),
            EntityScore::Health(score),
        );
        cluster.metrics = metrics;
        apply_base_tags(&mut cluster, None, self.config);
        cluster.set_tag(tags::HEALTH_STATUS, status.as_str());
        if let Some(region) = brokers.iter().find_map(|b| b.tag(tags::AWS_REGION)) {
            cluster.set_tag(tags::AWS_REGION, region);
        }

        debug!(
            "Aggregated cluster {} from {} brokers, {} topics, {} consumer groups (health {})",
            cluster_name,
            brokers.len(),
            topics.len(),
            groups.len(),
            score
        );

        Ok(Some(cluster))
    }

    /// Topics count once by name; per-broker reports contribute their maximum
    fn roll_up_topics(&self, topics: &[Entity], metrics: &mut BTreeMap<String, f64>) {
        let mut by_name: BTreeMap<&str, (f64, Option<f64>)> = BTreeMap::new();
        for topic in topics {
            let name = topic.tag(tags::TOPIC_NAME).unwrap_or(&topic.display_name);
            let partitions = topic.metric("partitionCount").unwrap_or(0.0);
            let replication = topic.metric("replicationFactor");
            let entry = by_name.entry(name).or_insert((partitions, replication));
            entry.0 = entry.0.max(partitions);
            entry.1 = match (entry.1, replication) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let topic_count = by_name.len();
        let total_partitions: f64 = by_name.values().map(|(p, _)| p).sum();
        metrics.insert(names::TOPIC_COUNT.to_string(), topic_count as f64);
        metrics.insert(names::TOTAL_PARTITIONS.to_string(), total_partitions);
        metrics.insert(
            names::AVERAGE_PARTITIONS_PER_TOPIC.to_string(),
            if topic_count > 0 {
                total_partitions / topic_count as f64
            } else {
                0.0
            },
        );

        let factors: Vec<f64> = by_name.values().filter_map(|(_, rf)| *rf).collect();
        if !factors.is_empty() {
            metrics.insert(
                names::AVERAGE_REPLICATION_FACTOR.to_string(),
                factors.iter().sum::<f64>() / factors.len() as f64,
            );
        }
    }

    /// Returns the cluster-wide total lag
    fn roll_up_groups(&self, groups: &[Entity], metrics: &mut BTreeMap<String, f64>) -> f64 {
        let mut distinct: Vec<&str> = groups
            .iter()
            .map(|g| g.tag(tags::CONSUMER_GROUP).unwrap_or(&g.display_name))
            .collect();
        distinct.sort_unstable();
        distinct.dedup();

        let total_lag: f64 = groups.iter().filter_map(|g| g.metric("totalLag")).sum();
        let max_lag = groups
            .iter()
            .filter_map(|g| g.metric("maxLag"))
            .fold(0.0, f64::max);
        let average_lag = if distinct.is_empty() {
            0.0
        } else {
            total_lag / distinct.len() as f64
        };

        metrics.insert(names::CONSUMER_GROUP_COUNT.to_string(), distinct.len() as f64);
        metrics.insert(names::TOTAL_CONSUMER_LAG.to_string(), total_lag);
        metrics.insert(names::MAX_CONSUMER_LAG.to_string(), max_lag);
        metrics.insert(names::AVERAGE_CONSUMER_LAG.to_string(), average_lag);

        total_lag
    }
}

fn check_members(cluster_name: &str, entities: &[Entity], kind: EntityKind) -> Result<()> {
    for entity in entities {
        if entity.kind != kind {
            return Err(SynthesisError::aggregation(format!(
                "expected {} entities, found {} {}",
                kind, entity.kind, entity.display_name
            )));
        }
        if entity.cluster_name != cluster_name {
            return Err(SynthesisError::aggregation(format!(
                "{} {} belongs to cluster {}, not {}",
                entity.kind, entity.display_name, entity.cluster_name, cluster_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> IdentityGenerator {
        IdentityGenerator::new("123456789012", "INFRA").unwrap()
    }

    fn leaf(kind: EntityKind, cluster: &str, key: &str, metrics: &[(&str, f64)]) -> Entity {
        let id = identity().identity(kind, &["aws-msk", cluster, key]);
        let mut entity = Entity::new(kind, id, key, cluster, EntityScore::Health(100));
        for (name, value) in metrics {
            entity.set_metric(*name, *value);
        }
        entity
    }

    fn broker(key: &str, metrics: &[(&str, f64)]) -> Entity {
        leaf(EntityKind::Broker, "c1", key, metrics)
    }

    #[test]
    fn test_no_brokers_no_cluster() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let topics = vec![leaf(EntityKind::Topic, "c1", "orders", &[])];
        let result = ClusterAggregator::new(&config, &ids).aggregate(&[], &topics, &[]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_sums_skip_missing_children() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![
            broker("broker-1", &[("bytesInPerSecond", 100.0), ("cpuPercent", 10.0)]),
            broker("broker-2", &[("bytesInPerSecond", 200.0), ("cpuPercent", 30.0)]),
            broker("broker-3", &[("cpuPercent", 0.0)]),
        ];
        let cluster = ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[], &[])
            .unwrap()
            .unwrap();

        assert_eq!(cluster.metric("bytesInPerSecond"), Some(300.0));
        assert_eq!(cluster.metric("cpuPercentAverage"), Some(40.0 / 3.0));
        assert_eq!(cluster.metric("cpuPercentMaximum"), Some(30.0));
        assert_eq!(cluster.metric("memoryPercentAverage"), None);
        assert_eq!(cluster.metric("brokerCount"), Some(3.0));
        assert_eq!(cluster.metric("brokersOnline"), Some(2.0));
        assert_eq!(cluster.metric("brokersOffline"), Some(1.0));
        // one of three brokers offline costs 10 points
        assert_eq!(cluster.score, EntityScore::Health(90));
        assert_eq!(cluster.tag("healthStatus"), Some("excellent"));
    }

    #[test]
    fn test_duplicate_broker_reports_count_once() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![
            broker("broker-1", &[("bytesInPerSecond", 100.0), ("cpuPercent", 10.0)]),
            broker("broker-1", &[("bytesInPerSecond", 150.0), ("cpuPercent", 10.0)]),
        ];
        let cluster = ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[], &[])
            .unwrap()
            .unwrap();
        assert_eq!(cluster.metric("brokerCount"), Some(1.0));
        assert_eq!(cluster.metric("bytesInPerSecond"), Some(150.0));
    }

    #[test]
    fn test_topic_and_group_rollup() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![broker("broker-1", &[("cpuPercent", 10.0)])];

        let mut orders_b1 = leaf(
            EntityKind::Topic,
            "c1",
            "orders-b1",
            &[("partitionCount", 6.0), ("replicationFactor", 3.0)],
        );
        orders_b1.set_tag(tags::TOPIC_NAME, "orders");
        let mut orders_b2 = leaf(EntityKind::Topic, "c1", "orders-b2", &[("partitionCount", 8.0)]);
        orders_b2.set_tag(tags::TOPIC_NAME, "orders");
        let mut audit = leaf(
            EntityKind::Topic,
            "c1",
            "audit",
            &[("partitionCount", 2.0), ("replicationFactor", 2.0)],
        );
        audit.set_tag(tags::TOPIC_NAME, "audit");

        let mut g1 = leaf(
            EntityKind::ConsumerGroup,
            "c1",
            "billing-p0",
            &[("totalLag", 100.0), ("maxLag", 100.0)],
        );
        g1.set_tag(tags::CONSUMER_GROUP, "billing");
        let mut g2 = leaf(
            EntityKind::ConsumerGroup,
            "c1",
            "billing-p1",
            &[("totalLag", 300.0), ("maxLag", 300.0)],
        );
        g2.set_tag(tags::CONSUMER_GROUP, "billing");
        let mut g3 = leaf(
            EntityKind::ConsumerGroup,
            "c1",
            "search",
            &[("totalLag", 200.0), ("maxLag", 150.0)],
        );
        g3.set_tag(tags::CONSUMER_GROUP, "search");

        let cluster = ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[orders_b1, orders_b2, audit], &[g1, g2, g3])
            .unwrap()
            .unwrap();

        assert_eq!(cluster.metric("topicCount"), Some(2.0));
        assert_eq!(cluster.metric("totalPartitions"), Some(10.0));
        assert_eq!(cluster.metric("averagePartitionsPerTopic"), Some(5.0));
        assert_eq!(cluster.metric("averageReplicationFactor"), Some(2.5));
        assert_eq!(cluster.metric("consumerGroupCount"), Some(2.0));
        assert_eq!(cluster.metric("totalConsumerLag"), Some(600.0));
        assert_eq!(cluster.metric("maxConsumerLag"), Some(300.0));
        assert_eq!(cluster.metric("averageConsumerLag"), Some(300.0));
    }

    #[test]
    fn test_mixed_clusters_rejected() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![
            broker("broker-1", &[]),
            leaf(EntityKind::Broker, "c2", "broker-2", &[]),
        ];
        let err = ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[], &[])
            .unwrap_err();
        assert_eq!(err.error_code(), "AGGREGATION_ERROR");
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![leaf(EntityKind::Topic, "c1", "orders", &[])];
        assert!(ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[], &[])
            .is_err());
    }

    #[test]
    fn test_non_finite_reduction_rejected() {
        let config = SynthesisConfig::default();
        let ids = identity();
        let brokers = vec![
            broker("broker-1", &[("bytesInPerSecond", f64::MAX)]),
            broker("broker-2", &[("bytesInPerSecond", f64::MAX)]),
        ];
        assert!(ClusterAggregator::new(&config, &ids)
            .aggregate(&brokers, &[], &[])
            .is_err());
    }
}
