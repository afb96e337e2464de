use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{apply_base_tags, resolve_cluster_name, BuildContext, Built, EntityBuilder, MetricBlock};
use crate::entity::{Entity, EntityKind, EntityScore};
use crate::error::{Result, SynthesisError};
use crate::fields::{self, tags};
use crate::health::HealthInputs;
use crate::resolver::{lookup, lookup_str};
use crate::sample::{RawSample, SampleKind};

/// Broker id used in lenient mode when none can be found
pub const UNKNOWN_BROKER_ID: &str = "0";

static BROKER_ID_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)brokerid=([^,;|&:/\s]+)").expect("valid broker id marker regex")
});

static BROKER_NAME_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)broker-(\d+)").expect("valid broker-N regex"),
        Regex::new(r"(?i)broker(\d+)").expect("valid brokerN regex"),
    ]
});

static BROKER_HOST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)broker-(\d+)\.").expect("valid broker host regex"));

static JMX_BROKER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"broker-id=(\d+)").expect("valid JMX broker-id regex"));

/// Find a broker id on a sample
///
/// Checks the id fields first, then a `brokerid=` marker inside a composite
/// entity key, then `broker-N` / `brokerN` entity names, then a
/// `kafka-broker-N.` host name, and finally a JMX ObjectName key carrying
/// `broker-id=N`.
pub fn extract_broker_id(sample: &RawSample) -> Option<String> {
    if let Some(id) = lookup_str(sample, fields::BROKER_ID) {
        return Some(id);
    }

    if let Some(key) = lookup_str(sample, fields::ENTITY_KEY) {
        if let Some(caps) = BROKER_ID_MARKER.captures(&key) {
            return Some(caps[1].to_string());
        }
        let from_name = BROKER_NAME_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(&key).map(|caps| caps[1].to_string()));
        if from_name.is_some() {
            return from_name;
        }
    }

    if let Some(host) = lookup_str(sample, fields::BROKER_HOST) {
        if let Some(caps) = BROKER_HOST_PATTERN.captures(&host) {
            return Some(caps[1].to_string());
        }
    }

    sample
        .fields()
        .keys()
        .find_map(|key| JMX_BROKER_ID.captures(key).map(|caps| caps[1].to_string()))
}

/// Idle gauges sometimes arrive as a 0..1 fraction
fn normalize_idle_percent(value: f64) -> f64 {
    if value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

pub struct BrokerBuilder;

impl EntityBuilder for BrokerBuilder {
    fn build(&self, sample: &RawSample, ctx: &BuildContext<'_>) -> Result<Built> {
        let config = ctx.config;
        let cluster_name = resolve_cluster_name(sample, config);
        let mut block = MetricBlock::new(sample, EntityKind::Broker, ctx);

        let broker_id = match extract_broker_id(sample) {
            Some(id) => id,
            None if config.strict_mode => {
                return Err(SynthesisError::missing_field("broker.id", SampleKind::Broker));
            }
            None => {
                block.warn(format!(
                    "Broker sample in cluster {} has no broker id, using {}",
                    cluster_name, UNKNOWN_BROKER_ID
                ));
                UNKNOWN_BROKER_ID.to_string()
            }
        };

        block.resolved(&fields::BROKER_BYTES_IN, 0.0)?;
        block.resolved(&fields::BROKER_BYTES_OUT, 0.0)?;
        block.resolved(&fields::BROKER_MESSAGES_IN, 0.0)?;
        block.resolved(&fields::BROKER_MESSAGES_OUT, 0.0)?;
        block.optional(&fields::BROKER_BYTES_REJECTED)?;

        let fetch = block.optional(&fields::BROKER_FETCH_REQUESTS)?;
        let produce = block.optional(&fields::BROKER_PRODUCE_REQUESTS)?;
        if block.optional(&fields::BROKER_REQUESTS)?.is_none() {
            let total = fetch.unwrap_or(0.0) + produce.unwrap_or(0.0);
            block.derived(fields::BROKER_REQUESTS.metric, total)?;
        }

        let request_idle = block.optional_map(&fields::REQUEST_HANDLER_IDLE, normalize_idle_percent)?;
        let network_idle = block.optional_map(&fields::NETWORK_PROCESSOR_IDLE, normalize_idle_percent)?;

        let io_wait = block.optional(&fields::IO_WAIT_PERCENT)?;
        let cpu = match lookup(sample, fields::CPU_PERCENT.candidates) {
            Some(cpu) => cpu,
            None => io_wait.map_or(0.0, |wait| (100.0 - wait).max(0.0)),
        };
        block.derived(fields::CPU_PERCENT.metric, cpu)?;
        let memory = block.optional(&fields::MEMORY_PERCENT)?;
        block.optional(&fields::DISK_PERCENT)?;

        block.resolved(&fields::BROKER_PARTITIONS, 0.0)?;
        block.resolved(&fields::BROKER_LEADERS, 0.0)?;
        let under_replicated = block.resolved(&fields::BROKER_UNDER_REPLICATED, 0.0)?;
        let offline = block.resolved(&fields::BROKER_OFFLINE_PARTITIONS, 0.0)?;
        block.optional(&fields::ACTIVE_CONTROLLERS)?;
        block.optional(&fields::UNDER_MIN_ISR)?;

        block.optional(&fields::PRODUCE_THROTTLE)?;
        block.optional(&fields::FETCH_THROTTLE)?;
        block.optional(&fields::FETCH_TOTAL_TIME)?;
        block.optional(&fields::PRODUCE_TOTAL_TIME)?;

        let (score, status) = config.health.status(&HealthInputs {
            offline_partitions: offline,
            under_replicated_partitions: under_replicated,
            peak_cpu_percent: Some(cpu),
            peak_memory_percent: memory,
            network_processor_idle_percent: network_idle,
            request_handler_idle_percent: request_idle,
            ..Default::default()
        });

        let broker_key = format!("broker-{}", broker_id);
        let identity = ctx.identity.identity(
            EntityKind::Broker,
            &[config.provider.as_str(), cluster_name.as_str(), broker_key.as_str()],
        );

        let mut entity = Entity::new(
            EntityKind::Broker,
            identity,
            format!("{}-{}", cluster_name, broker_key),
            cluster_name,
            EntityScore::Health(score),
        );
        apply_base_tags(&mut entity, Some(sample), config);
        entity.set_tag(tags::BROKER_ID, broker_id.as_str());
        entity.set_tag(tags::HEALTH_STATUS, status.as_str());

        let warnings = block.finish(&mut entity);
        debug!("Built broker entity {} ({})", entity.display_name, entity.identity);

        Ok(Built { entity, warnings })
    }

    fn name(&self) -> &str {
        "broker"
    }

    fn kind(&self) -> SampleKind {
        SampleKind::Broker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::*;
    use serde_json::json;

    fn broker(value: serde_json::Value) -> RawSample {
        sample(SampleKind::Broker, value)
    }

    #[test]
    fn test_broker_id_sources() {
        assert_eq!(extract_broker_id(&broker(json!({"broker.id": 3}))), Some("3".into()));
        assert_eq!(
            extract_broker_id(&broker(json!({"provider.brokerId": "7"}))),
            Some("7".into())
        );
        assert_eq!(
            extract_broker_id(&broker(json!({"entityKey": "cluster=c1,BrokerId=12;rack=a"}))),
            Some("12".into())
        );
        assert_eq!(
            extract_broker_id(&broker(json!({"entityName": "c1:broker-5"}))),
            Some("5".into())
        );
        assert_eq!(
            extract_broker_id(&broker(json!({"entityName": "Broker9"}))),
            Some("9".into())
        );
        assert_eq!(extract_broker_id(&broker(json!({"entityName": "c1"}))), None);
    }

    #[test]
    fn test_broker_id_from_host_and_jmx_key() {
        assert_eq!(
            extract_broker_id(&broker(json!({"host": "kafka-broker-3.example.com"}))),
            Some("3".into())
        );
        assert_eq!(
            extract_broker_id(&broker(json!({
                "kafka.server:type=BrokerTopicMetrics,broker-id=7": 12.5
            }))),
            Some("7".into())
        );
        // entity key still wins over the host name
        assert_eq!(
            extract_broker_id(&broker(json!({
                "entityName": "c1:broker-5",
                "host": "kafka-broker-3.example.com",
            }))),
            Some("5".into())
        );
        // an entity key without an id does not hide the host
        assert_eq!(
            extract_broker_id(&broker(json!({
                "entityName": "c1",
                "host": "kafka-broker-4.example.com",
            }))),
            Some("4".into())
        );
        assert_eq!(extract_broker_id(&broker(json!({"host": "kafka.example.com"}))), None);
    }

    #[test]
    fn test_host_and_jmx_brokers_keep_distinct_identities() {
        let harness = Harness::strict();
        let from_host = broker(json!({"clusterName": "c1", "host": "kafka-broker-3.example.com", "cpuPercent": 10}));
        let from_jmx = broker(json!({
            "clusterName": "c1",
            "kafka.server:type=BrokerTopicMetrics,broker-id=7": 1,
            "cpuPercent": 10,
        }));

        let first = BrokerBuilder.build(&from_host, &harness.ctx()).unwrap();
        let second = BrokerBuilder.build(&from_jmx, &harness.ctx()).unwrap();
        assert_eq!(first.entity.tag("brokerId"), Some("3"));
        assert_eq!(second.entity.tag("brokerId"), Some("7"));
        assert!(first.warnings.is_empty());
        assert!(second.warnings.is_empty());
        assert_ne!(first.entity.identity, second.entity.identity);
    }

    #[test]
    fn test_builds_broker_entity() {
        let harness = Harness::lenient();
        let s = broker(json!({
            "clusterName": "orders-prod",
            "broker.id": 1,
            "broker.bytesInPerSecond": 5,
            "bytesInPerSecond": 9,
            "broker.messagesInPerSecond": 100,
            "broker.cpuPercent": 35.5,
            "broker.requestHandlerAvgIdlePercent": 0.85,
            "provider.awsRegion": "us-east-1",
        }));

        let built = BrokerBuilder.build(&s, &harness.ctx()).unwrap();
        let entity = built.entity;
        assert!(built.warnings.is_empty());
        assert_eq!(entity.kind, EntityKind::Broker);
        assert_eq!(entity.display_name, "orders-prod-broker-1");
        assert_eq!(
            entity.identity.as_str(),
            "123456789012|INFRA|KAFKA_BROKER|f61af5a89f84b780dd059eaa466cf652"
        );
        assert_eq!(entity.metric("bytesInPerSecond"), Some(5.0));
        assert_eq!(entity.metric("cpuPercent"), Some(35.5));
        assert_eq!(entity.metric("requestHandlerAvgIdlePercent"), Some(85.0));
        assert_eq!(entity.metric("requestsPerSecond"), Some(0.0));
        assert_eq!(entity.metric("memoryPercent"), None);
        assert_eq!(entity.tag("environment"), Some("production"));
        assert_eq!(entity.tag("messageQueueType"), Some("Kafka"));
        assert_eq!(entity.tag("awsRegion"), Some("us-east-1"));
        assert_eq!(entity.tag("healthStatus"), Some("excellent"));
        assert_eq!(entity.score, EntityScore::Health(100));
    }

    #[test]
    fn test_cpu_inferred_from_io_wait() {
        let harness = Harness::lenient();
        let s = broker(json!({"brokerId": "2", "ioWaitPercent": 30}));
        let entity = BrokerBuilder.build(&s, &harness.ctx()).unwrap().entity;
        assert_eq!(entity.metric("cpuPercent"), Some(70.0));

        let s = broker(json!({"brokerId": "2"}));
        let entity = BrokerBuilder.build(&s, &harness.ctx()).unwrap().entity;
        assert_eq!(entity.metric("cpuPercent"), Some(0.0));
    }

    #[test]
    fn test_request_rate_falls_back_to_fetch_plus_produce() {
        let harness = Harness::lenient();
        let s = broker(json!({
            "brokerId": 4,
            "totalFetchRequestsPerSecond": 12,
            "totalProduceRequestsPerSecond": 8,
        }));
        let entity = BrokerBuilder.build(&s, &harness.ctx()).unwrap().entity;
        assert_eq!(entity.metric("requestsPerSecond"), Some(20.0));
    }

    #[test]
    fn test_missing_id_lenient_vs_strict() {
        let s = broker(json!({"clusterName": "c1", "cpuPercent": 10}));

        let lenient = Harness::lenient();
        let built = BrokerBuilder.build(&s, &lenient.ctx()).unwrap();
        assert_eq!(built.entity.tag("brokerId"), Some("0"));
        assert_eq!(built.warnings.len(), 1);

        let strict = Harness::strict();
        let err = BrokerBuilder.build(&s, &strict.ctx()).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELD");
    }

    #[test]
    fn test_broker_health_uses_own_signals() {
        let harness = Harness::lenient();
        let s = broker(json!({
            "brokerId": 1,
            "offlinePartitionsCount": 1,
            "underReplicatedPartitions": 2,
            "cpuPercent": 95,
        }));
        let entity = BrokerBuilder.build(&s, &harness.ctx()).unwrap().entity;
        // 100 - 20 - 6 - 15
        assert_eq!(entity.score, EntityScore::Health(59));
        assert_eq!(entity.tag("healthStatus"), Some("poor"));
    }
}
