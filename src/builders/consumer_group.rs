use tracing::debug;

use super::{apply_base_tags, resolve_cluster_name, BuildContext, Built, EntityBuilder, MetricBlock};
use crate::entity::{Entity, EntityKind, EntityScore};
use crate::error::{Result, SynthesisError};
use crate::fields::{self, names, tags};
use crate::lag::calculate_consumer_lag_metrics;
use crate::resolver::lookup_str;
use crate::sample::{RawSample, SampleKind};

pub const DEFAULT_GROUP_STATE: &str = "STABLE";

/// State flags, compared by exact equality against the resolved state
pub const STATE_FLAGS: &[(&str, &str)] = &[
    ("isStable", "STABLE"),
    ("isRebalancing", "REBALANCING"),
    ("isDead", "DEAD"),
    ("isEmpty", "EMPTY"),
];

pub struct ConsumerGroupBuilder;

impl EntityBuilder for ConsumerGroupBuilder {
    fn build(&self, sample: &RawSample, ctx: &BuildContext<'_>) -> Result<Built> {
        let config = ctx.config;
        let group_id = lookup_str(sample, fields::CONSUMER_GROUP_ID).ok_or_else(|| {
            SynthesisError::missing_field("consumerGroup", SampleKind::ConsumerGroup)
        })?;
        let cluster_name = resolve_cluster_name(sample, config);
        let topic_name = lookup_str(sample, fields::TOPIC_NAME);
        let partition = lookup_str(sample, fields::PARTITION_ID);
        let state = lookup_str(sample, fields::CONSUMER_GROUP_STATE)
            .unwrap_or_else(|| DEFAULT_GROUP_STATE.to_string());

        let lag = calculate_consumer_lag_metrics(sample, &config.lag);

        let mut block = MetricBlock::new(sample, EntityKind::ConsumerGroup, ctx);
        block.derived(fields::TOTAL_LAG.metric, lag.total_lag)?;
        block.derived(fields::MAX_LAG.metric, lag.max_lag)?;
        block.derived(fields::AVG_LAG.metric, lag.avg_lag)?;
        if let Some(partition_lag) = lag.partition_lag {
            block.derived(fields::PARTITION_LAG.metric, partition_lag)?;
        }
        if let Some(previous) = lag.previous_total_lag {
            block.derived(fields::PREVIOUS_TOTAL_LAG.metric, previous)?;
        }
        block.derived(names::LAG_STABILITY_SCORE, lag.stability_score as f64)?;
        block.optional(&fields::GROUP_MEMBERS)?;
        block.optional(&fields::GROUP_PARTITIONS)?;

        let (parts, display_name) = match &partition {
            Some(partition) => {
                let partition_key = format!("partition-{}", partition);
                let topic = topic_name.clone().unwrap_or_default();
                let display = if topic.is_empty() {
                    format!("{}-{}-{}", cluster_name, group_id, partition_key)
                } else {
                    format!("{}-{}-{}-{}", cluster_name, group_id, topic, partition_key)
                };
                (
                    vec![
                        config.provider.clone(),
                        cluster_name.clone(),
                        group_id.clone(),
                        topic,
                        partition_key,
                    ],
                    display,
                )
            }
            None => (
                vec![config.provider.clone(), cluster_name.clone(), group_id.clone()],
                format!("{}-{}", cluster_name, group_id),
            ),
        };
        let identity = ctx.identity.identity(EntityKind::ConsumerGroup, &parts);

        let mut entity = Entity::new(
            EntityKind::ConsumerGroup,
            identity,
            display_name,
            cluster_name,
            EntityScore::LagStability(lag.stability_score),
        );
        apply_base_tags(&mut entity, Some(sample), config);
        entity.set_tag(tags::CONSUMER_GROUP, group_id.as_str());
        entity.set_tag(tags::CONSUMER_GROUP_STATE, state.as_str());
        entity.set_tag(tags::LAG_TREND, lag.trend.as_str());
        if let Some(topic) = &topic_name {
            entity.set_tag(tags::TOPIC_NAME, topic.as_str());
        }
        if let Some(partition) = &partition {
            entity.set_tag(tags::PARTITION, partition.as_str());
        }
        for (flag, expected) in STATE_FLAGS {
            entity.set_flag(*flag, state == *expected);
        }

        let warnings = block.finish(&mut entity);
        debug!(
            "Built consumer group entity {} (lag {}, trend {})",
            entity.display_name, lag.total_lag, lag.trend
        );

        Ok(Built { entity, warnings })
    }

    fn name(&self) -> &str {
        "consumer_group"
    }

    fn kind(&self) -> SampleKind {
        SampleKind::ConsumerGroup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::test_support::*;
    use serde_json::json;

    fn group(value: serde_json::Value) -> RawSample {
        sample(SampleKind::ConsumerGroup, value)
    }

    #[test]
    fn test_group_id_is_required() {
        let harness = Harness::lenient();
        let err = ConsumerGroupBuilder
            .build(&group(json!({"totalLag": 5})), &harness.ctx())
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELD");
    }

    #[test]
    fn test_group_level_entity() {
        let harness = Harness::lenient();
        let s = group(json!({
            "clusterName": "c1",
            "consumerGroup": "billing",
            "consumer.totalLag": 1500,
            "consumer.maxLag": 800,
            "previousTotalLag": 1000,
        }));
        let entity = ConsumerGroupBuilder.build(&s, &harness.ctx()).unwrap().entity;

        let expected = harness
            .identity
            .identity(EntityKind::ConsumerGroup, &["aws-msk", "c1", "billing"]);
        assert_eq!(entity.identity, expected);
        assert_eq!(entity.metric("totalLag"), Some(1500.0));
        assert_eq!(entity.metric("avgLag"), Some(1500.0));
        // 100 - 30 (total) - 25 (increasing)
        assert_eq!(entity.score, EntityScore::LagStability(45));
        assert_eq!(entity.metric("lagStabilityScore"), Some(45.0));
        assert_eq!(entity.tag("lagTrend"), Some("increasing"));
        assert_eq!(entity.tag("consumerGroupState"), Some("STABLE"));
        assert_eq!(entity.flag("isStable"), Some(true));
        assert_eq!(entity.flag("isDead"), Some(false));
    }

    #[test]
    fn test_partition_level_identity() {
        let harness = Harness::lenient();
        let s = group(json!({
            "clusterName": "c1",
            "groupId": "billing",
            "topic": "invoices",
            "partition": 3,
            "partitionLag": 12,
            "state": "REBALANCING",
        }));
        let entity = ConsumerGroupBuilder.build(&s, &harness.ctx()).unwrap().entity;

        let expected = harness.identity.identity(
            EntityKind::ConsumerGroup,
            &["aws-msk", "c1", "billing", "invoices", "partition-3"],
        );
        assert_eq!(entity.identity, expected);
        assert_eq!(entity.display_name, "c1-billing-invoices-partition-3");
        assert_eq!(entity.metric("partitionLag"), Some(12.0));
        assert_eq!(entity.metric("totalLag"), Some(12.0));
        assert_eq!(entity.tag("partition"), Some("3"));
        assert_eq!(entity.flag("isRebalancing"), Some(true));
        assert_eq!(entity.flag("isStable"), Some(false));
    }

    #[test]
    fn test_state_flags_are_case_sensitive() {
        let harness = Harness::lenient();
        let s = group(json!({"consumerGroup": "billing", "consumerGroupState": "Stable"}));
        let entity = ConsumerGroupBuilder.build(&s, &harness.ctx()).unwrap().entity;
        assert_eq!(entity.flag("isStable"), Some(false));
    }

    #[test]
    fn test_negative_lag_kept_with_warning() {
        let harness = Harness::lenient();
        let s = group(json!({"consumerGroup": "billing", "totalLag": -5}));
        let built = ConsumerGroupBuilder.build(&s, &harness.ctx()).unwrap();
        assert_eq!(built.entity.metric("totalLag"), Some(-5.0));
        assert!(!built.warnings.is_empty());
    }
}
