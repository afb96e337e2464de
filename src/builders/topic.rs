use tracing::debug;

use super::{apply_base_tags, resolve_cluster_name, BuildContext, Built, EntityBuilder, MetricBlock};
use crate::entity::{Entity, EntityKind, EntityScore};
use crate::error::{Result, SynthesisError};
use crate::fields::{self, names, tags};
use crate::health::HealthInputs;
use crate::resolver::lookup_str;
use crate::sample::{RawSample, SampleKind};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct TopicBuilder;

impl EntityBuilder for TopicBuilder {
    fn build(&self, sample: &RawSample, ctx: &BuildContext<'_>) -> Result<Built> {
        let config = ctx.config;
        let topic_name = lookup_str(sample, fields::TOPIC_NAME)
            .ok_or_else(|| SynthesisError::missing_field("topic.name", SampleKind::Topic))?;
        let cluster_name = resolve_cluster_name(sample, config);
        let broker_id = lookup_str(sample, fields::BROKER_ID)
            .filter(|_| config.enable_per_topic_broker_metrics);

        let mut block = MetricBlock::new(sample, EntityKind::Topic, ctx);
        block.resolved(&fields::TOPIC_BYTES_IN, 0.0)?;
        block.resolved(&fields::TOPIC_BYTES_OUT, 0.0)?;
        block.resolved(&fields::TOPIC_MESSAGES_IN, 0.0)?;
        block.optional(&fields::TOPIC_BYTES_REJECTED)?;
        block.resolved(&fields::TOPIC_FETCH_REQUESTS, 0.0)?;
        block.resolved(&fields::TOPIC_PRODUCE_REQUESTS, 0.0)?;

        block.resolved(&fields::TOPIC_PARTITIONS, 0.0)?;
        block.optional(&fields::TOPIC_REPLICATION_FACTOR)?;
        block.optional(&fields::TOPIC_MIN_ISR)?;
        block.optional(&fields::TOPIC_RETENTION_MS)?;
        block.optional(&fields::TOPIC_RETENTION_BYTES)?;
        if let Some(disk_size) = block.optional(&fields::TOPIC_DISK_SIZE)? {
            block.derived(names::DISK_SIZE_MB, disk_size / BYTES_PER_MB)?;
        }
        let under_replicated = block.resolved(&fields::TOPIC_UNDER_REPLICATED, 0.0)?;

        let (score, status) = config.health.status(&HealthInputs {
            under_replicated_partitions: under_replicated,
            ..Default::default()
        });

        let mut parts = vec![
            config.provider.clone(),
            cluster_name.clone(),
            topic_name.clone(),
        ];
        let mut display_name = format!("{}-{}", cluster_name, topic_name);
        if let Some(id) = &broker_id {
            parts.push(format!("broker-{}", id));
            display_name.push_str(&format!("-broker-{}", id));
        }
        let identity = ctx.identity.identity(EntityKind::Topic, &parts);

        let mut entity = Entity::new(
            EntityKind::Topic,
            identity,
            display_name,
            cluster_name,
            EntityScore::Health(score),
        );
        apply_base_tags(&mut entity, Some(sample), config);
        entity.set_tag(tags::TOPIC_NAME, topic_name.as_str());
        entity.set_tag(tags::HEALTH_STATUS, status.as_str());
        if let Some(id) = &broker_id {
            entity.set_tag(tags::BROKER_ID, id.as_str());
        }

        let warnings = block.finish(&mut entity);

        if broker_id.is_some() {
            ctx.cache.record(&topic_name, &entity);
        }
        debug!("Built topic entity {} ({})", entity.display_name, entity.identity);

        Ok(Built { entity, warnings })
    }

    fn name(&self) -> &str {
        "topic"
    }

    fn kind(&self) -> SampleKind {
        SampleKind::Topic
    }
}
