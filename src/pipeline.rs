use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(feature = "parallel-processing")]
use rayon::prelude::*;

use crate::aggregator::ClusterAggregator;
use crate::builders::{
    BrokerBuilder, BuildContext, Built, ConsumerGroupBuilder, EntityBuilder, TopicBuilder,
};
use crate::cache::TopicBrokerCache;
use crate::config::SynthesisConfig;
use crate::entity::{Entity, EntityKind};
use crate::error::{Result, SynthesisError};
use crate::identity::IdentityGenerator;
use crate::report::{
    EntityCounts, ErrorStage, StageTimings, TransformationErrorEntry, TransformationMetadata,
    TransformationReport,
};
use crate::sample::{RawSample, SampleKind};
use crate::stats::{StatsRecorder, TransformationStats};
use crate::validator::MetricValidator;

/// Everything one `transform` call produces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    pub entities: Vec<Entity>,
    pub report: TransformationReport,
    pub errors: Vec<TransformationErrorEntry>,
}

impl TransformationResult {
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}

struct SampleOutcome {
    index: usize,
    result: std::result::Result<Built, TransformationErrorEntry>,
    attempts: u32,
}

pub struct TransformationPipeline {
    config: SynthesisConfig,
    identity: IdentityGenerator,
    validator: MetricValidator,
    cache: TopicBrokerCache,
    builders: HashMap<SampleKind, Box<dyn EntityBuilder>>,
    stats: StatsRecorder,
}

impl TransformationPipeline {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing transformation pipeline (strict: {}, validation: {}, per-broker topics: {})",
            config.strict_mode, config.enable_validation, config.enable_per_topic_broker_metrics
        );

        let identity = IdentityGenerator::new(&config.account_id, &config.domain)?;
        let validator = MetricValidator::new(config.strict_mode);
        let cache = TopicBrokerCache::new(identity.clone(), &config.provider, config.health.clone());

        let mut pipeline = Self {
            config,
            identity,
            validator,
            cache,
            builders: HashMap::new(),
            stats: StatsRecorder::new(),
        };

        pipeline.register_builder(Box::new(BrokerBuilder));
        pipeline.register_builder(Box::new(TopicBuilder));
        pipeline.register_builder(Box::new(ConsumerGroupBuilder));

        Ok(pipeline)
    }

    /// Install a builder, replacing any existing one for the same kind
    pub fn register_builder(&mut self, builder: Box<dyn EntityBuilder>) {
        info!("Registered {} entity builder", builder.name());
        self.builders.insert(builder.kind(), builder);
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn validator_mut(&mut self) -> &mut MetricValidator {
        &mut self.validator
    }

    pub fn cache(&self) -> &TopicBrokerCache {
        &self.cache
    }

    /// Drop cached per-broker topic reports; call between logical runs
    pub fn reset_cache(&self) {
        debug!("Clearing topic cache ({} topics)", self.cache.len());
        self.cache.reset();
    }

    /// Cluster-wide views of every topic seen per broker since the last reset
    pub fn topic_views(&self) -> Vec<Entity> {
        self.cache.topic_views()
    }

    pub fn stats(&self) -> TransformationStats {
        self.stats.snapshot()
    }

    pub fn health(&self) -> serde_json::Value {
        self.stats.health()
    }

    pub fn transform(&self, samples: &[RawSample]) -> TransformationResult {
        let started = Instant::now();
        let batch_id = Uuid::new_v4();
        let mut timings = StageTimings::default();
        let mut errors = Vec::new();

        info!("Transforming batch {} with {} samples", batch_id, samples.len());

        // Classification
        let stage = Instant::now();
        let mut classified = Vec::with_capacity(samples.len());
        for (index, sample) in samples.iter().enumerate() {
            match sample.classify() {
                Ok(kind) => classified.push((index, kind, sample)),
                Err(e) => {
                    warn!("Sample {} could not be classified: {}", index, e);
                    errors.push(TransformationErrorEntry::for_sample(
                        index,
                        ErrorStage::Classification,
                        &e,
                        1,
                    ));
                }
            }
        }
        timings.classification_ms = elapsed_ms(stage);

        // Leaf construction
        let stage = Instant::now();
        let ctx = BuildContext {
            config: &self.config,
            identity: &self.identity,
            validator: if self.config.enable_validation {
                Some(&self.validator)
            } else {
                None
            },
            cache: &self.cache,
        };

        #[cfg(feature = "parallel-processing")]
        let outcomes: Vec<SampleOutcome> = classified
            .par_iter()
            .map(|(index, kind, sample)| self.build_sample(*index, *kind, sample, &ctx))
            .collect();

        #[cfg(not(feature = "parallel-processing"))]
        let outcomes: Vec<SampleOutcome> = classified
            .iter()
            .map(|(index, kind, sample)| self.build_sample(*index, *kind, sample, &ctx))
            .collect();

        let mut entities = Vec::with_capacity(outcomes.len());
        let mut warnings = Vec::new();
        let mut retries = 0;
        for outcome in outcomes {
            retries += outcome.attempts.saturating_sub(1);
            match outcome.result {
                Ok(built) => {
                    warnings.extend(
                        built
                            .warnings
                            .into_iter()
                            .map(|w| format!("sample {}: {}", outcome.index, w)),
                    );
                    entities.push(built.entity);
                }
                Err(entry) => errors.push(entry),
            }
        }
        let success_count = entities.len();
        timings.build_ms = elapsed_ms(stage);

        // Cluster rollups, once per distinct cluster in order of appearance
        let stage = Instant::now();
        let aggregator = ClusterAggregator::new(&self.config, &self.identity);
        let mut clusters = Vec::new();
        for (cluster_name, members) in group_by_cluster(&entities) {
            let (brokers, topics, groups) = members;
            match aggregator.aggregate(&brokers, &topics, &groups) {
                Ok(Some(cluster)) => clusters.push(cluster),
                Ok(None) => debug!("Cluster {} has no brokers in this batch", cluster_name),
                Err(e) => {
                    error!("Aggregation failed for cluster {}: {}", cluster_name, e);
                    errors.push(TransformationErrorEntry::for_cluster(&cluster_name, &e));
                }
            }
        }
        entities.extend(clusters);
        timings.aggregation_ms = elapsed_ms(stage);

        errors.sort_by_key(|e| (e.index.is_none(), e.index));

        let duration_ms = elapsed_ms(started);
        let metadata = TransformationMetadata {
            batch_id,
            timestamp: Utc::now(),
            duration_ms,
            source_sample_count: samples.len(),
            error_count: errors.len(),
        };

        let mut counts = EntityCounts::default();
        for entity in &mut entities {
            counts.record(entity.kind);
            entity.metadata = Some(metadata.clone());
        }

        let report = TransformationReport {
            samples_processed: samples.len(),
            entities_created: counts,
            validation_warnings: warnings,
            retries,
            success_count,
            error_count: errors.len(),
            timings,
            duration_ms,
        };
        self.stats.record_batch(&report);

        info!(
            "Batch {} done in {:.2}ms: {} entities, {} errors, {} warnings",
            batch_id,
            duration_ms,
            counts.total(),
            report.error_count,
            report.validation_warnings.len()
        );

        TransformationResult {
            entities,
            report,
            errors,
        }
    }

    fn build_sample(
        &self,
        index: usize,
        kind: SampleKind,
        sample: &RawSample,
        ctx: &BuildContext<'_>,
    ) -> SampleOutcome {
        let builder = match self.builders.get(&kind) {
            Some(builder) => builder,
            None => {
                let e = SynthesisError::transformation(format!("no builder registered for {}", kind));
                return SampleOutcome {
                    index,
                    result: Err(TransformationErrorEntry::for_sample(index, ErrorStage::Build, &e, 1)),
                    attempts: 1,
                };
            }
        };

        let max_attempts = self.config.max_attempts();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match builder.build(sample, ctx) {
                Ok(built) => {
                    return SampleOutcome {
                        index,
                        result: Ok(built),
                        attempts,
                    }
                }
                Err(e) if attempts < max_attempts => {
                    debug!("Retrying sample {} with {} builder: {}", index, builder.name(), e);
                }
                Err(e) => {
                    warn!(
                        "Sample {} failed in {} builder after {} attempt(s): {}",
                        index,
                        builder.name(),
                        attempts,
                        e
                    );
                    return SampleOutcome {
                        index,
                        result: Err(TransformationErrorEntry::for_sample(
                            index,
                            ErrorStage::Build,
                            &e,
                            attempts,
                        )),
                        attempts,
                    };
                }
            }
        }
    }
}

type ClusterMembers = (Vec<Entity>, Vec<Entity>, Vec<Entity>);

fn group_by_cluster(entities: &[Entity]) -> Vec<(String, ClusterMembers)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, ClusterMembers> = HashMap::new();

    for entity in entities {
        let members = groups.entry(entity.cluster_name.clone()).or_insert_with(|| {
            order.push(entity.cluster_name.clone());
            Default::default()
        });
        match entity.kind {
            EntityKind::Broker => members.0.push(entity.clone()),
            EntityKind::Topic => members.1.push(entity.clone()),
            EntityKind::ConsumerGroup => members.2.push(entity.clone()),
            EntityKind::Cluster => {}
        }
    }

    order
        .into_iter()
        .filter_map(|name| groups.remove(&name).map(|members| (name, members)))
        .collect()
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
