//! Sample-to-entity builders
//!
//! One builder per sample kind. A builder turns exactly one raw sample into
//! exactly one entity, or fails that sample alone.

use std::collections::BTreeMap;
use tracing::warn;

use crate::cache::TopicBrokerCache;
use crate::config::SynthesisConfig;
use crate::entity::{infer_environment, sanitize_name, Entity, EntityKind};
use crate::error::{Result, SynthesisError};
use crate::fields::{self, tags, FieldSpec};
use crate::identity::IdentityGenerator;
use crate::resolver::{lookup, lookup_str};
use crate::sample::{RawSample, SampleKind};
use crate::validator::MetricValidator;

pub mod broker;
pub mod consumer_group;
pub mod topic;

pub use broker::BrokerBuilder;
pub use consumer_group::ConsumerGroupBuilder;
pub use topic::TopicBuilder;

pub const MESSAGE_QUEUE_TYPE: &str = "Kafka";

/// Shared, read-mostly state handed to every builder call
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a SynthesisConfig,
    pub identity: &'a IdentityGenerator,
    /// `None` when validation is switched off
    pub validator: Option<&'a MetricValidator>,
    pub cache: &'a TopicBrokerCache,
}

/// A built entity plus the validation warnings raised on the way
#[derive(Debug, Clone)]
pub struct Built {
    pub entity: Entity,
    pub warnings: Vec<String>,
}

pub trait EntityBuilder: Send + Sync {
    fn build(&self, sample: &RawSample, ctx: &BuildContext<'_>) -> Result<Built>;
    fn name(&self) -> &str;
    fn kind(&self) -> SampleKind;
}

/// Cluster name for a sample, falling back to the configured default
pub fn resolve_cluster_name(sample: &RawSample, config: &SynthesisConfig) -> String {
    let raw = lookup_str(sample, fields::CLUSTER_NAME)
        .unwrap_or_else(|| config.default_cluster_name.clone());
    sanitize_name(&raw)
}

/// Tags every entity carries regardless of kind
pub fn apply_base_tags(entity: &mut Entity, sample: Option<&RawSample>, config: &SynthesisConfig) {
    let cluster = entity.cluster_name.clone();
    entity.set_tag(tags::CLUSTER_NAME, cluster.as_str());
    entity.set_tag(tags::PROVIDER, config.provider.as_str());
    entity.set_tag(tags::ACCOUNT_ID, config.account_id.as_str());
    entity.set_tag(tags::ENVIRONMENT, infer_environment(&cluster));
    entity.set_tag(tags::MESSAGE_QUEUE_TYPE, MESSAGE_QUEUE_TYPE);
    if let Some(region) = sample.and_then(|s| lookup_str(s, fields::AWS_REGION)) {
        entity.set_tag(tags::AWS_REGION, region);
    }
}

/// Collects metrics for one entity, validating as it goes
///
/// Only values that were present in the sample or derived from present
/// values are validated; defaults filled in for missing fields are not.
pub(crate) struct MetricBlock<'s, 'c> {
    sample: &'s RawSample,
    kind: EntityKind,
    validator: Option<&'c MetricValidator>,
    metrics: BTreeMap<String, f64>,
    warnings: Vec<String>,
}

impl<'s, 'c> MetricBlock<'s, 'c> {
    pub(crate) fn new(sample: &'s RawSample, kind: EntityKind, ctx: &BuildContext<'c>) -> Self {
        MetricBlock {
            sample,
            kind,
            validator: ctx.validator,
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Catalogued metric, always emitted (missing becomes `default`)
    pub(crate) fn resolved(&mut self, spec: &FieldSpec, default: f64) -> Result<f64> {
        match lookup(self.sample, spec.candidates) {
            Some(value) => self.derived(spec.metric, value),
            None => {
                self.metrics.insert(spec.metric.to_string(), default);
                Ok(default)
            }
        }
    }

    /// Catalogued metric, emitted only when the sample has it
    pub(crate) fn optional(&mut self, spec: &FieldSpec) -> Result<Option<f64>> {
        match lookup(self.sample, spec.candidates) {
            Some(value) => self.derived(spec.metric, value).map(Some),
            None => Ok(None),
        }
    }

    /// Like `optional`, with the raw value passed through `map` first
    pub(crate) fn optional_map(&mut self, spec: &FieldSpec, map: fn(f64) -> f64) -> Result<Option<f64>> {
        match lookup(self.sample, spec.candidates) {
            Some(value) => self.derived(spec.metric, map(value)).map(Some),
            None => Ok(None),
        }
    }

    /// Emit a computed value under `name`
    pub(crate) fn derived(&mut self, name: &str, value: f64) -> Result<f64> {
        self.check(name, value)?;
        self.metrics.insert(name.to_string(), value);
        Ok(value)
    }

    fn check(&mut self, name: &str, value: f64) -> Result<()> {
        let validator = match self.validator {
            Some(validator) => validator,
            None => return Ok(()),
        };

        let check = validator.validate(name, self.kind, value);
        if check.valid {
            return Ok(());
        }

        let reason = check
            .reason
            .unwrap_or_else(|| format!("{} failed validation", name));
        if validator.is_strict() {
            return Err(SynthesisError::validation(reason));
        }

        warn!("Keeping invalid {} metric on {}: {}", name, self.kind, reason);
        self.warnings.push(reason);
        Ok(())
    }

    pub(crate) fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub(crate) fn finish(self, entity: &mut Entity) -> Vec<String> {
        entity.metrics.extend(self.metrics);
        self.warnings
    }
}
