//! Metric sanity checks
//!
//! The validator reports, it never mutates. Builders decide what to do with
//! an invalid value: keep it and record a warning, or fail the sample in
//! strict mode.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::entity::EntityKind;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const THROUGHPUT_ADVISORY: f64 = 10.0 * GIB;
const MESSAGE_RATE_ADVISORY: f64 = 10_000_000.0;
const LAG_ADVISORY: f64 = 1_000_000.0;

/// Accepted range for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allow_zero: bool,
    pub allow_negative: bool,
    /// Values above this stay valid but are logged
    pub warn_above: Option<f64>,
}

impl Threshold {
    /// Non-negative, unbounded
    pub const fn non_negative() -> Self {
        Threshold {
            min: Some(0.0),
            max: None,
            allow_zero: true,
            allow_negative: false,
            warn_above: None,
        }
    }

    pub const fn percent() -> Self {
        Threshold {
            min: Some(0.0),
            max: Some(100.0),
            allow_zero: true,
            allow_negative: false,
            warn_above: None,
        }
    }

    pub const fn positive() -> Self {
        Threshold {
            min: None,
            max: None,
            allow_zero: false,
            allow_negative: false,
            warn_above: None,
        }
    }

    pub const fn warn_above(mut self, level: f64) -> Self {
        self.warn_above = Some(level);
        self
    }

    pub const fn allow_negative(mut self, min: f64) -> Self {
        self.allow_negative = true;
        self.min = Some(min);
        self
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl MetricCheck {
    fn ok() -> Self {
        MetricCheck {
            valid: true,
            reason: None,
        }
    }

    fn invalid(reason: String) -> Self {
        MetricCheck {
            valid: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricValidator {
    strict: bool,
    thresholds: HashMap<String, Threshold>,
    overrides: HashMap<(EntityKind, String), Threshold>,
}

impl MetricValidator {
    /// Validator loaded with the built-in threshold table
    pub fn new(strict: bool) -> Self {
        let mut validator = MetricValidator {
            strict,
            thresholds: HashMap::new(),
            overrides: HashMap::new(),
        };

        for name in ["bytesInPerSecond", "bytesOutPerSecond", "bytesRejectedPerSecond"] {
            validator.set_threshold(name, Threshold::non_negative().warn_above(THROUGHPUT_ADVISORY));
        }
        for name in ["messagesInPerSecond", "messagesOutPerSecond"] {
            validator.set_threshold(name, Threshold::non_negative().warn_above(MESSAGE_RATE_ADVISORY));
        }
        for name in [
            "requestsPerSecond",
            "fetchRequestsPerSecond",
            "produceRequestsPerSecond",
            "partitionCount",
            "leaderCount",
            "underReplicatedPartitions",
            "underMinIsrPartitions",
            "produceThrottleTimeMs",
            "fetchThrottleTimeMs",
            "fetchConsumerTotalTimeMs",
            "produceTotalTimeMs",
            "minInSyncReplicas",
            "diskSize",
            "diskSizeMB",
            "memberCount",
        ] {
            validator.set_threshold(name, Threshold::non_negative());
        }
        for name in [
            "requestHandlerAvgIdlePercent",
            "networkProcessorAvgIdlePercent",
            "cpuPercent",
            "memoryPercent",
            "diskPercent",
            "ioWaitPercent",
            "lagStabilityScore",
        ] {
            validator.set_threshold(name, Threshold::percent());
        }
        for name in ["totalLag", "maxLag", "avgLag", "partitionLag", "previousTotalLag"] {
            validator.set_threshold(name, Threshold::non_negative().warn_above(LAG_ADVISORY));
        }

        validator.set_threshold("offlinePartitionsCount", Threshold::non_negative().warn_above(0.0));
        validator.set_threshold("activeControllerCount", Threshold::non_negative().warn_above(1.0));
        validator.set_threshold("replicationFactor", Threshold::positive());
        // Kafka uses -1 for unlimited retention
        validator.set_threshold("retentionMs", Threshold::non_negative().allow_negative(-1.0));
        validator.set_threshold("retentionBytes", Threshold::non_negative().allow_negative(-1.0));

        validator.set_override(EntityKind::Topic, "partitionCount", Threshold::positive());

        validator
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn set_threshold(&mut self, metric: impl Into<String>, threshold: Threshold) {
        self.thresholds.insert(metric.into(), threshold);
    }

    pub fn set_override(&mut self, kind: EntityKind, metric: impl Into<String>, threshold: Threshold) {
        self.overrides.insert((kind, metric.into()), threshold);
    }

    pub fn threshold(&self, metric: &str, kind: EntityKind) -> Option<&Threshold> {
        self.overrides
            .get(&(kind, metric.to_string()))
            .or_else(|| self.thresholds.get(metric))
    }

    pub fn validate(&self, metric: &str, kind: EntityKind, value: f64) -> MetricCheck {
        if !value.is_finite() {
            return MetricCheck::invalid(format!("{} is not a finite number ({})", metric, value));
        }

        let threshold = match self.threshold(metric, kind) {
            Some(threshold) => threshold,
            None if self.strict => {
                return MetricCheck::invalid(format!("{} has no validation rule", metric));
            }
            None => return MetricCheck::ok(),
        };

        if value < 0.0 && !threshold.allow_negative {
            return MetricCheck::invalid(format!("{} must not be negative, got {}", metric, value));
        }
        if value == 0.0 && !threshold.allow_zero {
            return MetricCheck::invalid(format!("{} must not be zero on a {}", metric, kind));
        }
        if let Some(min) = threshold.min {
            if value < min {
                return MetricCheck::invalid(format!("{} below minimum {}: {}", metric, min, value));
            }
        }
        if let Some(max) = threshold.max {
            if value > max {
                return MetricCheck::invalid(format!("{} above maximum {}: {}", metric, max, value));
            }
        }
        if let Some(level) = threshold.warn_above {
            if value > level {
                warn!("Unusual {} on {}: {} exceeds {}", metric, kind, value, level);
            }
        }

        MetricCheck::ok()
    }
}

impl Default for MetricValidator {
    fn default() -> Self {
        Self::new(false)
    }
}
