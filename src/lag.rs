//! Consumer lag totals, trend and stability scoring

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fields;
use crate::resolver::lookup;
use crate::sample::RawSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl LagTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LagTrend::Increasing => "increasing",
            LagTrend::Decreasing => "decreasing",
            LagTrend::Stable => "stable",
        }
    }
}

impl fmt::Display for LagTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and penalties behind the lag stability score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LagPolicy {
    /// Relative change (percent) beyond which lag counts as moving
    pub trend_threshold_percent: f64,
    pub total_lag_threshold: f64,
    pub total_lag_penalty: f64,
    pub max_lag_threshold: f64,
    pub max_lag_penalty: f64,
    pub increasing_penalty: f64,
}

impl Default for LagPolicy {
    fn default() -> Self {
        Self {
            trend_threshold_percent: 10.0,
            total_lag_threshold: 1000.0,
            total_lag_penalty: 30.0,
            max_lag_threshold: 5000.0,
            max_lag_penalty: 20.0,
            increasing_penalty: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerLagMetrics {
    pub total_lag: f64,
    pub max_lag: f64,
    pub avg_lag: f64,
    pub partition_lag: Option<f64>,
    pub previous_total_lag: Option<f64>,
    pub trend: LagTrend,
    pub stability_score: u8,
}

/// Lag figures for one consumer-group sample
///
/// Total lag falls back to the per-partition lag, then 0. Max lag falls back
/// to the partition lag, then the total. Average lag falls back to the total
/// spread over the reported partition count, then the total itself.
pub fn calculate_consumer_lag_metrics(sample: &RawSample, policy: &LagPolicy) -> ConsumerLagMetrics {
    let partition_lag = lookup(sample, fields::PARTITION_LAG.candidates);
    let previous_total_lag = lookup(sample, fields::PREVIOUS_TOTAL_LAG.candidates);

    let total_lag = lookup(sample, fields::TOTAL_LAG.candidates)
        .or(partition_lag)
        .unwrap_or(0.0);
    let max_lag = lookup(sample, fields::MAX_LAG.candidates)
        .or(partition_lag)
        .unwrap_or(total_lag);
    let avg_lag = lookup(sample, fields::AVG_LAG.candidates).unwrap_or_else(|| {
        match lookup(sample, fields::GROUP_PARTITIONS.candidates) {
            Some(partitions) if partitions > 0.0 => total_lag / partitions,
            _ => total_lag,
        }
    });

    let trend = classify_trend(total_lag, previous_total_lag, policy.trend_threshold_percent);
    let stability_score = stability_score(total_lag, max_lag, trend, policy);

    ConsumerLagMetrics {
        total_lag,
        max_lag,
        avg_lag,
        partition_lag,
        previous_total_lag,
        trend,
        stability_score,
    }
}

/// Direction of lag against the previous observation
///
/// The comparison stays in multiplied form so that exactly `threshold`
/// percent of change is still stable.
pub fn classify_trend(current: f64, previous: Option<f64>, threshold_percent: f64) -> LagTrend {
    let previous = match previous {
        Some(previous) => previous,
        None => return LagTrend::Stable,
    };

    if previous <= 0.0 {
        return if current > 0.0 {
            LagTrend::Increasing
        } else {
            LagTrend::Stable
        };
    }

    let delta = (current - previous) * 100.0;
    let band = previous * threshold_percent;
    if delta > band {
        LagTrend::Increasing
    } else if delta < -band {
        LagTrend::Decreasing
    } else {
        LagTrend::Stable
    }
}

pub fn stability_score(total_lag: f64, max_lag: f64, trend: LagTrend, policy: &LagPolicy) -> u8 {
    let mut score = 100.0;
    if total_lag > policy.total_lag_threshold {
        score -= policy.total_lag_penalty;
    }
    if max_lag > policy.max_lag_threshold {
        score -= policy.max_lag_penalty;
    }
    if trend == LagTrend::Increasing {
        score -= policy.increasing_penalty;
    }
    clamp_score(score)
}

pub(crate) fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}
