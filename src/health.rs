//! Composite health scoring
//!
//! A score starts at 100 and loses points per signal. Every constant lives in
//! `HealthPolicy` so deployments can retune without touching the builders.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lag::clamp_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => HealthStatus::Excellent,
            75..=89 => HealthStatus::Good,
            60..=74 => HealthStatus::Fair,
            40..=59 => HealthStatus::Poor,
            _ => HealthStatus::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "good",
            HealthStatus::Fair => "fair",
            HealthStatus::Poor => "poor",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals feeding a health score. Absent gauges carry no penalty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthInputs {
    pub offline_partitions: f64,
    pub under_replicated_partitions: f64,
    pub broker_count: usize,
    pub offline_brokers: usize,
    pub peak_cpu_percent: Option<f64>,
    pub peak_memory_percent: Option<f64>,
    pub network_processor_idle_percent: Option<f64>,
    pub request_handler_idle_percent: Option<f64>,
    pub total_consumer_lag: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct HealthPolicy {
    pub offline_partition_penalty: f64,
    pub offline_partition_cap: f64,
    pub offline_broker_penalty: f64,
    pub under_replicated_penalty: f64,
    pub under_replicated_cap: f64,
    pub cpu_threshold_percent: f64,
    pub cpu_penalty: f64,
    pub memory_threshold_percent: f64,
    pub memory_penalty: f64,
    pub idle_floor_percent: f64,
    pub network_idle_penalty: f64,
    pub request_idle_penalty: f64,
    pub lag_threshold: f64,
    pub lag_ramp: f64,
    pub lag_penalty_cap: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            offline_partition_penalty: 20.0,
            offline_partition_cap: 40.0,
            offline_broker_penalty: 30.0,
            under_replicated_penalty: 3.0,
            under_replicated_cap: 25.0,
            cpu_threshold_percent: 90.0,
            cpu_penalty: 15.0,
            memory_threshold_percent: 90.0,
            memory_penalty: 15.0,
            idle_floor_percent: 20.0,
            network_idle_penalty: 10.0,
            request_idle_penalty: 10.0,
            lag_threshold: 10_000.0,
            lag_ramp: 90_000.0,
            lag_penalty_cap: 15.0,
        }
    }
}

impl HealthPolicy {
    pub fn score(&self, inputs: &HealthInputs) -> u8 {
        let mut score = 100.0;

        score -= (self.offline_partition_penalty * inputs.offline_partitions.max(0.0))
            .min(self.offline_partition_cap);

        if inputs.broker_count > 0 {
            score -= self.offline_broker_penalty * inputs.offline_brokers as f64
                / inputs.broker_count as f64;
        }

        score -= (self.under_replicated_penalty * inputs.under_replicated_partitions.max(0.0))
            .min(self.under_replicated_cap);

        if inputs.peak_cpu_percent.map_or(false, |cpu| cpu > self.cpu_threshold_percent) {
            score -= self.cpu_penalty;
        }
        if inputs
            .peak_memory_percent
            .map_or(false, |mem| mem > self.memory_threshold_percent)
        {
            score -= self.memory_penalty;
        }
        if inputs
            .network_processor_idle_percent
            .map_or(false, |idle| idle < self.idle_floor_percent)
        {
            score -= self.network_idle_penalty;
        }
        if inputs
            .request_handler_idle_percent
            .map_or(false, |idle| idle < self.idle_floor_percent)
        {
            score -= self.request_idle_penalty;
        }

        if inputs.total_consumer_lag > self.lag_threshold && self.lag_ramp > 0.0 {
            let ramp = (inputs.total_consumer_lag - self.lag_threshold) / self.lag_ramp;
            score -= (self.lag_penalty_cap * ramp).min(self.lag_penalty_cap);
        }

        clamp_score(score)
    }

    pub fn status(&self, inputs: &HealthInputs) -> (u8, HealthStatus) {
        let score = self.score(inputs);
        (score, HealthStatus::from_score(score))
    }
}
