//! Raw monitoring samples and their kind discriminator
//!
//! A `RawSample` is whatever the collector produced, already deserialized
//! into a JSON object. Nothing about its shape is trusted: every field may
//! be missing, null, or of the wrong type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SynthesisError};

/// Kind of leaf sample the engine knows how to build an entity from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SampleKind {
    Broker,
    Topic,
    ConsumerGroup,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Broker => "broker",
            SampleKind::Topic => "topic",
            SampleKind::ConsumerGroup => "consumerGroup",
        }
    }

    /// Map a legacy collector event type onto a sample kind
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "KafkaBrokerSample" | "AwsMskBrokerSample" => Some(SampleKind::Broker),
            "KafkaTopicSample" | "AwsMskTopicSample" => Some(SampleKind::Topic),
            "KafkaOffsetSample" | "KafkaConsumerSample" | "AwsMskConsumerGroupSample" => {
                Some(SampleKind::ConsumerGroup)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleKind {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broker" => Ok(SampleKind::Broker),
            "topic" => Ok(SampleKind::Topic),
            "consumergroup" | "consumer_group" => Ok(SampleKind::ConsumerGroup),
            other => Err(SynthesisError::classification(format!(
                "unrecognized sample kind '{}'",
                other
            ))),
        }
    }
}

/// Field carrying the kind discriminator
pub const KIND_FIELD: &str = "kind";

/// Legacy discriminator fields, checked after `kind`
pub const EVENT_TYPE_FIELDS: &[&str] = &["eventType", "event_type"];

/// One untyped sample as handed over by the collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSample {
    fields: Map<String, Value>,
}

impl RawSample {
    /// Build a sample tagged with `kind` from an arbitrary field map
    pub fn new(kind: SampleKind, mut fields: Map<String, Value>) -> Self {
        fields.insert(KIND_FIELD.to_string(), Value::String(kind.as_str().to_string()));
        RawSample { fields }
    }

    /// Wrap a JSON value; anything other than an object is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(RawSample { fields }),
            other => Err(SynthesisError::classification(format!(
                "sample must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve the sample kind from `kind`, then the legacy event type fields
    pub fn classify(&self) -> Result<SampleKind> {
        if let Some(value) = self.fields.get(KIND_FIELD) {
            return match value {
                Value::String(s) => s.parse(),
                Value::Null => Err(SynthesisError::classification("sample kind is null")),
                other => Err(SynthesisError::classification(format!(
                    "sample kind must be a string, got {}",
                    json_type_name(other)
                ))),
            };
        }

        for field in EVENT_TYPE_FIELDS {
            if let Some(Value::String(event_type)) = self.fields.get(*field) {
                return SampleKind::from_event_type(event_type).ok_or_else(|| {
                    SynthesisError::classification(format!(
                        "unrecognized event type '{}'",
                        event_type
                    ))
                });
            }
        }

        Err(SynthesisError::classification(
            "sample has no kind or eventType discriminator",
        ))
    }
}

impl From<Map<String, Value>> for RawSample {
    fn from(fields: Map<String, Value>) -> Self {
        RawSample { fields }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(value: Value) -> RawSample {
        RawSample::from_value(value).expect("object sample")
    }

    #[test]
    fn test_kind_field_wins() {
        let s = sample(json!({"kind": "topic", "eventType": "KafkaBrokerSample"}));
        assert_eq!(s.classify().unwrap(), SampleKind::Topic);
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("consumerGroup".parse::<SampleKind>().unwrap(), SampleKind::ConsumerGroup);
        assert_eq!("consumer_group".parse::<SampleKind>().unwrap(), SampleKind::ConsumerGroup);
        assert_eq!("Broker".parse::<SampleKind>().unwrap(), SampleKind::Broker);
        assert!("cluster".parse::<SampleKind>().is_err());
    }

    #[test]
    fn test_legacy_event_types() {
        let s = sample(json!({"eventType": "KafkaOffsetSample"}));
        assert_eq!(s.classify().unwrap(), SampleKind::ConsumerGroup);

        let s = sample(json!({"event_type": "AwsMskBrokerSample"}));
        assert_eq!(s.classify().unwrap(), SampleKind::Broker);

        let s = sample(json!({"eventType": "SystemSample"}));
        assert!(s.classify().is_err());
    }

    #[test]
    fn test_missing_and_malformed_kind() {
        assert!(sample(json!({"broker.id": 1})).classify().is_err());
        assert!(sample(json!({"kind": null})).classify().is_err());
        assert!(sample(json!({"kind": 3})).classify().is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(RawSample::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_new_sets_kind() {
        let s = RawSample::new(SampleKind::Broker, Map::new());
        assert_eq!(s.get("kind"), Some(&json!("broker")));
        assert_eq!(s.classify().unwrap(), SampleKind::Broker);
    }
}
