//! Field resolution over loosely-typed samples
//!
//! Candidates are tried in order. A candidate matches a literal key first
//! (dots included); failing that, it is split at each `.` and the prefix is
//! looked up as a nested object, so `net.bytesInPerSec` also finds
//! `{"net": {"bytesInPerSec": 5}}`.

use serde_json::{Map, Value};

use crate::fields::FieldSpec;
use crate::sample::RawSample;

/// First finite numeric value among `candidates`, or `default`
pub fn resolve(sample: &RawSample, candidates: &[&str], default: f64) -> f64 {
    lookup(sample, candidates).unwrap_or(default)
}

/// Resolve a catalogued metric, falling back to `default`
pub fn resolve_spec(sample: &RawSample, spec: &FieldSpec, default: f64) -> f64 {
    resolve(sample, spec.candidates, default)
}

/// First finite numeric value among `candidates`, if any
pub fn lookup(sample: &RawSample, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|candidate| value_at(sample.fields(), candidate).and_then(as_number))
}

/// First usable string among `candidates`
///
/// Strings are trimmed and must be non-empty. Numbers are accepted so that a
/// numeric broker id of `3` (or `3.0`) comes back as `"3"`.
pub fn lookup_str(sample: &RawSample, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|candidate| value_at(sample.fields(), candidate).and_then(as_text))
}

/// Coerce a JSON value to a finite number
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() {
        Some(n)
    } else {
        None
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i.to_string());
            }
            if let Some(u) = n.as_u64() {
                return Some(u.to_string());
            }
            let f = n.as_f64().filter(|f| f.is_finite())?;
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", f as i64))
            } else {
                Some(f.to_string())
            }
        }
        _ => None,
    }
}

/// Locate a candidate path inside a field map, skipping nulls
fn value_at<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = fields.get(path) {
        if !value.is_null() {
            return Some(value);
        }
    }

    for (idx, _) in path.match_indices('.') {
        let (head, rest) = (&path[..idx], &path[idx + 1..]);
        if let Some(Value::Object(nested)) = fields.get(head) {
            if let Some(value) = value_at(nested, rest) {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(value: Value) -> RawSample {
        RawSample::from_value(value).unwrap()
    }

    #[test]
    fn test_first_candidate_wins() {
        let s = sample(json!({"broker.bytesInPerSecond": 5, "bytesInPerSecond": 9}));
        let value = resolve(&s, &["broker.bytesInPerSecond", "bytesInPerSecond"], 0.0);
        assert_eq!(value, 5.0);
    }

    #[test]
    fn test_default_when_nothing_usable() {
        let s = sample(json!({"a": null, "b": "n/a", "c": true, "d": [1]}));
        assert_eq!(resolve(&s, &["a", "b", "c", "d", "e"], 42.0), 42.0);
    }

    #[test]
    fn test_skips_null_and_falls_through() {
        let s = sample(json!({"broker.cpuPercent": null, "cpuPercent": 12.5}));
        assert_eq!(lookup(&s, &["broker.cpuPercent", "cpuPercent"]), Some(12.5));
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let s = sample(json!({"x": " 17.25 ", "y": "NaN", "z": "inf"}));
        assert_eq!(lookup(&s, &["x"]), Some(17.25));
        assert_eq!(lookup(&s, &["y"]), None);
        assert_eq!(lookup(&s, &["z"]), None);
    }

    #[test]
    fn test_nested_paths() {
        let s = sample(json!({"net": {"bytesInPerSec": 5}}));
        assert_eq!(lookup(&s, &["net.bytesInPerSec"]), Some(5.0));

        let s = sample(json!({"provider": {"broker": {"id": 4}}}));
        assert_eq!(lookup_str(&s, &["provider.broker.id"]), Some("4".to_string()));

        let s = sample(json!({"provider": {"broker.id": "7"}}));
        assert_eq!(lookup_str(&s, &["provider.broker.id"]), Some("7".to_string()));
    }

    #[test]
    fn test_literal_dotted_key_beats_nested() {
        let s = sample(json!({"net.bytesInPerSec": 1, "net": {"bytesInPerSec": 2}}));
        assert_eq!(lookup(&s, &["net.bytesInPerSec"]), Some(1.0));
    }

    #[test]
    fn test_lookup_str_renders_numbers() {
        let s = sample(json!({"a": 3.0, "b": 2.5, "c": "  ", "d": " topic-a "}));
        assert_eq!(lookup_str(&s, &["a"]), Some("3".to_string()));
        assert_eq!(lookup_str(&s, &["b"]), Some("2.5".to_string()));
        assert_eq!(lookup_str(&s, &["c"]), None);
        assert_eq!(lookup_str(&s, &["c", "d"]), Some("topic-a".to_string()));
    }
}
