//! Record Sanitizer
//!
//! The storage backend rejects `null` and malformed nested values, so every
//! record is normalized right before create/update. Sanitizing never fails:
//! bad input is corrected or dropped, never reported.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::item::{Domain, Record};

/// Which fields of a domain record get normalized, and how
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeRules {
    /// Nested `{platform: handle}` maps; non-string values are dropped
    #[serde(default)]
    pub handle_maps: Vec<String>,
    /// Lists of URLs/strings; blank and non-string entries are dropped
    #[serde(default)]
    pub link_lists: Vec<String>,
    /// Declared-numeric fields; coerced to a number, `0` on failure
    #[serde(default)]
    pub numeric: Vec<String>,
}

impl SanitizeRules {
    pub fn builtin(domain: Domain) -> Self {
        match domain {
            Domain::Commissions => Self {
                handle_maps: vec!["artist_handles".into()],
                link_lists: vec!["reference_links".into(), "commission_links".into()],
                numeric: vec!["payment".into(), "budget".into()],
            },
            Domain::Ideas | Domain::Tasks => Self {
                handle_maps: Vec::new(),
                link_lists: vec!["reference_links".into()],
                numeric: Vec::new(),
            },
        }
    }
}

/// Applies [`SanitizeRules`] to records
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    rules: SanitizeRules,
}

impl Sanitizer {
    pub fn new(rules: SanitizeRules) -> Self {
        Self { rules }
    }

    /// Normalize a record. Idempotent.
    pub fn sanitize(&self, mut record: Record) -> Record {
        for key in &self.rules.handle_maps {
            if let Some(value) = record.remove(key) {
                if let Some(handles) = clean_handle_map(value) {
                    record.insert(key.clone(), handles);
                }
            }
        }

        for key in &self.rules.link_lists {
            if let Some(value) = record.remove(key) {
                if let Some(links) = clean_string_list(value) {
                    record.insert(key.clone(), links);
                }
            }
        }

        for key in &self.rules.numeric {
            if let Some(value) = record.get_mut(key) {
                *value = coerce_number(value);
            }
        }

        record
    }
}

fn clean_handle_map(value: Value) -> Option<Value> {
    let Value::Object(map) = value else {
        return None;
    };
    let kept: Record = map.into_iter().filter(|(_, v)| v.is_string()).collect();
    if kept.is_empty() {
        None
    } else {
        Some(Value::Object(kept))
    }
}

fn clean_string_list(value: Value) -> Option<Value> {
    let Value::Array(entries) = value else {
        return None;
    };
    let kept = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| Value::String(trimmed.to_string()))
            }
            _ => None,
        })
        .collect();
    Some(Value::Array(kept))
}

fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => parse_number(s.trim()).unwrap_or_else(zero),
        _ => zero(),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    let float = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(float).map(Value::Number)
}

fn zero() -> Value {
    Value::Number(0.into())
}
