//! Prediction record types shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier carried inside a record.
///
/// The local backend writes millisecond timestamps (numbers), the realtime
/// backend writes opaque document ids (strings). Array-backed files carry none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RecordId::Number(n) => Some(*n),
            RecordId::Text(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// A single weather forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    pub date: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub to_date: Option<String>,

    pub condition: String,

    /// Celsius, kept as text; JSON numbers are accepted.
    #[serde(deserialize_with = "number_or_string")]
    pub temperature: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl PredictionRecord {
    pub fn new(
        date: impl Into<String>,
        condition: impl Into<String>,
        temperature: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            date: date.into(),
            to_date: None,
            condition: condition.into(),
            temperature: temperature.into(),
            notes: String::new(),
            timestamp: None,
            author: None,
        }
    }

    /// How this record is addressed for deletion: its id when it has one,
    /// otherwise its position in the list.
    pub fn reference(&self, index: usize) -> RecordRef {
        match &self.id {
            Some(id) => RecordRef::Id(id.clone()),
            None => RecordRef::Index(index),
        }
    }
}

/// Addresses one record in a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordRef {
    Index(usize),
    Id(RecordId),
}

impl RecordRef {
    /// Whether the record at `index` is the one addressed.
    pub fn matches(&self, index: usize, record: &PredictionRecord) -> bool {
        match self {
            RecordRef::Index(i) => *i == index,
            // Compare textually so "17" in a URL still finds a numeric id 17
            RecordRef::Id(id) => record
                .id
                .as_ref()
                .is_some_and(|own| own.to_string() == id.to_string()),
        }
    }

    /// Position of the addressed record in `records`.
    pub fn position(&self, records: &[PredictionRecord]) -> Option<usize> {
        records
            .iter()
            .enumerate()
            .position(|(i, r)| self.matches(i, r))
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Index(i) => write!(f, "index-{}", i),
            RecordRef::Id(id) => write!(f, "id-{}", id),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid record reference: {0}")]
pub struct RecordRefParseError(pub String);

impl FromStr for RecordRef {
    type Err = RecordRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("index-") {
            return rest
                .parse::<usize>()
                .map(RecordRef::Index)
                .map_err(|_| RecordRefParseError(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix("id-") {
            if rest.is_empty() {
                return Err(RecordRefParseError(s.to_string()));
            }
            let id = match rest.parse::<i64>() {
                Ok(n) => RecordId::Number(n),
                Err(_) => RecordId::Text(rest.to_string()),
            };
            return Ok(RecordRef::Id(id));
        }
        Err(RecordRefParseError(s.to_string()))
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// Accepts RFC 3339 strings or epoch milliseconds; anything else reads as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}
