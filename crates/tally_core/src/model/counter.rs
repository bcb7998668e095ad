//! Counter row model and validation errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Surrogate key of a persisted counter row.
pub type CounterId = i64;

/// Records how a counter value accrued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterType {
    /// Value grew one unit at a time (`increment`).
    Countable,
    /// Value is the result of arbitrary deltas (`increase`, `replace`).
    Summable,
}

impl CounterType {
    /// Returns the string persisted in the `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Countable => "Countable",
            Self::Summable => "Summable",
        }
    }

    /// Parses the persisted `type` column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Countable" => Some(Self::Countable),
            "Summable" => Some(Self::Summable),
            _ => None,
        }
    }
}

/// Tenant/owner discriminator partitioning counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Isolation {
    /// Informational scope name, e.g. `tenant` or `organisation`.
    pub name: String,
    /// Scope instance id. Filtering keys on this value only.
    pub id: i64,
}

impl Isolation {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// One persisted `(title, key, isolation) -> value` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: CounterId,
    pub isolation_name: Option<String>,
    pub isolation_id: Option<i64>,
    /// Logical grouping label.
    pub title: String,
    /// Identifier unique within `title` and isolation.
    pub key: String,
    pub value: i64,
    /// Serialized as `type` to match the table column.
    #[serde(rename = "type")]
    pub kind: CounterType,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Counter {
    /// Returns the isolation scope this row belongs to, if any.
    pub fn isolation(&self) -> Option<Isolation> {
        self.isolation_id.map(|id| Isolation {
            name: self.isolation_name.clone().unwrap_or_default(),
            id,
        })
    }
}

/// Read model for list and page results.
///
/// `joined` carries the extra projected columns of an active join, keyed by
/// the column name as it was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterRecord {
    #[serde(flatten)]
    pub counter: Counter,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub joined: BTreeMap<String, serde_json::Value>,
}

impl From<Counter> for CounterRecord {
    fn from(counter: Counter) -> Self {
        Self {
            counter,
            joined: BTreeMap::new(),
        }
    }
}

/// One window of an ordered counter listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total rows matching the scope across all pages.
    pub total: u64,
    pub per_page: u32,
    /// 1-based page number.
    pub current_page: u32,
    /// Never less than 1, even for an empty result.
    pub last_page: u32,
}

/// Input rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterValidationError {
    #[error("title is not set")]
    MissingTitle,
    #[error("key is not set")]
    MissingKey,
    #[error("value should be greater than 0, got {0}")]
    NonPositiveValue(i64),
    #[error("subtract value {requested} is out of bounds for current value {current}")]
    OutOfBounds { requested: i64, current: i64 },
    #[error("counter value overflow")]
    ValueOverflow,
    #[error("invalid [{0}] action; expected increase|decrease|replace")]
    UnknownAction(String),
    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("refusing to remove counters without any scope filter")]
    UnscopedRemove,
    #[error("invalid pagination: page={page} per_page={per_page}")]
    InvalidPagination { page: u32, per_page: u32 },
}

#[cfg(test)]
mod tests {
    use super::{Counter, CounterType, Isolation};

    #[test]
    fn counter_type_round_trips_through_column_text() {
        for kind in [CounterType::Countable, CounterType::Summable] {
            assert_eq!(CounterType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CounterType::parse("countable"), None);
    }

    #[test]
    fn isolation_is_derived_from_row_columns() {
        let mut counter = Counter {
            id: 1,
            isolation_name: Some("tenant".to_string()),
            isolation_id: Some(7),
            title: "signups".to_string(),
            key: "daily".to_string(),
            value: 3,
            kind: CounterType::Summable,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(counter.isolation(), Some(Isolation::new("tenant", 7)));

        counter.isolation_id = None;
        assert_eq!(counter.isolation(), None);
    }

    #[test]
    fn counter_serializes_kind_as_type() {
        let counter = Counter {
            id: 4,
            isolation_name: None,
            isolation_id: None,
            title: "t".to_string(),
            key: "k".to_string(),
            value: 1,
            kind: CounterType::Countable,
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_value(&counter).unwrap();
        assert_eq!(json["type"], "Countable");
        assert!(json.get("kind").is_none());
    }
}
