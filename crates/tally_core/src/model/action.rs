//! Mutation actions and batch items.

use crate::model::counter::CounterValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Mutation applied by a batch or a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterAction {
    /// `value += delta`, creating the row when absent.
    Increase,
    /// `value -= delta`, deleting the row at zero. Never creates.
    Decrease,
    /// `value = new`, creating the row when absent.
    Replace,
}

impl CounterAction {
    pub const ALL: [CounterAction; 3] = [Self::Increase, Self::Decrease, Self::Replace];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::Replace => "replace",
        }
    }

    /// Whether applying the same input twice leaves the same state as once.
    pub fn is_idempotent(self) -> bool {
        matches!(self, Self::Replace)
    }
}

impl Display for CounterAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterAction {
    type Err = CounterValidationError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "increase" => Ok(Self::Increase),
            "decrease" => Ok(Self::Decrease),
            "replace" => Ok(Self::Replace),
            _ => Err(CounterValidationError::UnknownAction(value.to_string())),
        }
    }
}

/// One `(key, value)` pair of a batch sharing a title and isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub key: String,
    pub value: i64,
}

impl BatchItem {
    pub fn new(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Outcome of an applied batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Items that changed a row.
    pub applied: usize,
    /// Decrease items whose row did not exist.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::CounterAction;
    use crate::model::counter::CounterValidationError;

    #[test]
    fn parses_known_actions_case_insensitively() {
        assert_eq!(
            "Increase".parse::<CounterAction>().unwrap(),
            CounterAction::Increase
        );
        assert_eq!(
            " DECREASE ".parse::<CounterAction>().unwrap(),
            CounterAction::Decrease
        );
        for action in CounterAction::ALL {
            assert_eq!(action.as_str().parse::<CounterAction>().unwrap(), action);
        }
    }

    #[test]
    fn rejects_unknown_action() {
        let err = "multiply".parse::<CounterAction>().unwrap_err();
        assert_eq!(err, CounterValidationError::UnknownAction("multiply".into()));
        assert!(err.to_string().contains("[multiply]"));
    }

    #[test]
    fn only_replace_is_idempotent() {
        assert!(CounterAction::Replace.is_idempotent());
        assert!(!CounterAction::Increase.is_idempotent());
        assert!(!CounterAction::Decrease.is_idempotent());
    }
}
