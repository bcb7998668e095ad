//! Serializable counter mutation requests.

use crate::model::action::{BatchItem, BatchReport, CounterAction};
use crate::model::counter::{CounterValidationError, Isolation};
use crate::model::scope::CounterScope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure encoding or decoding a job payload.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A mutation to run later with the same semantics as the synchronous API.
///
/// Only `Replace` jobs are idempotent; running an `Increase` or `Decrease`
/// job twice applies it twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CounterJob {
    Single {
        action: CounterAction,
        title: String,
        key: String,
        #[serde(default = "default_job_value")]
        value: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        isolation: Option<Isolation>,
    },
    Many {
        action: CounterAction,
        title: String,
        items: Vec<BatchItem>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        isolation: Option<Isolation>,
    },
}

/// Result of a handled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Single(bool),
    Many(BatchReport),
}

fn default_job_value() -> i64 {
    1
}

impl CounterJob {
    /// Builds a single-key job from an action name.
    ///
    /// # Errors
    /// - `UnknownAction` for names other than `increase|decrease|replace`.
    pub fn single(
        action: &str,
        title: impl Into<String>,
        key: impl Into<String>,
        value: i64,
    ) -> Result<Self, CounterValidationError> {
        Ok(Self::Single {
            action: action.parse()?,
            title: title.into(),
            key: key.into(),
            value,
            isolation: None,
        })
    }

    /// Builds a multi-key job from an action name.
    pub fn many(
        action: &str,
        title: impl Into<String>,
        items: Vec<BatchItem>,
    ) -> Result<Self, CounterValidationError> {
        Ok(Self::Many {
            action: action.parse()?,
            title: title.into(),
            items,
            isolation: None,
        })
    }

    /// Attaches an isolation scope to the job.
    pub fn with_isolation(mut self, name: impl Into<String>, id: i64) -> Self {
        let scope = Some(Isolation::new(name, id));
        match &mut self {
            Self::Single { isolation, .. } | Self::Many { isolation, .. } => *isolation = scope,
        }
        self
    }

    pub fn action(&self) -> CounterAction {
        match self {
            Self::Single { action, .. } | Self::Many { action, .. } => *action,
        }
    }

    pub fn is_idempotent(&self) -> bool {
        self.action().is_idempotent()
    }

    /// Scope the job runs under: title, isolation and, for single jobs, key.
    pub fn scope(&self) -> CounterScope {
        match self {
            Self::Single {
                title,
                key,
                isolation,
                ..
            } => CounterScope::new()
                .with_isolation(isolation.clone())
                .title(title.as_str())
                .key(key.as_str()),
            Self::Many {
                title, isolation, ..
            } => CounterScope::new()
                .with_isolation(isolation.clone())
                .title(title.as_str()),
        }
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(payload: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(payload)?)
    }
}
