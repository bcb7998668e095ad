//! Core counter store for tally.
//! Named, optionally tenant-isolated counters persisted in SQLite.

pub mod config;
pub mod db;
pub mod job;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, TallyConfig};
pub use job::{CounterJob, DrainReport, JobError, JobFailure, JobOutcome, JobQueue};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::action::{BatchItem, BatchReport, CounterAction};
pub use model::counter::{
    Counter, CounterId, CounterRecord, CounterType, CounterValidationError, Isolation, Page,
};
pub use model::scope::{CounterScope, JoinSpec};
pub use repo::counter_repo::{CounterRepository, RepoError, RepoResult, SqliteCounterRepository};
pub use service::counter_service::CounterService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
