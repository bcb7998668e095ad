//! Deferred counter mutations.
//!
//! # Responsibility
//! - Carry `(action, title, key(s), value(s), isolation)` requests as
//!   serializable values for an external queue.
//! - Drain an in-process FIFO through [`crate::CounterService`].
//!
//! # Invariants
//! - Action names are validated when a job is built, not when it runs.
//! - A job applies its inputs once; only `replace` is idempotent.

mod counter_job;
mod queue;

pub use counter_job::{CounterJob, JobError, JobOutcome};
pub use queue::{DrainReport, JobFailure, JobQueue};
