//! Counter domain model.
//!
//! # Responsibility
//! - Define the persisted counter row and its type marker.
//! - Define the immutable query scope passed into every repository call.
//! - Define mutation actions and batch items shared by service and jobs.
//!
//! # Invariants
//! - `(isolation_id, title, key)` identifies at most one counter row.
//! - A counter value never persists as zero; reaching zero deletes the row.

pub mod action;
pub mod counter;
pub mod scope;
