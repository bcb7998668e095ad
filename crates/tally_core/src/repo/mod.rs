//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the counter data access contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate scope and values before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to DB transport errors.

pub mod counter_repo;
mod scope_sql;
