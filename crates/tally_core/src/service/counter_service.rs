//! Counter use-case service.
//!
//! # Responsibility
//! - Provide the entry points callers use instead of a global facade.
//! - Dispatch `CounterAction` values through one fixed mapping.
//! - Parse string action names for batch and job inputs.
//! - Execute queued counter jobs.
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - Unknown action names fail before any repository call.

use crate::job::{CounterJob, JobOutcome};
use crate::model::action::{BatchItem, BatchReport, CounterAction};
use crate::model::counter::{Counter, CounterId, CounterRecord, Page};
use crate::model::scope::CounterScope;
use crate::repo::counter_repo::{CounterRepository, RepoResult};
use log::{info, warn};
use std::time::Instant;

const DEFAULT_PER_PAGE: u32 = 10;

/// Use-case service wrapper over a counter repository.
pub struct CounterService<R: CounterRepository> {
    repo: R,
    default_per_page: u32,
}

impl<R: CounterRepository> CounterService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            default_per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Overrides the page size used when `paginate` gets `None`.
    /// Zero keeps the current value.
    pub fn with_default_per_page(mut self, per_page: u32) -> Self {
        if per_page > 0 {
            self.default_per_page = per_page;
        }
        self
    }

    /// Returns the newest row matching `scope`.
    ///
    /// # Contract
    /// - A missing row is `Ok(None)`, not an error.
    pub fn find(&self, scope: &CounterScope) -> RepoResult<Option<Counter>> {
        self.repo.find(scope)
    }

    /// Lists every row matching `scope`, newest first.
    pub fn get(&self, scope: &CounterScope) -> RepoResult<Vec<CounterRecord>> {
        self.repo.get(scope)
    }

    /// Counts rows matching `scope`.
    pub fn count(&self, scope: &CounterScope) -> RepoResult<u64> {
        self.repo.count(scope)
    }

    /// Returns one page; `per_page = None` uses the configured default.
    ///
    /// # Contract
    /// - `page` is 1-based; zero `page` or `per_page` is a validation error.
    pub fn paginate(
        &self,
        scope: &CounterScope,
        page: u32,
        per_page: Option<u32>,
    ) -> RepoResult<Page<CounterRecord>> {
        self.repo
            .paginate(scope, page, per_page.unwrap_or(self.default_per_page))
    }

    /// Adds `value` to the scope's target row, creating it when absent.
    ///
    /// # Contract
    /// - Requires title, key and `value > 0`.
    /// - Creates `Summable` rows.
    pub fn increase(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        self.apply(scope, CounterAction::Increase, value)
    }

    /// Subtracts `value` from the scope's target row.
    ///
    /// # Contract
    /// - Missing row returns `Ok(false)` and creates nothing.
    /// - `value` below zero or above the current value is `OutOfBounds`.
    /// - Reaching zero deletes the row.
    pub fn decrease(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        self.apply(scope, CounterAction::Decrease, value)
    }

    /// Sets the scope's target row to `value`, creating it when absent.
    pub fn replace(&self, scope: &CounterScope, value: i64) -> RepoResult<bool> {
        self.apply(scope, CounterAction::Replace, value)
    }

    /// Adds one to the target row, creating a `Countable` row when absent.
    pub fn increment(&self, scope: &CounterScope) -> RepoResult<bool> {
        let result = self.repo.increment(scope);
        log_mutation(mutation_event(CounterAction::Increase), "increment", &result);
        result
    }

    /// Subtracts one from the target row; `Ok(false)` when absent.
    pub fn decrement(&self, scope: &CounterScope) -> RepoResult<bool> {
        let result = self.repo.decrement(scope);
        log_mutation(mutation_event(CounterAction::Decrease), "decrement", &result);
        result
    }

    /// Applies one action to the scope's target row.
    pub fn apply(&self, scope: &CounterScope, action: CounterAction, value: i64) -> RepoResult<bool> {
        let result = match action {
            CounterAction::Increase => self.repo.increase(scope, value),
            CounterAction::Decrease => self.repo.decrease(scope, value),
            CounterAction::Replace => self.repo.replace(scope, value),
        };
        log_mutation(mutation_event(action), action.as_str(), &result);
        result
    }

    /// Applies one action to every item under the scope's title and
    /// isolation. The batch commits or rolls back as a whole.
    pub fn apply_many(
        &self,
        scope: &CounterScope,
        action: CounterAction,
        items: &[BatchItem],
    ) -> RepoResult<BatchReport> {
        let started_at = Instant::now();
        let result = self.repo.apply_batch(scope, action, items);

        match &result {
            Ok(report) => info!(
                "event=counter_batch module=service status=ok action={} items={} applied={} skipped={} duration_ms={}",
                action,
                items.len(),
                report.applied,
                report.skipped,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=counter_batch module=service status=error action={} items={} duration_ms={} error={}",
                action,
                items.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Parses `action` (`increase|decrease|replace`, any case) and applies
    /// the batch.
    pub fn do_many(
        &self,
        scope: &CounterScope,
        action: &str,
        items: &[BatchItem],
    ) -> RepoResult<BatchReport> {
        let action = action.parse::<CounterAction>()?;
        self.apply_many(scope, action, items)
    }

    /// Deletes every row matching `scope` and returns how many went.
    ///
    /// # Contract
    /// - A scope with no filter at all is rejected with `UnscopedRemove`.
    pub fn remove(&self, scope: &CounterScope) -> RepoResult<usize> {
        let removed = self.repo.remove(scope)?;
        info!(
            "event=counter_remove module=service status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    /// Deletes one row by id; `NotFound` when it does not exist.
    pub fn remove_by_id(&self, id: CounterId) -> RepoResult<()> {
        self.repo.remove_by_id(id)?;
        info!("event=counter_remove module=service status=ok removed=1 by_id=true");
        Ok(())
    }

    /// Executes one queued job against the repository.
    pub fn handle_job(&self, job: &CounterJob) -> RepoResult<JobOutcome> {
        let scope = job.scope();
        match job {
            CounterJob::Single { action, value, .. } => self
                .apply(&scope, *action, *value)
                .map(JobOutcome::Single),
            CounterJob::Many { action, items, .. } => self
                .apply_many(&scope, *action, items)
                .map(JobOutcome::Many),
        }
    }
}

/// Log event name for a single-row mutation.
fn mutation_event(action: CounterAction) -> &'static str {
    match action {
        CounterAction::Increase | CounterAction::Replace => "counter_upsert",
        CounterAction::Decrease => "counter_decrease",
    }
}

fn log_mutation(event: &str, operation: &str, result: &RepoResult<bool>) {
    match result {
        Ok(changed) => info!(
            "event={} module=service status=ok action={} changed={}",
            event, operation, changed
        ),
        Err(err) => warn!(
            "event={} module=service status=error action={} error={}",
            event, operation, err
        ),
    }
}
