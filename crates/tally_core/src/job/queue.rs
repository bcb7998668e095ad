//! In-process FIFO of pending counter jobs.

use crate::job::counter_job::{CounterJob, JobOutcome};
use crate::repo::counter_repo::{CounterRepository, RepoError};
use crate::service::counter_service::CounterService;
use log::{info, warn};
use std::collections::VecDeque;

/// A job that failed while draining.
#[derive(Debug)]
pub struct JobFailure {
    pub job: CounterJob,
    pub error: RepoError,
}

#[derive(Debug, Default)]
pub struct DrainReport {
    /// Outcomes of successful jobs, in execution order.
    pub completed: Vec<JobOutcome>,
    pub failures: Vec<JobFailure>,
}

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: VecDeque<CounterJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: CounterJob) {
        self.jobs.push_back(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Runs every queued job in FIFO order. A failing job is recorded and
    /// the drain continues with the next one.
    pub fn drain<R: CounterRepository>(&mut self, service: &CounterService<R>) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(job) = self.jobs.pop_front() {
            match service.handle_job(&job) {
                Ok(outcome) => report.completed.push(outcome),
                Err(error) => {
                    warn!(
                        "event=job_failed module=job status=error action={} error={}",
                        job.action(),
                        error
                    );
                    report.failures.push(JobFailure { job, error });
                }
            }
        }

        info!(
            "event=job_drain module=job status=ok completed={} failed={}",
            report.completed.len(),
            report.failures.len()
        );
        report
    }
}

impl Extend<CounterJob> for JobQueue {
    fn extend<T: IntoIterator<Item = CounterJob>>(&mut self, iter: T) {
        self.jobs.extend(iter);
    }
}
