//! Sequential orchestration of the table loaders.
//!
//! Tables run strictly in catalog order. The first fatal outcome stops the
//! run, persists a [`FailureReport`], and leaves later tables unattempted.

pub mod report;

pub use report::FailureReport;

use std::{fmt, path::Path};
use tracing::{debug, error, info};

use crate::catalog::TableDescriptor;
use crate::load::{LoadOutcome, TableLoader};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    /// Index of the table being loaded.
    Running(usize),
    Succeeded(usize),
    Failed(usize),
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running(i) => write!(f, "running({})", i),
            RunState::Succeeded(i) => write!(f, "succeeded({})", i),
            RunState::Failed(i) => write!(f, "failed({})", i),
            RunState::Completed => write!(f, "completed"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub state: RunState,
    /// One entry per attempted table, in load order.
    pub outcomes: Vec<LoadOutcome>,
    pub not_attempted: Vec<&'static str>,
    pub failure: Option<FailureReport>,
}

impl RunSummary {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn outcome(&self, table: &str) -> Option<&LoadOutcome> {
        self.outcomes.iter().find(|o| o.table == table)
    }
}

pub struct Pipeline<'a, S: Store + ?Sized> {
    tables: &'a [TableDescriptor],
    loader: TableLoader<'a, S>,
    report_path: &'a Path,
}

impl<'a, S: Store + ?Sized> Pipeline<'a, S> {
    pub fn new(
        tables: &'a [TableDescriptor],
        loader: TableLoader<'a, S>,
        report_path: &'a Path,
    ) -> Self {
        Self {
            tables,
            loader,
            report_path,
        }
    }

    /// Single pass over every table. Never retries; re-running the whole
    /// pipeline is safe because every write is an upsert.
    pub async fn run(&self) -> RunSummary {
        let mut state = RunState::Pending;
        let mut outcomes: Vec<LoadOutcome> = Vec::with_capacity(self.tables.len());
        debug!(%state, tables = self.tables.len(), "pipeline start");

        for (i, table) in self.tables.iter().enumerate() {
            transition(&mut state, RunState::Running(i));
            let outcome = self.loader.load(table).await;
            info!(
                table = outcome.table,
                attempted = outcome.attempted,
                upserted = outcome.upserted(),
                rejected = outcome.rejected,
                status = outcome.label(),
                "table done"
            );

            if let Some(err) = outcome.error() {
                transition(&mut state, RunState::Failed(i));
                error!(table = table.name, error = %err, "fatal error, aborting run");

                let completed = outcomes.iter().map(|o| o.table.to_string()).collect();
                let report = FailureReport::from_error(table.name, i, err, completed);
                match report.write(self.report_path) {
                    Ok(()) => info!(path = %self.report_path.display(), "failure report written"),
                    Err(e) => error!(
                        path = %self.report_path.display(),
                        error = ?e,
                        "could not write failure report"
                    ),
                }

                outcomes.push(outcome);
                transition(&mut state, RunState::Aborted);
                return RunSummary {
                    state,
                    outcomes,
                    not_attempted: self.tables[i + 1..].iter().map(|t| t.name).collect(),
                    failure: Some(report),
                };
            }

            outcomes.push(outcome);
            transition(&mut state, RunState::Succeeded(i));
        }

        // a report from an earlier aborted run no longer describes this one
        if let Err(e) = FailureReport::clear(self.report_path) {
            error!(
                path = %self.report_path.display(),
                error = ?e,
                "could not remove stale failure report"
            );
        }

        transition(&mut state, RunState::Completed);
        RunSummary {
            state,
            outcomes,
            not_attempted: Vec::new(),
            failure: None,
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "run state");
    *state = next;
}
