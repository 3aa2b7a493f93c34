// src/pipeline/report.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{error::Error, fs, io, path::Path};

/// Diagnostic artifact for an aborted run.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub occurred_at: DateTime<Utc>,
    pub table: String,
    /// Zero-based position of the failing table in the load sequence.
    pub stage: usize,
    pub message: String,
    /// Underlying causes, outermost first.
    pub trace: Vec<String>,
    /// Tables that finished before the abort.
    pub completed: Vec<String>,
}

impl FailureReport {
    pub fn from_error(
        table: &str,
        stage: usize,
        error: &(dyn Error + 'static),
        completed: Vec<String>,
    ) -> Self {
        let mut trace = Vec::new();
        let mut cause = error.source();
        while let Some(e) = cause {
            trace.push(e.to_string());
            cause = e.source();
        }
        Self {
            occurred_at: Utc::now(),
            table: table.to_string(),
            stage,
            message: error.to_string(),
            trace,
            completed,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "seed run aborted at {}\ntable: {}\nstage: {}\nerror: {}\n",
            self.occurred_at.to_rfc3339(),
            self.table,
            self.stage + 1,
            self.message
        );
        if !self.trace.is_empty() {
            out.push_str("trace:\n");
            for (depth, line) in self.trace.iter().enumerate() {
                out.push_str(&format!("  {}: {}\n", depth, line));
            }
        }
        let completed = if self.completed.is_empty() {
            "(none)".to_string()
        } else {
            self.completed.join(", ")
        };
        out.push_str(&format!("completed before abort: {}\n", completed));
        out
    }

    /// Write the report to `path`, replacing any earlier one. Goes through a
    /// sibling `.tmp` file so readers never see a partial report.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating `{}`", parent.display()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, self.render())
            .with_context(|| format!("writing `{}`", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Remove a report left by an earlier run. Absent is fine.
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing `{}`", path.display())),
        }
    }
}
