//! Loading one table: read its source, decode, complete records, and issue a
//! single bulk upsert.

use serde_json::Value;
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::catalog::{Derivation, Source, StoreErrorPolicy, TableDescriptor};
use crate::decode::{Cell, ColumnRule, Decoder, TypedRecord};
use crate::resolve::ReferenceResolver;
use crate::store::{with_timeout, Store, StoreError};

/// Fatal per-table failures. Anything that reaches the orchestrator as a
/// `LoadError` ends the run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("required source `{}` is missing", .path.display())]
    MissingSource { path: PathBuf },

    #[error("could not read `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in `{}`", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("table `{table}` does not exist in the target store; provision the schema before seeding")]
    MissingRelation {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("store rejected `{table}`")]
    Store {
        table: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug)]
pub enum LoadStatus {
    /// Upsert accepted. Zero when the source held no usable rows.
    Loaded { upserted: usize },
    /// Optional source file absent.
    SkippedMissing,
    /// Store rejected a best-effort table; the run goes on.
    Degraded { reason: String },
    Failed(LoadError),
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub table: &'static str,
    /// Records decoded from the source.
    pub attempted: usize,
    /// Records left out of the batch because a required number was unusable.
    pub rejected: usize,
    /// Cells that decoded to a default or sentinel.
    pub defects: usize,
    pub status: LoadStatus,
}

impl LoadOutcome {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            attempted: 0,
            rejected: 0,
            defects: 0,
            status: LoadStatus::Loaded { upserted: 0 },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.status, LoadStatus::Failed(_))
    }

    pub fn upserted(&self) -> usize {
        match self.status {
            LoadStatus::Loaded { upserted } => upserted,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.status {
            LoadStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Short status word for progress output.
    pub fn label(&self) -> &'static str {
        match self.status {
            LoadStatus::Loaded { upserted: 0 } => "empty",
            LoadStatus::Loaded { .. } => "loaded",
            LoadStatus::SkippedMissing => "skipped",
            LoadStatus::Degraded { .. } => "warning",
            LoadStatus::Failed(_) => "failed",
        }
    }
}

pub struct TableLoader<'a, S: Store + ?Sized> {
    store: &'a S,
    source_dir: &'a Path,
    call_timeout: Duration,
}

impl<'a, S: Store + ?Sized> TableLoader<'a, S> {
    pub fn new(store: &'a S, source_dir: &'a Path, call_timeout: Duration) -> Self {
        Self {
            store,
            source_dir,
            call_timeout,
        }
    }

    /// Load one table. Never panics on bad data; every failure is reported in
    /// the returned outcome.
    #[instrument(level = "info", skip_all, fields(table = table.name))]
    pub async fn load(&self, table: &TableDescriptor) -> LoadOutcome {
        let mut outcome = LoadOutcome::new(table.name);
        let status = match self.try_load(table, &mut outcome).await {
            Ok(status) => status,
            Err(e) => LoadStatus::Failed(e),
        };
        outcome.status = status;
        outcome
    }

    async fn try_load(
        &self,
        table: &TableDescriptor,
        outcome: &mut LoadOutcome,
    ) -> Result<LoadStatus, LoadError> {
        // 1) read + decode
        let records = match table.source {
            Source::Csv(file) => {
                let path = self.source_dir.join(file);
                let text = match fs::read_to_string(&path).await {
                    Ok(text) => text,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        if table.is_required() {
                            return Err(LoadError::MissingSource { path });
                        }
                        info!(path = %path.display(), "optional source absent, skipping");
                        return Ok(LoadStatus::SkippedMissing);
                    }
                    Err(source) => return Err(LoadError::Io { path, source }),
                };
                decode_all(&text, table.policy)
                    .map_err(|source| LoadError::Decode { path, source })?
            }
            Source::Embedded(seed) => seed(),
        };
        outcome.attempted = records.len();

        // 2) structural defaults + foreign keys
        let records = self.derive(table, records).await?;

        // 3) report defects, drop rows that still hold the numeric sentinel
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let line = record.line;
            for defect in record.defects() {
                outcome.defects += 1;
                warn!(line, column = %defect.column, raw = %defect.raw, "{}, using default", defect.kind);
            }
            match record.into_row() {
                Ok(row) => rows.push(row),
                Err(columns) => {
                    outcome.rejected += 1;
                    warn!(line, ?columns, "row rejected: required number missing or malformed");
                }
            }
        }

        if rows.is_empty() {
            info!(attempted = outcome.attempted, "nothing to upsert");
            return Ok(LoadStatus::Loaded { upserted: 0 });
        }

        // 4) one bulk write
        let upsert = self.store.upsert(table.name, &rows, table.conflict_key);
        match with_timeout(self.call_timeout, upsert).await {
            Ok(()) => Ok(LoadStatus::Loaded {
                upserted: rows.len(),
            }),
            Err(e)
                if !e.is_undefined_relation()
                    && table.on_store_error == StoreErrorPolicy::Warn =>
            {
                warn!(error = %e, "store rejected best-effort table, continuing");
                Ok(LoadStatus::Degraded {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(fatal_store_error(table.name, e)),
        }
    }

    async fn derive(
        &self,
        table: &TableDescriptor,
        mut records: Vec<TypedRecord>,
    ) -> Result<Vec<TypedRecord>, LoadError> {
        if records.is_empty() {
            return Ok(records);
        }

        for derivation in table.derivations {
            match *derivation {
                Derivation::FillEmpty { column, value } => {
                    for record in records.iter_mut().filter(|r| is_blank(r, column)) {
                        record.set(column, Cell::Text(value.to_string()));
                    }
                }
                Derivation::StampReference { column, reference } => {
                    if !records.iter().any(|r| is_blank(r, column)) {
                        continue;
                    }
                    let resolver = ReferenceResolver::new(self.store, self.call_timeout);
                    let cell = match resolver
                        .resolve(&reference)
                        .await
                        .map_err(|e| fatal_store_error(reference.table, e))?
                    {
                        Some(id) => cell_from_json(id),
                        None => {
                            warn!(
                                reference = reference.table,
                                key = reference.key,
                                column,
                                "referenced row not found, stamping null"
                            );
                            Cell::Null
                        }
                    };
                    for record in records.iter_mut().filter(|r| is_blank(r, column)) {
                        record.set(column, cell.clone());
                    }
                }
            }
        }

        Ok(records)
    }
}

fn decode_all(text: &str, policy: &[ColumnRule]) -> Result<Vec<TypedRecord>, csv::Error> {
    Decoder::new(text, policy).records()?.collect()
}

fn is_blank(record: &TypedRecord, column: &str) -> bool {
    record.get(column).map_or(true, Cell::is_blank)
}

fn cell_from_json(v: Value) -> Cell {
    match v {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(b),
        Value::String(s) => Cell::Text(s),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::Float),
        },
        other => Cell::Json(other),
    }
}

fn fatal_store_error(table: &str, e: StoreError) -> LoadError {
    if e.is_undefined_relation() {
        LoadError::MissingRelation {
            table: table.to_string(),
            source: e,
        }
    } else {
        LoadError::Store {
            table: table.to_string(),
            source: e,
        }
    }
}
