// src/seed.rs

use anyhow::{bail, Context, Result};
use glob::glob;
use std::{collections::HashSet, path::Path};
use tracing::{info, warn};

use crate::catalog::{self, TableDescriptor, TABLES};
use crate::config::{ConfigError, SeedConfig};
use crate::load::TableLoader;
use crate::pipeline::{Pipeline, RunSummary};
use crate::store::{MemoryStore, RestStore, Store};

/// Run the whole seed once with the store the configuration selects.
pub async fn run(config: &SeedConfig) -> Result<RunSummary> {
    match (&config.store, config.dry_run) {
        (_, true) => {
            info!("dry run: writing to an in-memory store");
            let store = MemoryStore::new();
            run_with_store(config, &store).await
        }
        (Some(store_cfg), false) => {
            info!(url = %store_cfg.url, "seeding target store");
            let store = RestStore::new(&store_cfg.url, &store_cfg.api_key)?;
            run_with_store(config, &store).await
        }
        (None, false) => bail!(ConfigError::MissingStoreUrl),
    }
}

/// Same as [`run`] against a caller-supplied store.
pub async fn run_with_store<S: Store + ?Sized>(
    config: &SeedConfig,
    store: &S,
) -> Result<RunSummary> {
    // 1) the catalog must be coherent before anything is written
    catalog::validate(TABLES).context("invalid table catalog")?;

    // 2) flag exports nobody will load
    for name in unclaimed_sources(&config.source_dir, TABLES)? {
        warn!(file = %name, "CSV in source directory is not loaded by any table");
    }

    // 3) sequence the loaders
    let loader = TableLoader::new(store, &config.source_dir, config.store_timeout);
    let summary = Pipeline::new(TABLES, loader, &config.failure_report)
        .run()
        .await;
    info!(state = %summary.state, tables = summary.outcomes.len(), "seed run finished");
    Ok(summary)
}

/// `*.csv` files in `dir` that no descriptor reads, sorted by name.
pub fn unclaimed_sources(dir: &Path, tables: &[TableDescriptor]) -> Result<Vec<String>> {
    let claimed: HashSet<&str> = catalog::source_files(tables).into_iter().collect();
    let pattern = format!("{}/*.csv", glob::Pattern::escape(&dir.display().to_string()));

    let mut unclaimed = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("bad glob pattern `{}`", pattern))? {
        let path = entry.context("reading source directory")?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if !claimed.contains(name) {
                unclaimed.push(name.to_string());
            }
        }
    }
    unclaimed.sort();
    Ok(unclaimed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunState;
    use std::{fs, time::Duration};
    use tempfile::tempdir;

    fn dry_config(dir: &Path) -> SeedConfig {
        SeedConfig {
            store: None,
            source_dir: dir.to_path_buf(),
            failure_report: dir.join("seed_failure.txt"),
            store_timeout: Duration::from_secs(5),
            dry_run: true,
        }
    }

    #[test]
    fn lists_unclaimed_csv_files() {
        let dir = tempdir().unwrap();
        for name in ["orders.csv", "orders_backup.csv", "notes.txt", "a_extra.csv"] {
            fs::write(dir.path().join(name), "id\n").unwrap();
        }
        let unclaimed = unclaimed_sources(dir.path(), TABLES).unwrap();
        assert_eq!(unclaimed, vec!["a_extra.csv", "orders_backup.csv"]);
    }

    #[tokio::test]
    async fn dry_run_exercises_the_whole_pipeline() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("categories.csv"), "id,name\n1,Pizzas\n").unwrap();
        fs::write(dir.path().join("clients.csv"), "id,name\n1,Ana\n").unwrap();
        fs::write(
            dir.path().join("orders.csv"),
            "id,customer_name,subtotal,total\n1,Ana,3,3\n",
        )
        .unwrap();
        fs::write(dir.path().join("products.csv"), "id,name,price\n1,Agua,1.5\n").unwrap();

        let summary = run(&dry_config(dir.path())).await.unwrap();
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.outcome("orders").unwrap().upserted(), 1);
    }

    #[tokio::test]
    async fn missing_store_without_dry_run_is_an_error() {
        let dir = tempdir().unwrap();
        for name in ["categories.csv", "clients.csv", "orders.csv", "products.csv"] {
            fs::write(dir.path().join(name), "id\n").unwrap();
        }
        let config = SeedConfig {
            dry_run: false,
            ..dry_config(dir.path())
        };

        let err = run(&config).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingStoreUrl)
        );
        assert!(!dir.path().join("seed_failure.txt").exists());
    }

    #[tokio::test]
    async fn aborted_runs_are_still_ok_results() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        let summary = run_with_store(&dry_config(dir.path()), &store).await.unwrap();
        assert_eq!(summary.state, RunState::Aborted);
        assert_eq!(summary.failure.unwrap().table, "categories");
        assert!(dir.path().join("seed_failure.txt").exists());
    }
}
