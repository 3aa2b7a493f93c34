// src/bin/verify_tables.rs
//
// Probe every table the seeder writes and report which ones are missing.

use anyhow::{Context, Result};
use clap::Parser;
use dataseed::{
    catalog::TABLES,
    config::{log_filter, Args, StoreConfig},
    store::RestStore,
    verify::{probe_tables, TableStatus},
};
use std::{process::ExitCode, time::Duration};
use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env = log_filter(None, "warn");
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    let store_cfg = StoreConfig::from_args(&args).context("invalid configuration")?;
    let store = RestStore::new(&store_cfg.url, &store_cfg.api_key)?;
    let timeout = Duration::from_secs(args.store_timeout_secs.max(1));

    let results = probe_tables(&store, TABLES, timeout).await;

    println!("\n{: <16} {}", "Table", "Status");
    println!("{:-<40}", "");
    let mut failures = 0;
    for (table, status) in &results {
        let text = match status {
            TableStatus::Exists => "ok".to_string(),
            TableStatus::Missing => "MISSING".to_string(),
            TableStatus::AccessError(e) => format!("error: {}", e),
        };
        if !status.is_ok() {
            failures += 1;
        }
        println!("{: <16} {}", table, text);
    }

    if failures > 0 {
        eprintln!("{} of {} tables unavailable", failures, results.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
