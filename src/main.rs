use anyhow::{Context, Result};
use clap::Parser;
use dataseed::{
    config::{log_filter, Args, SeedConfig},
    load::LoadStatus,
    pipeline::{RunState, RunSummary},
    seed,
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging (.env loaded first, it may set RUST_LOG) ────
    let env = log_filter(None, "info");
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configuration: flags / environment ───────────────────────
    let config = SeedConfig::from_args(Args::parse()).context("invalid configuration")?;
    info!(
        source_dir = %config.source_dir.display(),
        dry_run = config.dry_run,
        "configured"
    );

    // ─── 3) seed once ────────────────────────────────────────────────
    let summary = seed::run(&config).await?;
    print_summary(&summary);

    // ─── 4) map terminal state to exit code ──────────────────────────
    match (&summary.state, &summary.failure) {
        (RunState::Completed, _) => {
            info!("seed completed");
            Ok(ExitCode::SUCCESS)
        }
        (_, Some(report)) => {
            error!(table = %report.table, "seed aborted");
            eprintln!("seed aborted at `{}`: {}", report.table, report.message);
            eprintln!("failure report: {}", config.failure_report.display());
            Ok(ExitCode::FAILURE)
        }
        (state, None) => {
            eprintln!("seed ended in unexpected state {}", state);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "\n{: <16} {:>10} {:>10} {:>10} {:>10}",
        "Table", "Attempted", "Upserted", "Rejected", "Status"
    );
    println!("{:-<60}", "");
    for outcome in &summary.outcomes {
        println!(
            "{: <16} {:>10} {:>10} {:>10} {:>10}",
            outcome.table,
            outcome.attempted,
            outcome.upserted(),
            outcome.rejected,
            outcome.label()
        );
        if let LoadStatus::Degraded { reason } = &outcome.status {
            println!("  ↳ {}", reason);
        }
    }
    for table in &summary.not_attempted {
        println!("{: <16} {:>10} {:>10} {:>10} {:>10}", table, "-", "-", "-", "not run");
    }
}
