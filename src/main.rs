mod cli;
mod logging;
mod reporter;

use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::*;
use dotenv::dotenv;
use reporter::CliReporter;
use takeout_tidy::artifacts;
use takeout_tidy::config::{self, AppConfig};
use takeout_tidy::stats::RunSummary;
use takeout_tidy::{mover, verify, Error, Pipeline};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let code = match args.command {
        Some(command) => match run_command(command, config) {
            Ok(code) => code,
            Err(err) => {
                report_error(&err);
                1
            }
        },
        None => {
            let _ = Cli::command().print_long_help();
            0
        }
    };

    drop(guard);
    process::exit(code);
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(Error::MergeConflict(conflict)) => {
            error!("Planning aborted, no plan was written:\n{}", conflict);
        }
        _ => error!("Error: {:#}", err),
    }
}

fn run_command(command: Commands, mut config: AppConfig) -> anyhow::Result<i32> {
    let reporter = CliReporter::new();

    match command {
        Commands::Scan { roots } => {
            if !roots.is_empty() {
                config.root_paths = roots;
            }
            let pipeline = Pipeline::new(config);
            let scan = pipeline.scan(&reporter)?;
            artifacts::write_file_list(&pipeline.config().file_list_path(), &scan.file_list)?;
            info!(
                "{} media, {} sidecars, {} ignored, {} unknown extensions",
                format!("{}", scan.file_list.media.len()).green(),
                format!("{}", scan.file_list.json.len()).green(),
                format!("{}", scan.ignored).yellow(),
                format!("{}", scan.unknown.len()).yellow(),
            );

            let mut summary = RunSummary::new("scan");
            summary.record_scan(&scan);
            finish(&summary, pipeline.config());
            Ok(0)
        }
        Commands::Pair => {
            let pipeline = Pipeline::new(config);
            let file_list = artifacts::read_file_list(&pipeline.config().file_list_path())
                .context("run `scan` first")?;
            let pairing = pipeline.pair(&file_list, &reporter);
            artifacts::write_pairs(&pipeline.config().pairs_path(), &pairing.pairs)?;
            for (strategy, count) in &pairing.stats.by_strategy {
                info!("{:<30} {}", strategy, format!("{}", count).cyan());
            }

            let mut summary = RunSummary::new("pair");
            summary.record_pairing(&pairing);
            finish(&summary, pipeline.config());
            Ok(0)
        }
        Commands::Plan => {
            let pipeline = Pipeline::new(config);
            let pairs = artifacts::read_pairs(&pipeline.config().pairs_path())
                .context("run `pair` first")?;
            let mut summary = RunSummary::new("plan");
            summary.record_pairs(&pairs);
            let plan = match pipeline.plan(&pairs, &reporter) {
                Ok(plan) => plan,
                Err(err) => {
                    if let Error::MergeConflict(conflict) = &err {
                        summary.record_conflict(conflict);
                        finish(&summary, pipeline.config());
                    }
                    return Err(err.into());
                }
            };
            artifacts::write_plan(&pipeline.config().plan_path(), &plan.entries)?;
            info!(
                "{} moves planned, {} duplicates collapsed, {} renamed",
                format!("{}", plan.stats.entries).green(),
                format!("{}", plan.stats.duplicates_collapsed).cyan(),
                format!("{}", plan.stats.renamed).cyan(),
            );

            summary.record_plan(&plan);
            finish(&summary, pipeline.config());
            Ok(0)
        }
        Commands::Audit => {
            let pipeline = Pipeline::new(config);
            let entries = artifacts::read_plan(&pipeline.config().plan_path())
                .context("run `plan` first")?;
            let audit = pipeline.audit(&entries, &reporter);
            artifacts::write_audit(&pipeline.config().audit_path(), &audit)?;
            print_audit(&audit);

            let mut summary = RunSummary::new("audit");
            summary.record_audit(&audit);
            finish(&summary, pipeline.config());
            Ok(0)
        }
        Commands::Apply { dry_run } => {
            let entries = artifacts::read_plan(&config.plan_path()).context("run `plan` first")?;
            let stats = mover::apply(&entries, dry_run, &reporter);
            if dry_run {
                info!("{}", "DRY RUN - no files were moved".yellow());
            }
            info!(
                "{} moved, {} skipped (destination exists), {} errors",
                format!("{}", stats.moved).green(),
                format!("{}", stats.skipped).yellow(),
                format!("{}", stats.errors).red(),
            );
            for message in &stats.first_errors {
                error!("{}", message);
            }

            let mut summary = RunSummary::new(if dry_run { "apply --dry-run" } else { "apply" });
            summary.record_apply(&stats);
            finish(&summary, &config);
            Ok(if stats.errors > 0 { 1 } else { 0 })
        }
        Commands::Verify => {
            let pairs = artifacts::read_pairs(&config.pairs_path()).context("run `pair` first")?;
            let entries = artifacts::read_plan(&config.plan_path()).context("run `plan` first")?;
            let roots = config::non_overlapping_directories(config.root_paths.clone());
            let roots: Vec<&str> = roots.iter().map(String::as_str).collect();
            let report = verify::remaining(&pairs, &entries, &roots, &config)?;

            info!(
                "Expected remaining: {}, actually remaining: {}, unexpected: {}, missing: {}",
                report.expected_remaining,
                report.actually_remaining,
                format!("{}", report.unexpected.len()).red(),
                format!("{}", report.missing.len()).red(),
            );
            if report.is_clean() {
                info!("{}", "All remaining files are the expected duplicates".green());
                Ok(0)
            } else {
                Ok(1)
            }
        }
        Commands::Run => {
            let pipeline = Pipeline::new(config);
            let mut summary = RunSummary::new("run");
            let result = pipeline.run(&reporter, &mut summary);
            if let Ok(run) = &result {
                print_audit(&run.audit);
            }
            finish(&summary, pipeline.config());
            result?;
            Ok(0)
        }
        Commands::PrintConfig => {
            match toml::to_string_pretty(&config) {
                Ok(text) => println!("{}", text),
                Err(_) => println!("Configuration: {:?}", config),
            }
            Ok(0)
        }
    }
}

fn print_audit(audit: &takeout_tidy::auditor::AuditReport) {
    info!(
        "Size groups checked: {}, files hashed: {}, unreadable: {}",
        audit.size_groups_checked, audit.files_hashed, audit.unreadable
    );
    if audit.is_clean() {
        info!("{}", "No cross-file duplicates found".green());
        return;
    }
    warn!(
        "{} potential cross-file duplicates",
        format!("{}", audit.violations.len()).red()
    );
    for violation in audit.violations.iter().take(5) {
        warn!(
            "Hash {}... size {}: {} files",
            &violation.hash[..violation.hash.len().min(8)],
            violation.size,
            violation.files.len()
        );
        for file in violation.files.iter().take(3) {
            warn!("    - {}", file.display());
        }
    }
}

fn finish(summary: &RunSummary, config: &AppConfig) {
    summary.print();
    if let Err(err) = summary.write_csv(&config.summary_csv_path()) {
        warn!("Could not append run summary: {}", err);
    }
}
