use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "takeout-tidy")]
#[command(about = "Reconcile a media export and its sidecar metadata into a dated library", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan export directories and write file_list.json
    Scan {
        /// Directories to scan (default: root_paths from the configuration)
        roots: Vec<String>,
    },
    /// Resolve sidecars for scanned media and write pairs.json
    Pair,
    /// Plan destinations, merge duplicate metadata and write move_plan.json
    Plan,
    /// Check the plan for identical content routed to different destinations
    Audit,
    /// Execute move_plan.json
    Apply {
        /// Show what would be done without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that only expected duplicates remain in the export
    Verify,
    /// scan, pair, plan and audit in one go
    Run,
    /// Print configuration values
    PrintConfig,
}
