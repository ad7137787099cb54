//! Post-move check that the source tree holds only expected leftovers.

use crate::artifacts::PairingMap;
use crate::config::AppConfig;
use crate::error::Error;
use crate::planner::PlanEntry;
use crate::scanner;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Paired media that the plan did not move.
    pub expected_remaining: usize,
    pub actually_remaining: usize,
    /// Still in the source tree but should have moved.
    pub unexpected: Vec<PathBuf>,
    /// Expected to remain but gone.
    pub missing: Vec<PathBuf>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.unexpected.is_empty() && self.missing.is_empty()
    }
}

/// Compare the media left under `roots` with what the plan left behind.
pub fn remaining(
    pairs: &PairingMap,
    plan: &[PlanEntry],
    roots: &[&str],
    config: &AppConfig,
) -> Result<VerifyReport, Error> {
    let moved: BTreeSet<&PathBuf> = plan.iter().map(|entry| &entry.src).collect();
    let expected: BTreeSet<&PathBuf> = pairs.keys().filter(|src| !moved.contains(src)).collect();

    let ignore: Vec<&str> = config.ignore_patterns.iter().map(String::as_str).collect();
    info!("Scanning {:?} for remaining media...", roots);
    let scan = scanner::classify_files(
        roots,
        &ignore,
        &config.media_extensions,
        &config.sidecar_extension,
        |_| {},
    )?;
    let found: BTreeSet<&PathBuf> = scan.media.iter().collect();

    let unexpected: Vec<PathBuf> = found.difference(&expected).map(|p| (*p).clone()).collect();
    let missing: Vec<PathBuf> = expected.difference(&found).map(|p| (*p).clone()).collect();

    for path in unexpected.iter().take(10) {
        warn!("Unexpected remaining file: {}", path.display());
    }
    for path in missing.iter().take(10) {
        warn!("Expected file is missing: {}", path.display());
    }

    Ok(VerifyReport {
        expected_remaining: expected.len(),
        actually_remaining: found.len(),
        unexpected,
        missing,
    })
}
