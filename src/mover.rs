use crate::artifacts;
use crate::error::Error;
use crate::planner::PlanEntry;
use crate::progress::ProgressReporter;
use crate::sidecar::PROVENANCE;
use serde_json::Value;
use std::fs::{self, FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyStats {
    pub planned: usize,
    /// Entries moved, or that would be moved in a dry run.
    pub moved: usize,
    /// Destination already exists.
    pub skipped: usize,
    pub errors: usize,
    pub first_errors: Vec<String>,
    pub dry_run: bool,
    pub duration_secs: f64,
}

impl ApplyStats {
    fn record_error(&mut self, message: String) {
        warn!("{}", message);
        self.errors += 1;
        if self.first_errors.len() < MAX_REPORTED_ERRORS {
            self.first_errors.push(message);
        }
    }
}

/// Execute a move plan. Per-entry failures are counted and the run continues.
pub fn apply(entries: &[PlanEntry], dry_run: bool, reporter: &dyn ProgressReporter) -> ApplyStats {
    let start = Instant::now();
    let mut stats = ApplyStats {
        planned: entries.len(),
        dry_run,
        ..ApplyStats::default()
    };

    if dry_run {
        info!("DRY RUN: no files will be moved");
    }
    info!("Executing {} planned moves...", entries.len());
    reporter.on_apply_start(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        reporter.on_apply_progress(i + 1);

        if !entry.src.exists() {
            stats.record_error(format!("Source not found: {}", entry.src.display()));
            continue;
        }
        if entry.dest.exists() {
            debug!("SKIP: Destination exists: {}", entry.dest.display());
            stats.skipped += 1;
            continue;
        }
        if dry_run {
            debug!("Would move {} -> {}", entry.src.display(), entry.dest.display());
            stats.moved += 1;
            continue;
        }

        match move_entry(entry) {
            Ok(()) => stats.moved += 1,
            Err(e) => stats.record_error(format!("Error processing {}: {}", entry.src.display(), e)),
        }
    }

    stats.duration_secs = start.elapsed().as_secs_f64();
    reporter.on_apply_complete(stats.moved, stats.duration_secs);
    info!(
        "Move complete: {} moved, {} skipped, {} errors",
        stats.moved, stats.skipped, stats.errors
    );
    stats
}

fn move_entry(entry: &PlanEntry) -> Result<(), Error> {
    if let Some(parent) = entry.dest.parent() {
        fs::create_dir_all(parent)?;
    }
    move_file(&entry.src, &entry.dest)?;
    stamp_times(&entry.dest, entry.timestamp)?;

    let mut metadata = entry.merged_json.clone();
    metadata.insert(
        PROVENANCE,
        Value::Array(entry.provenance.iter().cloned().map(Value::String).collect()),
    );
    artifacts::write_json(&sidecar_destination(&entry.dest), &metadata)
}

/// `<dest>.json`
pub fn sidecar_destination(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                "rename {} failed ({}), copying instead",
                src.display(),
                rename_err
            );
            fs::copy(src, dest)?;
            fs::remove_file(src)
        }
    }
}

/// Set access and modification time to `timestamp` (epoch seconds).
fn stamp_times(path: &Path, timestamp: f64) -> io::Result<()> {
    let time = system_time(timestamp);
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(time).set_modified(time))
}

fn system_time(timestamp: f64) -> SystemTime {
    let offset = Duration::from_secs_f64(timestamp.abs());
    if timestamp >= 0.0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use crate::sidecar::SidecarDocument;
    use serde_json::json;

    fn entry(src: PathBuf, dest: PathBuf) -> PlanEntry {
        let mut doc = SidecarDocument::new();
        doc.insert("title", json!("a.jpg"));
        PlanEntry {
            src,
            dest,
            timestamp: 1609459200.0,
            provenance: vec!["Trip".to_string()],
            merged_json: doc,
            duplicates: vec![],
        }
    }

    #[test]
    fn test_apply_moves_stamps_and_writes_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Trip").join("a.jpg");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"img").unwrap();
        let dest = tmp.path().join("out/2021/01/a.jpg");

        let stats = apply(&[entry(src.clone(), dest.clone())], false, &SilentReporter);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.errors, 0);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"img");

        let modified = fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1609459200
        );

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(sidecar_destination(&dest)).unwrap()).unwrap();
        assert_eq!(written, json!({"title": "a.jpg", "provenance": ["Trip"]}));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.jpg");
        fs::write(&src, b"img").unwrap();
        let dest = tmp.path().join("out/2021/01/a.jpg");

        let stats = apply(&[entry(src.clone(), dest.clone())], true, &SilentReporter);
        assert_eq!(stats.moved, 1);
        assert!(stats.dry_run);
        assert!(src.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_existing_destination_is_skipped_and_missing_source_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.jpg");
        let dest = tmp.path().join("taken.jpg");
        fs::write(&src, b"img").unwrap();
        fs::write(&dest, b"other").unwrap();

        let entries = vec![
            entry(src.clone(), dest.clone()),
            entry(tmp.path().join("gone.jpg"), tmp.path().join("gone_dest.jpg")),
        ];
        let stats = apply(&entries, false, &SilentReporter);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.moved, 0);
        assert!(stats.first_errors[0].contains("gone.jpg"));
        assert!(src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"other");
    }
}
