//! Cross-corpus duplicate audit.
//!
//! The planner only collapses duplicates that share a file name. Identical
//! content filed under different names still lands at several destinations;
//! the audit finds those by hashing every routed source.

mod hasher;

use crate::planner::PlanEntry;
use crate::progress::ProgressReporter;
use ahash::AHashMap;
use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A planned source and where it will end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Identical content routed to more than one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditViolation {
    pub hash: String,
    pub size: u64,
    pub files: Vec<PathBuf>,
    pub destinations: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub size_groups_checked: usize,
    pub files_hashed: usize,
    pub files_fully_hashed: usize,
    pub unreadable: usize,
    pub violations: Vec<AuditViolation>,
    #[serde(skip)]
    pub duration_secs: f64,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Every source of every entry, canonical and duplicate, with the entry's destination.
pub fn routes_from_plan(entries: &[PlanEntry]) -> Vec<Route> {
    entries
        .iter()
        .flat_map(|entry| {
            entry.sources().map(move |source| Route {
                source: source.to_path_buf(),
                destination: entry.dest.clone(),
            })
        })
        .collect()
}

/// Hash every routed source that shares its byte size with another one and
/// report content that is routed to different destinations.
///
/// Never fails: unreadable files are logged and counted.
pub fn audit(routes: &[Route], reporter: &dyn ProgressReporter) -> AuditReport {
    let start = Instant::now();
    let counters = hasher::HashCounters::default();

    let destinations: AHashMap<&Path, &Path> = routes
        .iter()
        .map(|r| (r.source.as_path(), r.destination.as_path()))
        .collect();

    let size_to_file_map: DashMap<u64, Vec<PathBuf>> = DashMap::new();
    routes.par_iter().for_each(|route| match fs::metadata(&route.source) {
        Ok(metadata) => size_to_file_map
            .entry(metadata.len())
            .or_default()
            .push(route.source.clone()),
        Err(e) => {
            warn!("Cannot stat {}: {}", route.source.display(), e);
            counters.unreadable.fetch_add(1, Ordering::Relaxed);
        }
    });

    let size_groups: Vec<(u64, Vec<PathBuf>)> = size_to_file_map
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .collect();
    let files_to_hash: usize = size_groups.iter().map(|(_, files)| files.len()).sum();

    info!(
        "Auditing {} files in {} size groups for cross-destination duplicates...",
        files_to_hash,
        size_groups.len()
    );
    reporter.on_audit_start(files_to_hash);

    let on_hashed = |hashed: usize| reporter.on_audit_progress(hashed);
    let mut violations: Vec<AuditViolation> = size_groups
        .par_iter()
        .flat_map_iter(|(size, files)| {
            hasher::content_groups(files, &counters, &on_hashed)
                .into_iter()
                .filter_map(|(hash, files)| violation(hash, *size, files, &destinations))
                .collect::<Vec<_>>()
        })
        .collect();
    violations.sort_by(|a, b| (a.size, &a.hash).cmp(&(b.size, &b.hash)));

    let duration_secs = start.elapsed().as_secs_f64();
    let report = AuditReport {
        size_groups_checked: size_groups.len(),
        files_hashed: counters.hashed(),
        files_fully_hashed: counters.full.load(Ordering::Relaxed),
        unreadable: counters.unreadable.load(Ordering::Relaxed),
        violations,
        duration_secs,
    };
    debug!(
        "Audit completed in {:.2}s: {} hashed, {} fully, {} unreadable",
        duration_secs, report.files_hashed, report.files_fully_hashed, report.unreadable
    );
    reporter.on_audit_complete(report.violations.len(), duration_secs);
    report
}

fn violation(
    hash: String,
    size: u64,
    mut files: Vec<PathBuf>,
    destinations: &AHashMap<&Path, &Path>,
) -> Option<AuditViolation> {
    let routed: BTreeSet<PathBuf> = files
        .iter()
        .filter_map(|f| destinations.get(f.as_path()))
        .map(|d| d.to_path_buf())
        .collect();
    if routed.len() < 2 {
        return None;
    }
    files.sort();
    Some(AuditViolation {
        hash,
        size,
        files,
        destinations: routed.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use crate::sidecar::SidecarDocument;

    fn route(source: &Path, destination: &str) -> Route {
        Route {
            source: source.to_path_buf(),
            destination: PathBuf::from(destination),
        }
    }

    #[test]
    fn test_same_content_at_two_destinations_is_a_violation() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("IMG_1.jpg");
        let b = tmp.path().join("copy_of_IMG_1.jpg");
        let c = tmp.path().join("other.jpg");
        fs::write(&a, b"pixels").unwrap();
        fs::write(&b, b"pixels").unwrap();
        fs::write(&c, b"PIXELS").unwrap();

        let routes = vec![
            route(&a, "/out/2021/06/IMG_1.jpg"),
            route(&b, "/out/2021/06/copy_of_IMG_1.jpg"),
            route(&c, "/out/2021/06/other.jpg"),
        ];
        let report = audit(&routes, &SilentReporter);
        assert_eq!(report.size_groups_checked, 1);
        assert_eq!(report.files_hashed, 3);
        assert_eq!(report.violations.len(), 1);

        let v = &report.violations[0];
        assert_eq!(v.size, 6);
        assert_eq!(v.hash, blake3::hash(b"pixels").to_hex().to_string());
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(v.files, expected);
        assert_eq!(
            v.destinations,
            vec![
                PathBuf::from("/out/2021/06/IMG_1.jpg"),
                PathBuf::from("/out/2021/06/copy_of_IMG_1.jpg"),
            ]
        );
    }

    #[test]
    fn test_duplicates_sharing_a_destination_are_fine() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"same").unwrap();

        let entries = vec![PlanEntry {
            src: a,
            dest: PathBuf::from("/out/2021/06/a.jpg"),
            timestamp: 0.0,
            provenance: vec![],
            merged_json: SidecarDocument::new(),
            duplicates: vec![b],
        }];
        let routes = routes_from_plan(&entries);
        assert_eq!(routes.len(), 2);
        assert!(audit(&routes, &SilentReporter).is_clean());
    }

    #[test]
    fn test_missing_sources_are_counted_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let routes = vec![route(&tmp.path().join("gone.jpg"), "/out/gone.jpg")];
        let report = audit(&routes, &SilentReporter);
        assert_eq!(report.unreadable, 1);
        assert!(report.is_clean());
    }
}
