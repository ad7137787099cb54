use crate::artifacts::{self, FileList, PairingMap};
use crate::auditor::{self, AuditReport};
use crate::config::{self, AppConfig};
use crate::error::{ClusterConflict, Error};
use crate::mover::ApplyStats;
use crate::planner::{Plan, PlanEntry, Planner};
use crate::progress::ProgressReporter;
use crate::resolver::SidecarResolver;
use crate::scanner;
use crate::stats::{RunSummary, StatsTimer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const EXAMPLES_LOGGED: usize = 10;

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct ScanResult {
    pub file_list: FileList,
    pub ignored: usize,
    /// Unknown extension -> (count, example path).
    pub unknown: BTreeMap<String, (usize, PathBuf)>,
    pub total_files: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingStats {
    pub total: usize,
    pub matched: usize,
    pub missing: usize,
    /// Scanned sidecars no media file resolved to.
    pub orphan_sidecars: usize,
    /// Strategy name -> matches.
    pub by_strategy: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct PairingResult {
    pub pairs: PairingMap,
    pub stats: PairingStats,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct RunResult {
    pub scan: ScanResult,
    pub pairing: PairingResult,
    pub plan: Plan,
    pub audit: AuditReport,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Walk the configured roots and classify what is there.
    pub fn scan(&self, reporter: &dyn ProgressReporter) -> Result<ScanResult, Error> {
        if self.config.root_paths.is_empty() {
            return Err(Error::Other("No root paths configured".to_string()));
        }
        let non_overlapping = config::non_overlapping_directories(self.config.root_paths.clone());
        info!("Processing directories: {:?}", non_overlapping);

        let root_path_slices: Vec<&str> = non_overlapping.iter().map(|s| s.as_str()).collect();
        let ignore_pattern_slices: Vec<&str> =
            self.config.ignore_patterns.iter().map(|s| s.as_str()).collect();

        info!("Scanning files...");
        reporter.on_scan_start();
        let timer = StatsTimer::new();
        let output = scanner::classify_files(
            &root_path_slices,
            &ignore_pattern_slices,
            &self.config.media_extensions,
            &self.config.sidecar_extension,
            |seen| reporter.on_scan_progress(seen),
        )?;
        let duration = timer.finish();
        let total_files = output.total_files();
        reporter.on_scan_complete(total_files, duration.as_secs_f64());

        debug!(
            "Scan completed in {:.2}s: {} media, {} sidecars, {} ignored",
            duration.as_secs_f64(),
            output.media.len(),
            output.sidecars.len(),
            output.ignored,
        );
        for (extension, (count, example)) in &output.unknown {
            warn!(
                "Unknown extension '{}': {} files (e.g. {})",
                extension,
                count,
                example.display()
            );
        }

        Ok(ScanResult {
            file_list: FileList {
                media: output.media,
                json: output.sidecars,
            },
            ignored: output.ignored,
            unknown: output.unknown,
            total_files,
            duration,
        })
    }

    /// Resolve the sidecar of every scanned media file.
    pub fn pair(&self, file_list: &FileList, reporter: &dyn ProgressReporter) -> PairingResult {
        let resolver = SidecarResolver::new(self.config.resolver.clone());
        let mut stats = PairingStats {
            total: file_list.media.len(),
            ..PairingStats::default()
        };
        let mut pairs = PairingMap::new();
        let mut misses: Vec<&PathBuf> = Vec::new();

        info!("Pairing {} media files with sidecars...", file_list.media.len());
        reporter.on_pair_start(file_list.media.len());
        let timer = StatsTimer::new();

        for (i, media) in file_list.media.iter().enumerate() {
            let resolution = resolver.resolve_with_strategy(media);
            match &resolution {
                Some(found) => {
                    stats.matched += 1;
                    *stats.by_strategy.entry(found.strategy.to_string()).or_default() += 1;
                }
                None => {
                    stats.missing += 1;
                    if misses.len() < EXAMPLES_LOGGED {
                        misses.push(media);
                    }
                }
            }
            pairs.insert(media.clone(), resolution.map(|r| r.sidecar));
            reporter.on_pair_progress(i + 1);
        }

        let claimed: BTreeSet<&PathBuf> = pairs.values().flatten().collect();
        let orphans: Vec<&PathBuf> = file_list
            .json
            .iter()
            .filter(|sidecar| !claimed.contains(sidecar))
            .collect();
        stats.orphan_sidecars = orphans.len();

        let duration = timer.finish();
        reporter.on_pair_complete(stats.matched, stats.missing, duration.as_secs_f64());

        for media in misses {
            debug!("No sidecar for {}", media.display());
        }
        for sidecar in orphans.iter().take(EXAMPLES_LOGGED) {
            debug!("Orphan sidecar {}", sidecar.display());
        }
        for (strategy, count) in &stats.by_strategy {
            debug!("  {:<30} {}", strategy, count);
        }
        info!(
            "Pairing complete: {} matched, {} missing, {} orphan sidecars",
            stats.matched, stats.missing, stats.orphan_sidecars
        );

        PairingResult {
            pairs,
            stats,
            duration,
        }
    }

    pub fn plan(&self, pairs: &PairingMap, reporter: &dyn ProgressReporter) -> Result<Plan, Error> {
        Planner::new(self.config.output_dir.clone(), self.config.merge.clone()).plan(pairs, reporter)
    }

    pub fn audit(&self, entries: &[PlanEntry], reporter: &dyn ProgressReporter) -> AuditReport {
        let routes = auditor::routes_from_plan(entries);
        let report = auditor::audit(&routes, reporter);
        for violation in report.violations.iter().take(EXAMPLES_LOGGED) {
            warn!(
                "Same content routed to {} destinations (size {}, hash {}): {:?}",
                violation.destinations.len(),
                violation.size,
                &violation.hash[..violation.hash.len().min(8)],
                violation.destinations
            );
        }
        report
    }

    /// scan -> pair -> plan -> audit, writing every artifact under `work_dir`.
    /// Each phase is recorded in `summary` as it completes, so the summary
    /// is still meaningful when a merge conflict stops the run before the
    /// plan is written.
    pub fn run(
        &self,
        reporter: &dyn ProgressReporter,
        summary: &mut RunSummary,
    ) -> Result<RunResult, Error> {
        let scan = self.scan(reporter)?;
        summary.record_scan(&scan);
        artifacts::write_file_list(&self.config.file_list_path(), &scan.file_list)?;

        let pairing = self.pair(&scan.file_list, reporter);
        summary.record_pairing(&pairing);
        artifacts::write_pairs(&self.config.pairs_path(), &pairing.pairs)?;

        let plan = match self.plan(&pairing.pairs, reporter) {
            Ok(plan) => plan,
            Err(err) => {
                if let Error::MergeConflict(conflict) = &err {
                    summary.record_conflict(conflict);
                }
                return Err(err);
            }
        };
        summary.record_plan(&plan);
        artifacts::write_plan(&self.config.plan_path(), &plan.entries)?;

        let audit = self.audit(&plan.entries, reporter);
        summary.record_audit(&audit);
        artifacts::write_audit(&self.config.audit_path(), &audit)?;

        Ok(RunResult {
            scan,
            pairing,
            plan,
            audit,
        })
    }
}

impl RunSummary {
    pub fn record_scan(&mut self, scan: &ScanResult) {
        self.scan_duration = scan.duration;
        self.media_files = scan.file_list.media.len();
        self.sidecar_files = scan.file_list.json.len();
    }

    pub fn record_pairing(&mut self, pairing: &PairingResult) {
        self.pair_duration = pairing.duration;
        self.matched = pairing.stats.matched;
        self.missing = pairing.stats.missing;
        self.orphan_sidecars = pairing.stats.orphan_sidecars;
    }

    pub fn record_plan(&mut self, plan: &Plan) {
        self.plan_duration = plan.duration;
        self.undated = plan.stats.undated;
        self.planned_moves = plan.stats.entries;
        self.merged_clusters = plan.stats.merged_clusters;
        self.duplicates_collapsed = plan.stats.duplicates_collapsed;
        self.renamed = plan.stats.renamed;
        self.conflicting = plan.stats.conflicting;
    }

    /// Planning failed; only the conflict count is known.
    pub fn record_conflict(&mut self, conflict: &ClusterConflict) {
        self.conflicting = conflict.conflicting;
    }

    /// Matched and missing counts from a `pairs.json` loaded off disk.
    pub fn record_pairs(&mut self, pairs: &PairingMap) {
        self.matched = pairs.values().filter(|sidecar| sidecar.is_some()).count();
        self.missing = pairs.len() - self.matched;
    }

    pub fn record_audit(&mut self, audit: &AuditReport) {
        self.audit_duration = Duration::from_secs_f64(audit.duration_secs);
        self.audit_violations = audit.violations.len();
    }

    pub fn record_apply(&mut self, apply: &ApplyStats) {
        self.apply_duration = Duration::from_secs_f64(apply.duration_secs);
        self.moved = apply.moved;
        self.move_errors = apply.errors;
    }
}
