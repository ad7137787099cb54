//! Destination planning.
//!
//! Map: every paired, dated source gets a nominal destination
//! `<output>/<YYYY>/<MM>/<name>`. Reduce: sources sharing a nominal
//! destination are split by byte size into content clusters; each cluster
//! becomes one plan entry with a merged sidecar, and every cluster after
//! the first is renamed `<stem>_<i><.ext>`, skipping any `i` whose name is
//! already a destination.

mod partition;

pub use partition::{nominal_destination, partition_by_size, provenance, renamed_destination, Candidate};

use crate::error::{ClusterConflict, Error};
use crate::merge::MergePolicy;
use crate::progress::ProgressReporter;
use crate::sidecar::{self, SidecarDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One move: a canonical source, its final destination and merged metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub src: PathBuf,
    pub dest: PathBuf,
    /// Epoch seconds.
    pub timestamp: f64,
    pub provenance: Vec<String>,
    pub merged_json: SidecarDocument,
    /// Other members of the content cluster; they stay where they are.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<PathBuf>,
}

impl PlanEntry {
    /// The canonical source followed by its duplicates.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.src.as_path()).chain(self.duplicates.iter().map(PathBuf::as_path))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub total_sources: usize,
    /// Paired sources that no longer exist on disk.
    pub vanished: usize,
    pub missing: usize,
    pub undated: usize,
    pub destinations: usize,
    pub entries: usize,
    /// Clusters with more than one member.
    pub merged_clusters: usize,
    pub duplicates_collapsed: usize,
    pub renamed: usize,
    pub conflicting: usize,
}

#[derive(Debug)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub stats: PlanStats,
    pub duration: Duration,
}

pub struct Planner {
    output_dir: PathBuf,
    policy: MergePolicy,
}

impl Planner {
    pub fn new(output_dir: impl Into<PathBuf>, policy: MergePolicy) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
        }
    }

    /// Build the move plan for `pairs` (media path -> sidecar path).
    ///
    /// Every conflicting cluster is logged; the first one is returned as
    /// `Error::MergeConflict`, carrying the total conflict count, and no
    /// plan is produced.
    pub fn plan(
        &self,
        pairs: &BTreeMap<PathBuf, Option<PathBuf>>,
        reporter: &dyn ProgressReporter,
    ) -> Result<Plan, Error> {
        let start = Instant::now();
        let mut stats = PlanStats {
            total_sources: pairs.len(),
            ..PlanStats::default()
        };

        info!("Mapping {} sources to destinations...", pairs.len());
        reporter.on_plan_start(pairs.len());
        let groups = self.map_sources(pairs, &mut stats, reporter);
        stats.destinations = groups.len();
        debug!("{} distinct nominal destinations", groups.len());

        info!("Resolving destination collisions...");
        let mut entries = Vec::with_capacity(groups.len());
        let mut first_conflict: Option<ClusterConflict> = None;
        let mut taken: BTreeSet<PathBuf> = groups.keys().cloned().collect();

        for (nominal, candidates) in groups {
            if candidates.len() == 1 {
                let candidate = &candidates[0];
                entries.push(PlanEntry {
                    src: candidate.source.clone(),
                    dest: nominal,
                    timestamp: candidate.timestamp,
                    provenance: provenance([candidate.source.as_path()]),
                    merged_json: SidecarDocument::load_or_empty(&candidate.sidecar).sanitize(),
                    duplicates: Vec::new(),
                });
                continue;
            }

            let mut suffix = 0;
            for (index, (size, cluster)) in partition_by_size(candidates).into_iter().enumerate() {
                let dest = if index == 0 {
                    nominal.clone()
                } else {
                    stats.renamed += 1;
                    loop {
                        suffix += 1;
                        let renamed = renamed_destination(&nominal, suffix);
                        if taken.insert(renamed.clone()) {
                            break renamed;
                        }
                        debug!("{} is taken, trying the next suffix", renamed.display());
                    }
                };

                match self.reduce_cluster(dest, size, cluster) {
                    Ok(entry) => {
                        if !entry.duplicates.is_empty() {
                            stats.merged_clusters += 1;
                            stats.duplicates_collapsed += entry.duplicates.len();
                        }
                        entries.push(entry);
                    }
                    Err(conflict) => {
                        error!("CRITICAL ERROR: JSON merge failed\n{}", conflict);
                        stats.conflicting += 1;
                        first_conflict.get_or_insert(conflict);
                    }
                }
            }
        }

        if let Some(mut conflict) = first_conflict {
            conflict.conflicting = stats.conflicting;
            return Err(Error::MergeConflict(Box::new(conflict)));
        }

        stats.entries = entries.len();
        let duration = start.elapsed();
        reporter.on_plan_complete(entries.len(), duration.as_secs_f64());
        info!(
            "Planning complete: {} moves, {} duplicates, {} renamed",
            stats.entries, stats.duplicates_collapsed, stats.renamed
        );

        Ok(Plan {
            entries,
            stats,
            duration,
        })
    }

    fn map_sources(
        &self,
        pairs: &BTreeMap<PathBuf, Option<PathBuf>>,
        stats: &mut PlanStats,
        reporter: &dyn ProgressReporter,
    ) -> BTreeMap<PathBuf, Vec<Candidate>> {
        let mut groups: BTreeMap<PathBuf, Vec<Candidate>> = BTreeMap::new();

        for (i, (source, sidecar)) in pairs.iter().enumerate() {
            reporter.on_plan_progress(i + 1);

            let size = match fs::metadata(source) {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    debug!("Source {} is gone: {}", source.display(), e);
                    stats.vanished += 1;
                    continue;
                }
            };
            let Some(sidecar) = sidecar else {
                debug!("SKIP: No JSON for {}", source.display());
                stats.missing += 1;
                continue;
            };
            let Some(timestamp) = sidecar::capture_time(sidecar) else {
                debug!("SKIP: No date in JSON for {}", source.display());
                stats.undated += 1;
                continue;
            };
            let Some(nominal) = nominal_destination(&self.output_dir, timestamp, source) else {
                warn!("Timestamp {} of {} is out of range", timestamp, source.display());
                stats.undated += 1;
                continue;
            };

            groups.entry(nominal).or_default().push(Candidate {
                source: source.clone(),
                sidecar: sidecar.clone(),
                timestamp,
                size,
            });
        }

        groups
    }

    fn reduce_cluster(
        &self,
        dest: PathBuf,
        size: u64,
        cluster: Vec<Candidate>,
    ) -> Result<PlanEntry, ClusterConflict> {
        let docs: Vec<SidecarDocument> = cluster
            .iter()
            .map(|c| SidecarDocument::load_or_empty(&c.sidecar))
            .collect();

        let merged = self.policy.merge(&docs).map_err(|conflict| ClusterConflict {
            destination: dest.clone(),
            file_size: size,
            conflict,
            conflicting: 1,
            members: cluster
                .iter()
                .map(|c| (c.source.clone(), c.sidecar.clone()))
                .collect(),
        })?;

        let timestamp = merged
            .photo_taken_time()
            .unwrap_or(cluster[0].timestamp);
        let provenance = provenance(cluster.iter().map(|c| c.source.as_path()));
        let mut members = cluster.into_iter().map(|c| c.source);
        let src = members.next().unwrap_or_default();

        Ok(PlanEntry {
            src,
            dest,
            timestamp,
            provenance,
            merged_json: merged.sanitize(),
            duplicates: members.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use serde_json::json;

    fn write_pair(dir: &Path, name: &str, content: &[u8], sidecar: serde_json::Value) -> (PathBuf, PathBuf) {
        fs::create_dir_all(dir).unwrap();
        let media = dir.join(name);
        let json = dir.join(format!("{}.json", name));
        fs::write(&media, content).unwrap();
        fs::write(&json, serde_json::to_string(&sidecar).unwrap()).unwrap();
        (media, json)
    }

    fn taken(ts: &str) -> serde_json::Value {
        json!({"photoTakenTime": {"timestamp": ts}})
    }

    #[test]
    fn test_party_lands_in_january() {
        let tmp = tempfile::tempdir().unwrap();
        let (media, json) = write_pair(&tmp.path().join("Trip"), "party.jpg", b"img", taken("1609459200"));
        let pairs = BTreeMap::from([(media.clone(), Some(json))]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].dest, PathBuf::from("/out/2021/01/party.jpg"));
        assert_eq!(plan.entries[0].src, media);
        assert_eq!(plan.entries[0].timestamp, 1609459200.0);
        assert_eq!(plan.entries[0].provenance, vec!["Trip".to_string()]);
    }

    #[test]
    fn test_two_sizes_at_one_destination_are_renamed() {
        let tmp = tempfile::tempdir().unwrap();
        let ts = "1623000000"; // 2021-06-06
        let (small, small_json) = write_pair(&tmp.path().join("A"), "IMG_01.jpg", b"aa", taken(ts));
        let (large, large_json) = write_pair(&tmp.path().join("B"), "IMG_01.jpg", b"bbbb", taken(ts));
        let pairs = BTreeMap::from([(small.clone(), Some(small_json)), (large.clone(), Some(large_json))]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        let dests: Vec<(PathBuf, PathBuf)> = plan
            .entries
            .iter()
            .map(|e| (e.src.clone(), e.dest.clone()))
            .collect();
        assert_eq!(
            dests,
            vec![
                (small, PathBuf::from("/out/2021/06/IMG_01.jpg")),
                (large, PathBuf::from("/out/2021/06/IMG_01_1.jpg")),
            ]
        );
        assert_eq!(plan.stats.renamed, 1);
        assert_eq!(plan.stats.duplicates_collapsed, 0);
    }

    #[test]
    fn test_rename_skips_names_already_in_use() {
        let tmp = tempfile::tempdir().unwrap();
        let ts = "1623000000";
        let (a, a_json) = write_pair(&tmp.path().join("A"), "IMG_01.jpg", b"aa", taken(ts));
        let (b, b_json) = write_pair(&tmp.path().join("B"), "IMG_01.jpg", b"bbbb", taken(ts));
        let (c, c_json) = write_pair(&tmp.path().join("C"), "IMG_01_1.jpg", b"ccccccc", taken(ts));
        let pairs = BTreeMap::from([
            (a.clone(), Some(a_json)),
            (b.clone(), Some(b_json)),
            (c.clone(), Some(c_json)),
        ]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        let dests: BTreeMap<PathBuf, PathBuf> = plan
            .entries
            .iter()
            .map(|e| (e.src.clone(), e.dest.clone()))
            .collect();
        assert_eq!(dests[&a], PathBuf::from("/out/2021/06/IMG_01.jpg"));
        assert_eq!(dests[&b], PathBuf::from("/out/2021/06/IMG_01_2.jpg"));
        assert_eq!(dests[&c], PathBuf::from("/out/2021/06/IMG_01_1.jpg"));

        let unique: BTreeSet<&PathBuf> = dests.values().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(plan.stats.renamed, 1);
    }

    #[test]
    fn test_same_size_members_collapse_into_one_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let ts = "1623000000";
        let mut first = taken(ts);
        first["imageViews"] = json!("3");
        let mut second = taken(ts);
        second["imageViews"] = json!("5");
        let (a, a_json) = write_pair(&tmp.path().join("Photos from 2021"), "x.jpg", b"same", first);
        let (b, b_json) = write_pair(&tmp.path().join("Trip"), "x.jpg", b"same", second);
        let pairs = BTreeMap::from([(a.clone(), Some(a_json)), (b.clone(), Some(b_json))]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        assert_eq!(plan.entries.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.src, a);
        assert_eq!(entry.duplicates, vec![b]);
        assert_eq!(entry.merged_json.get("imageViews"), Some(&json!("8")));
        assert_eq!(
            entry.provenance,
            vec!["Photos from 2021".to_string(), "Trip".to_string()]
        );
        assert_eq!(plan.stats.merged_clusters, 1);
        assert_eq!(plan.stats.duplicates_collapsed, 1);
    }

    #[test]
    fn test_merge_conflict_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut first = taken("1623000000");
        first["title"] = json!("x.jpg");
        let mut second = taken("1623000000");
        second["title"] = json!("other.jpg");
        let (a, a_json) = write_pair(&tmp.path().join("A"), "x.jpg", b"same", first);
        let (b, b_json) = write_pair(&tmp.path().join("B"), "x.jpg", b"same", second);
        let pairs = BTreeMap::from([(a.clone(), Some(a_json)), (b, Some(b_json))]);

        let err = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap_err();
        match err {
            Error::MergeConflict(conflict) => {
                assert_eq!(conflict.destination, PathBuf::from("/out/2021/06/x.jpg"));
                assert_eq!(conflict.file_size, 4);
                assert_eq!(conflict.conflict.field, "title");
                assert_eq!(conflict.members.len(), 2);
                assert_eq!(conflict.members[0].0, a);
                assert_eq!(conflict.conflicting, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_every_conflicting_cluster_is_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let mut pairs = BTreeMap::new();
        for name in ["x.jpg", "y.jpg"] {
            for (folder, description) in [("A", "sunset"), ("B", "sunrise")] {
                let mut doc = taken("1623000000");
                doc["description"] = json!(description);
                let (media, json) = write_pair(&tmp.path().join(folder), name, b"same", doc);
                pairs.insert(media, Some(json));
            }
        }

        let err = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap_err();
        match err {
            Error::MergeConflict(conflict) => {
                assert_eq!(conflict.destination, PathBuf::from("/out/2021/06/x.jpg"));
                assert_eq!(conflict.conflicting, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_skipped_sources_are_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("A");
        let (undated, undated_json) = write_pair(&dir, "u.jpg", b"u", json!({"title": "u.jpg"}));
        let (unpaired, _) = write_pair(&dir, "m.jpg", b"m", json!({}));
        let pairs = BTreeMap::from([
            (undated, Some(undated_json)),
            (unpaired, None),
            (dir.join("gone.jpg"), Some(dir.join("gone.jpg.json"))),
        ]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        assert!(plan.entries.is_empty());
        assert_eq!(plan.stats.undated, 1);
        assert_eq!(plan.stats.missing, 1);
        assert_eq!(plan.stats.vanished, 1);
        assert_eq!(plan.stats.total_sources, 3);
    }

    #[test]
    fn test_singleton_sidecar_is_sanitized() {
        let tmp = tempfile::tempdir().unwrap();
        let mut doc = taken("1609459200");
        doc["description"] = json!("");
        doc["geoData"] = json!({"latitude": 0.0, "longitude": 0.0, "altitude": 0.0});
        let (media, json) = write_pair(&tmp.path().join("A"), "p.jpg", b"p", doc);
        let pairs = BTreeMap::from([(media, Some(json))]);

        let plan = Planner::new("/out", MergePolicy::default())
            .plan(&pairs, &SilentReporter)
            .unwrap();
        let merged = &plan.entries[0].merged_json;
        assert!(merged.get("description").is_none());
        assert!(merged.get("geoData").is_none());
        assert!(merged.get("photoTakenTime").is_some());
    }
}
