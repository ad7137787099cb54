use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A paired, dated source waiting for its destination.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: PathBuf,
    pub sidecar: PathBuf,
    pub timestamp: f64,
    pub size: u64,
}

/// `output_dir/<YYYY>/<MM>/<file name>`, calendar fields in UTC.
pub fn nominal_destination(output_dir: &Path, timestamp: f64, source: &Path) -> Option<PathBuf> {
    let file_name = source.file_name()?;
    let taken: DateTime<Utc> = DateTime::from_timestamp(timestamp.floor() as i64, 0)?;
    Some(
        output_dir
            .join(format!("{:04}", taken.year()))
            .join(format!("{:02}", taken.month()))
            .join(file_name),
    )
}

/// `<stem>_<index><.ext>` next to `nominal`.
pub fn renamed_destination(nominal: &Path, index: usize) -> PathBuf {
    let stem = nominal
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match nominal.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    };
    nominal.with_file_name(name)
}

/// Split the candidates of one destination into clusters of equal byte
/// size, smallest first. Member order within a cluster is preserved.
pub fn partition_by_size(candidates: Vec<Candidate>) -> Vec<(u64, Vec<Candidate>)> {
    let mut by_size: BTreeMap<u64, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        by_size.entry(candidate.size).or_default().push(candidate);
    }
    by_size.into_iter().collect()
}

/// Distinct parent-folder names, in first-seen order.
pub fn provenance<'a>(sources: impl IntoIterator<Item = &'a Path>) -> Vec<String> {
    let mut folders: Vec<String> = Vec::new();
    for source in sources {
        let folder = source
            .parent()
            .and_then(Path::file_name)
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !folders.contains(&folder) {
            folders.push(folder);
        }
    }
    folders
}
