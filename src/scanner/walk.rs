use glob::Pattern;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Files found under the scanned roots, classified by extension.
#[derive(Debug, Default, Clone)]
pub struct ScanOutput {
    pub media: Vec<PathBuf>,
    pub sidecars: Vec<PathBuf>,
    /// AppleDouble `._*` files and unreadable entries.
    pub ignored: usize,
    /// Unknown extension (lowercase, no dot) -> (count, example path).
    pub unknown: BTreeMap<String, (usize, PathBuf)>,
}

impl ScanOutput {
    pub fn total_files(&self) -> usize {
        self.media.len()
            + self.sidecars.len()
            + self.ignored
            + self.unknown.values().map(|(count, _)| count).sum::<usize>()
    }
}

/// Walk `root_paths` and sort every regular file into media, sidecar or
/// unknown by its lowercase extension. Paths are absolute and sorted.
pub fn classify_files(
    root_paths: &[&str],
    ignore_globs: &[&str],
    media_extensions: &[String],
    sidecar_extension: &str,
    mut on_file: impl FnMut(usize),
) -> io::Result<ScanOutput> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();
    let media_extensions: HashSet<String> =
        media_extensions.iter().map(|e| e.to_lowercase()).collect();
    let sidecar_extension = sidecar_extension.to_lowercase();

    let mut output = ScanOutput::default();
    let mut seen = 0usize;

    for root in root_paths {
        let root = fs::canonicalize(root).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error reading directory {}: {}", root, err),
            )
        })?;

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry.path(), &ignore_patterns));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking {}: {}", root.display(), err);
                    output.ignored += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            seen += 1;
            on_file(seen);

            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            if name.starts_with("._") {
                debug!("Skipping AppleDouble file {}", path.display());
                output.ignored += 1;
                continue;
            }

            let extension = extension_of(path);
            if media_extensions.contains(&extension) {
                output.media.push(path.to_path_buf());
            } else if extension == sidecar_extension {
                output.sidecars.push(path.to_path_buf());
            } else {
                let slot = output
                    .unknown
                    .entry(extension)
                    .or_insert_with(|| (0, path.to_path_buf()));
                slot.0 += 1;
            }
        }
    }

    output.media.sort();
    output.media.dedup();
    output.sidecars.sort();
    output.sidecars.dedup();
    Ok(output)
}

fn is_ignored(path: &Path, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches_path(path))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
