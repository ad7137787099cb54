use dashmap::DashMap;
use rayon::prelude::*;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use twox_hash::XxHash64;

const PARTIAL_HASH_LENGTH: usize = 1024; // 1KB

/// Counters shared by the hashing workers.
#[derive(Debug, Default)]
pub struct HashCounters {
    pub partial: AtomicUsize,
    pub full: AtomicUsize,
    pub unreadable: AtomicUsize,
}

impl HashCounters {
    pub fn hashed(&self) -> usize {
        self.partial.load(Ordering::Relaxed)
    }
}

/// Two-tier hashing of one size group:
/// 1. Partial hash (first 1KB via XxHash64) to quickly eliminate non-matches
/// 2. BLAKE3 of the full content only on partial-hash collisions
///
/// Returns full hash (hex) -> files, for hashes shared by more than one file.
pub fn content_groups(
    files: &[PathBuf],
    counters: &HashCounters,
    on_hashed: &(dyn Fn(usize) + Sync),
) -> Vec<(String, Vec<PathBuf>)> {
    let partial_hash_to_file_map: DashMap<u64, Vec<PathBuf>> = DashMap::new();
    let full_hash_to_file_map: DashMap<String, Vec<PathBuf>> = DashMap::new();

    // First pass: partial hash to eliminate non-dupes quickly
    files.par_iter().for_each(|file| match read_portion(file) {
        Ok(data) => {
            partial_hash_to_file_map
                .entry(hash_data(&data))
                .or_default()
                .push(file.clone());
            let hashed = counters.partial.fetch_add(1, Ordering::Relaxed) + 1;
            on_hashed(hashed);
        }
        Err(e) => {
            tracing::error!("Cannot hash '{}': {}", file.display(), e);
            counters.unreadable.fetch_add(1, Ordering::Relaxed);
        }
    });

    // Second pass: full hash only on partial-hash collisions (>1 file)
    let partial_hash_to_file_vec: Vec<_> = partial_hash_to_file_map.into_iter().collect();
    partial_hash_to_file_vec
        .par_iter()
        .filter(|(_, files)| files.len() > 1)
        .flat_map(|(_, files)| files.par_iter())
        .for_each(|file| match full_hash(file) {
            Ok(hash) => {
                full_hash_to_file_map
                    .entry(hash)
                    .or_default()
                    .push(file.clone());
                counters.full.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("Cannot hash '{}': {}", file.display(), e);
                counters.unreadable.fetch_add(1, Ordering::Relaxed);
            }
        });

    full_hash_to_file_map
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .collect()
}

fn read_portion(file: &Path) -> io::Result<Vec<u8>> {
    let mut f = File::open(file)?;
    let mut buffer = vec![0; PARTIAL_HASH_LENGTH];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = f.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// BLAKE3 of the whole file, streamed.
pub fn full_hash(file: &Path) -> io::Result<String> {
    let mut f = File::open(file)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut f, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_content_groups_confirms_full_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = vec![7u8; PARTIAL_HASH_LENGTH];
        let mut a = prefix.clone();
        a.extend_from_slice(b"tail-a");
        let mut b = prefix.clone();
        b.extend_from_slice(b"tail-b");

        let paths: Vec<PathBuf> = ["one", "two", "three"]
            .iter()
            .map(|name| tmp.path().join(name))
            .collect();
        fs::write(&paths[0], &a).unwrap();
        fs::write(&paths[1], &b).unwrap();
        fs::write(&paths[2], &a).unwrap();

        let counters = HashCounters::default();
        let groups = content_groups(&paths, &counters, &|_| {});
        assert_eq!(groups.len(), 1);
        let mut files = groups[0].1.clone();
        files.sort();
        let mut expected = vec![paths[0].clone(), paths[2].clone()];
        expected.sort();
        assert_eq!(files, expected);
        assert_eq!(counters.hashed(), 3);
        assert_eq!(counters.full.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_unreadable_files_are_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = vec![tmp.path().join("a"), tmp.path().join("b")];
        let counters = HashCounters::default();
        assert!(content_groups(&missing, &counters, &|_| {}).is_empty());
        assert_eq!(counters.unreadable.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_full_hash_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"hello").unwrap();
        assert_eq!(full_hash(&file).unwrap(), blake3::hash(b"hello").to_hex().to_string());
    }
}
