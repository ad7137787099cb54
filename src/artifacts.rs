//! JSON artifacts handed from one pipeline step to the next.

use crate::auditor::AuditReport;
use crate::error::Error;
use crate::planner::PlanEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scanner output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    pub media: Vec<PathBuf>,
    pub json: Vec<PathBuf>,
}

/// Media path -> sidecar path, `None` when unresolved.
pub type PairingMap = BTreeMap<PathBuf, Option<PathBuf>>;

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = File::open(path)
        .map_err(|e| Error::Other(format!("Cannot open {}: {}", path.display(), e)))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn write_file_list(path: &Path, list: &FileList) -> Result<(), Error> {
    write_json(path, list)
}

pub fn read_file_list(path: &Path) -> Result<FileList, Error> {
    read_json(path)
}

pub fn write_pairs(path: &Path, pairs: &PairingMap) -> Result<(), Error> {
    write_json(path, pairs)
}

pub fn read_pairs(path: &Path) -> Result<PairingMap, Error> {
    read_json(path)
}

pub fn write_plan(path: &Path, entries: &[PlanEntry]) -> Result<(), Error> {
    write_json(path, entries)
}

pub fn read_plan(path: &Path) -> Result<Vec<PlanEntry>, Error> {
    read_json(path)
}

pub fn write_audit(path: &Path, report: &AuditReport) -> Result<(), Error> {
    write_json(path, report)
}
