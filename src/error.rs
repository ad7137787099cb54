use crate::merge::MergeConflict;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON merge failed\n{0}")]
    MergeConflict(Box<ClusterConflict>),

    #[error("{0}")]
    Other(String),
}

/// Everything needed to diagnose a content cluster whose sidecars disagree.
#[derive(Debug, Clone)]
pub struct ClusterConflict {
    pub destination: PathBuf,
    pub file_size: u64,
    pub conflict: MergeConflict,
    /// Conflicting clusters in the whole plan, this one included.
    pub conflicting: usize,
    /// (source media, sidecar) for every member of the cluster.
    pub members: Vec<(PathBuf, PathBuf)>,
}

impl fmt::Display for ClusterConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Destination: {}", self.destination.display())?;
        writeln!(f, "File Size:   {} bytes", self.file_size)?;
        writeln!(f, "Error:       {}", self.conflict)?;
        if self.conflicting > 1 {
            writeln!(f, "Also failed: {} other clusters (see log)", self.conflicting - 1)?;
        }
        writeln!(f, "Candidates:")?;
        for (source, sidecar) in &self.members {
            writeln!(f, "  - {}", source.display())?;
            writeln!(f, "    JSON: {}", sidecar.display())?;
        }
        Ok(())
    }
}
