use crate::merge::MergePolicy;
use crate::resolver::ResolverConfig;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MEDIA_EXTENSIONS: [&str; 29] = [
    "jpg", "jpeg", "png", "webp", // images
    "heic", "heif", // HEIF
    "mp4", "mov", "m4v", "3gp", "avi", "mpg", "mkv", "wmv", "divx", "webm", // videos
    "gif", "bmp", "tiff", "tif", // other images
    "arw", "cr2", "dng", "nef", "orf", "raf", "sr2", "rw2", // RAW
    "mp",  // motion photo stills
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Export directories to scan.
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// Root of the organized `<year>/<month>/` library.
    pub output_dir: PathBuf,
    /// Where the intermediate artifacts are written.
    pub work_dir: PathBuf,
    /// Lowercase, without the leading dot.
    pub media_extensions: Vec<String>,
    pub sidecar_extension: String,
    pub resolver: ResolverConfig,
    pub merge: MergePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            output_dir: PathBuf::from("Output"),
            work_dir: PathBuf::from("."),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            sidecar_extension: "json".to_string(),
            resolver: ResolverConfig::default(),
            merge: MergePolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn file_list_path(&self) -> PathBuf {
        self.work_dir.join("file_list.json")
    }

    pub fn pairs_path(&self) -> PathBuf {
        self.work_dir.join("pairs.json")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.work_dir.join("move_plan.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.work_dir.join("audit_report.json")
    }

    pub fn summary_csv_path(&self) -> PathBuf {
        self.work_dir.join("summary.csv")
    }
}

/// `Config.toml` in the working directory (optional), overlaid by
/// `TIDY__*` environment variables, e.g. `TIDY__OUTPUT_DIR=/library`.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(Path::new("Config"))
}

pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(false))
        .add_source(
            Environment::with_prefix("TIDY")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
