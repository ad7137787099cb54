//! Locate the sidecar JSON for a media file.
//!
//! Export tools mangle sidecar names in many ways (truncated tags, duplicate
//! indices moved around, edited copies sharing the original's sidecar). The
//! resolver rebuilds candidate names with an ordered list of strategies and
//! returns the first one that exists. The order matters: a corpus can hold
//! several plausible candidates for one file.

mod normalize;
mod suffix;

pub use normalize::{extract_duplicate_index, strip_edit_marker, DuplicateIndex};
pub use suffix::{indexed_sidecar_suffixes, sidecar_suffixes, METADATA_TAGS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Existence check used by the resolver.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

impl<P: PathProbe + ?Sized> PathProbe for &P {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Extension of motion-photo stills whose sidecar is named after `<name>.jpg`.
    pub motion_photo_extension: String,
    pub motion_photo_sibling: String,
    /// Burst composite stems end in this marker...
    pub burst_marker: String,
    /// ...and share the sidecar of the stem ending in this one.
    pub burst_replacement: String,
    /// Names longer than this are truncated by the exporter.
    pub max_name_len: usize,
    /// Generated-content markers, tried in order, case-insensitive.
    pub edit_markers: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            motion_photo_extension: "mp".to_string(),
            motion_photo_sibling: ".jpg".to_string(),
            burst_marker: "_CO".to_string(),
            burst_replacement: "_C".to_string(),
            max_name_len: 46,
            edit_markers: [
                "-edited", "-modifié", "-kopio", "-löschen", " copy", "-COLLAGE", "-EFFECTS",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    ExactName,
    BurstComposite,
    StemOnly,
    MotionPhotoSibling,
    Truncated,
    IndexedIntermediate,
    EditStripped,
    IndexedFinal,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::ExactName => "exact name",
            Strategy::BurstComposite => "burst composite",
            Strategy::StemOnly => "stem only",
            Strategy::MotionPhotoSibling => "motion photo sibling",
            Strategy::Truncated => "truncated name",
            Strategy::IndexedIntermediate => "duplicate index",
            Strategy::EditStripped => "edit marker stripped",
            Strategy::IndexedFinal => "duplicate index (normalized)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub sidecar: PathBuf,
    pub strategy: Strategy,
}

pub struct SidecarResolver<P = FsProbe> {
    config: ResolverConfig,
    probe: P,
}

impl SidecarResolver<FsProbe> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_probe(config, FsProbe)
    }
}

impl<P: PathProbe> SidecarResolver<P> {
    pub fn with_probe(config: ResolverConfig, probe: P) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Path of the sidecar for `media`, if any candidate exists.
    pub fn resolve(&self, media: &Path) -> Option<PathBuf> {
        self.resolve_with_strategy(media).map(|r| r.sidecar)
    }

    pub fn resolve_with_strategy(&self, media: &Path) -> Option<Resolution> {
        let found = self.search(media);
        match &found {
            Some(r) => trace!("{} -> {} ({})", media.display(), r.sidecar.display(), r.strategy),
            None => trace!("{} -> no sidecar", media.display()),
        }
        found
    }

    fn search(&self, media: &Path) -> Option<Resolution> {
        let dir = media.parent().unwrap_or_else(|| Path::new(""));
        let name = media.file_name()?.to_string_lossy().into_owned();
        let stem = media
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let extension = media
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        // image.jpg -> image.jpg.supplemental-metadata.json
        if let Some(found) = self.with_suffixes(dir, &name) {
            return found_by(found, Strategy::ExactName);
        }

        // IMG_0001_CO.jpg -> IMG_0001_C.json
        if let Some(base) = stem.strip_suffix(self.config.burst_marker.as_str()) {
            let candidate = dir.join(format!(
                "{}{}{}",
                base,
                self.config.burst_replacement,
                suffix::JSON_EXTENSION
            ));
            if self.probe.exists(&candidate) {
                return found_by(candidate, Strategy::BurstComposite);
            }
        }

        // image.jpg -> image.supplemental-metadata.json
        if let Some(found) = self.with_suffixes(dir, &stem) {
            return found_by(found, Strategy::StemOnly);
        }

        // image.MP -> image.MP.jpg.json
        if extension
            .trim_start_matches('.')
            .eq_ignore_ascii_case(&self.config.motion_photo_extension)
        {
            let sibling = format!("{}{}", name, self.config.motion_photo_sibling);
            if let Some(found) = self.with_suffixes(dir, &sibling) {
                return found_by(found, Strategy::MotionPhotoSibling);
            }
        }

        if name.chars().count() > self.config.max_name_len {
            let truncated: String = name.chars().take(self.config.max_name_len).collect();
            if let Some(found) = self.with_suffixes(dir, &truncated) {
                return found_by(found, Strategy::Truncated);
            }
        }

        let duplicate = extract_duplicate_index(&stem);
        let mut clean_stem = duplicate
            .as_ref()
            .map_or_else(|| stem.clone(), |d| d.stem.clone());

        // IMG-COLLAGE(1).jpg -> IMG-COLLAGE.jpg.supplemental-metadata(1).json,
        // checked before the collage marker is stripped below.
        if let Some(dup) = &duplicate {
            let base = format!("{}{}", clean_stem, extension);
            if let Some(found) = self.with_indexed_suffixes(dir, &base, &dup.index) {
                return found_by(found, Strategy::IndexedIntermediate);
            }
        }

        // image-EFFECTS-edited.jpg -> image-EFFECTS.jpg.json -> image.jpg.json
        loop {
            let Some(stripped) = strip_edit_marker(&clean_stem, &self.config.edit_markers) else {
                break;
            };
            clean_stem = stripped.to_string();
            let base = format!("{}{}", clean_stem, extension);
            if let Some(found) = self.with_suffixes(dir, &base) {
                return found_by(found, Strategy::EditStripped);
            }
        }

        let Some(dup) = duplicate else {
            debug!(
                "No duplicate index in '{}', skipping indexed sidecar candidates",
                name
            );
            return None;
        };

        // hemlatha(1).jpg -> hemlatha.jpg(1).json or hemlatha.supplemental-metadata(1).json
        let with_extension = format!("{}{}", clean_stem, extension);
        for base in [with_extension.as_str(), clean_stem.as_str()] {
            if let Some(found) = self.with_indexed_suffixes(dir, base, &dup.index) {
                return found_by(found, Strategy::IndexedFinal);
            }
        }

        None
    }

    fn with_suffixes(&self, dir: &Path, base: &str) -> Option<PathBuf> {
        self.first_existing(dir, base, sidecar_suffixes())
    }

    fn with_indexed_suffixes(&self, dir: &Path, base: &str, index: &str) -> Option<PathBuf> {
        self.first_existing(dir, base, indexed_sidecar_suffixes(index))
    }

    fn first_existing(
        &self,
        dir: &Path,
        base: &str,
        suffixes: impl IntoIterator<Item = String>,
    ) -> Option<PathBuf> {
        suffixes
            .into_iter()
            .map(|suffix| dir.join(format!("{}{}", base, suffix)))
            .find(|candidate| self.probe.exists(candidate))
    }
}

fn found_by(sidecar: PathBuf, strategy: Strategy) -> Option<Resolution> {
    Some(Resolution { sidecar, strategy })
}
