//! Sidecar name suffixes.
//!
//! The exporter appends `.supplemental-metadata.json` to the media name but
//! truncates the tag when the resulting name gets too long, so every
//! truncation seen in the wild is listed here, longest first. New variants
//! only need to be appended to [`METADATA_TAGS`].

pub const JSON_EXTENSION: &str = ".json";

pub const METADATA_TAGS: [&str; 17] = [
    ".supplemental-metadata",
    ".supplemental-metadat",
    ".supplemental-metada",
    ".supplemental-metad",
    ".supplemental-meta",
    ".supplemental-met",
    ".supplemental-me",
    ".supplemental-m",
    ".supplemental-",
    ".supplemental",
    ".supplementa",
    ".supplement",
    ".supplemen",
    ".suppleme",
    ".supplem",
    ".suppl",
    ".supp",
];

/// `.json` followed by every `<tag>.json`.
pub fn sidecar_suffixes() -> impl Iterator<Item = String> {
    std::iter::once(JSON_EXTENSION.to_string())
        .chain(METADATA_TAGS.iter().map(|tag| format!("{}{}", tag, JSON_EXTENSION)))
}

/// Suffixes for a sidecar of the `index`-th duplicate upload: `(N).json`,
/// every `<tag>(N).json`, then the rare `.json(N)`.
pub fn indexed_sidecar_suffixes(index: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(format!("({}){}", index, JSON_EXTENSION))
        .chain(
            METADATA_TAGS
                .iter()
                .map(move |tag| format!("{}({}){}", tag, index, JSON_EXTENSION)),
        )
        .chain(std::iter::once(format!("{}({})", JSON_EXTENSION, index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_family_order() {
        let suffixes: Vec<String> = sidecar_suffixes().collect();
        assert_eq!(suffixes.len(), 18);
        assert_eq!(suffixes[0], ".json");
        assert_eq!(suffixes[1], ".supplemental-metadata.json");
        assert_eq!(suffixes[17], ".supp.json");
    }

    #[test]
    fn test_indexed_suffix_family() {
        let suffixes: Vec<String> = indexed_sidecar_suffixes("2").collect();
        assert_eq!(suffixes.len(), 19);
        assert_eq!(suffixes[0], "(2).json");
        assert_eq!(suffixes[1], ".supplemental-metadata(2).json");
        assert_eq!(suffixes[18], ".json(2)");
    }
}
