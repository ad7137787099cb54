//! Stem normalization: duplicate-upload indices and generated-content markers.

/// A stem with a trailing duplicate marker removed, e.g. `vacation (1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIndex {
    pub stem: String,
    pub index: String,
}

/// Detect one trailing duplicate marker: `name(N)`, `name~N` or `name - N`.
///
/// The form is picked by shape in that priority order and only that form is
/// tried, so `a~1 (x)` yields nothing.
pub fn extract_duplicate_index(stem: &str) -> Option<DuplicateIndex> {
    let (base, number) = if stem.contains('(') && stem.ends_with(')') {
        let (base, number) = stem.rsplit_once('(')?;
        (base, number.trim_end_matches(')'))
    } else if stem.contains('~') {
        stem.rsplit_once('~')?
    } else if stem.contains(" - ") {
        stem.rsplit_once(" - ")?
    } else {
        return None;
    };

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(DuplicateIndex {
        stem: base.trim().to_string(),
        index: number.to_string(),
    })
}

/// Strip one generated-content marker (`-edited`, ` copy`, ...) from the end
/// of `stem`, comparing case-insensitively. `None` when no marker matches.
pub fn strip_edit_marker<'a>(stem: &'a str, markers: &[String]) -> Option<&'a str> {
    markers
        .iter()
        .find_map(|marker| strip_suffix_ignore_case(stem, marker))
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let len = suffix.chars().count();
    if len == 0 {
        return None;
    }
    let (start, _) = s.char_indices().rev().nth(len - 1)?;
    let tail = &s[start..];
    (tail.to_lowercase() == suffix.to_lowercase()).then(|| &s[..start])
}
