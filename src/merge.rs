//! Collapse the sidecars of one content cluster into a single canonical record.
//!
//! Merge rules:
//! - `imageViews`: summed over every document, saturating at `i64::MAX`.
//! - `creationTime`: the earliest one wins.
//! - `url`: kept from the document with the most views.
//! - prefer-present fields: keep whichever side is non-empty; `people` is a
//!   union of names and `googlePhotosOrigin` a recursive key union.
//! - `photoTakenTime`: a 1h (DST) or 7-8h (timezone) shift keeps the later value.
//!   A side without the field takes the other one; the planner only merges
//!   dated sidecars, so this arises only for direct callers.
//! - anything else must match exactly, or one side must be missing.

use crate::sidecar::{self, Field, SidecarDocument};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Two sidecars disagree on a field with no applicable merge rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    /// Field name, dotted for nested keys.
    pub field: String,
    pub left: Value,
    pub right: Value,
    pub detail: Option<String>,
}

impl MergeConflict {
    fn new(field: impl Into<String>, left: Option<&Value>, right: Option<&Value>) -> Self {
        Self {
            field: field.into(),
            left: left.cloned().unwrap_or(Value::Null),
            right: right.cloned().unwrap_or(Value::Null),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field '{}' mismatch: {} vs {}",
            self.field, self.left, self.right
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for MergeConflict {}

/// Inclusive range of absolute hour differences treated as a clock artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourWindow {
    pub min: f64,
    pub max: f64,
}

impl HourWindow {
    fn contains(&self, hours: f64) -> bool {
        self.min <= hours && hours <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicy {
    /// Fields where a non-empty value beats an empty or missing one.
    pub prefer_present: BTreeSet<String>,
    /// Capture-time shifts that are reconciled instead of reported.
    pub clock_skew_windows: Vec<HourWindow>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            prefer_present: [
                sidecar::APP_SOURCE,
                sidecar::PEOPLE,
                sidecar::DESCRIPTION,
                sidecar::PHOTOS_ORIGIN,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            clock_skew_windows: vec![
                HourWindow { min: 0.9, max: 1.1 },
                HourWindow { min: 6.9, max: 8.1 },
            ],
        }
    }
}

const AGGREGATE_FIELDS: [&str; 3] = [sidecar::IMAGE_VIEWS, sidecar::CREATION_TIME, sidecar::URL];

impl MergePolicy {
    /// Merge `docs` (assumed to describe one photo) into one document.
    pub fn merge(&self, docs: &[SidecarDocument]) -> Result<SidecarDocument, MergeConflict> {
        let (first, rest) = match docs {
            [] => return Ok(SidecarDocument::new()),
            [only] => return Ok(only.clone()),
            [first, rest @ ..] => (first, rest),
        };

        let aggregates = Aggregates::collect(docs);
        let mut merged = first.clone();
        aggregates.apply(&mut merged);

        for other in rest {
            self.fold(&mut merged, other)?;
        }
        Ok(merged)
    }

    fn fold(&self, merged: &mut SidecarDocument, other: &SidecarDocument) -> Result<(), MergeConflict> {
        let keys: BTreeSet<String> = merged.keys().chain(other.keys()).cloned().collect();

        for key in keys {
            if AGGREGATE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let left = merged.field(&key);
            let right = other.field(&key);
            if left.value() == right.value() {
                continue;
            }

            let resolved = if self.prefer_present.contains(&key) {
                self.merge_prefer_present(&key, left, right)?
            } else if key == sidecar::PHOTO_TAKEN_TIME {
                self.merge_capture_time(&key, left, right)?
            } else {
                merge_strict(&key, left, right)?
            };

            if let Some(value) = resolved {
                merged.insert(key, value);
            }
        }
        Ok(())
    }

    /// `None` keeps the left side.
    fn merge_prefer_present(
        &self,
        key: &str,
        left: Field<'_>,
        right: Field<'_>,
    ) -> Result<Option<Value>, MergeConflict> {
        if key == sidecar::PEOPLE {
            return Ok(Some(union_people(left.value(), right.value())));
        }
        if key == sidecar::PHOTOS_ORIGIN {
            return merge_objects(key, left.value(), right.value()).map(Some);
        }
        match (left.is_empty(), right.is_empty()) {
            (true, false) => Ok(right.value().cloned()),
            (false, true) | (true, true) => Ok(None),
            (false, false) => Err(MergeConflict::new(key, left.value(), right.value())
                .with_detail("both present but different")),
        }
    }

    fn merge_capture_time(
        &self,
        key: &str,
        left: Field<'_>,
        right: Field<'_>,
    ) -> Result<Option<Value>, MergeConflict> {
        let (l, r) = match (left.value(), right.value()) {
            (None, r) => return Ok(r.cloned()),
            (_, None) => return Ok(None),
            (Some(l), Some(r)) => (l, r),
        };

        let (Some(ts_left), Some(ts_right)) = (sidecar::timestamp_i64(l), sidecar::timestamp_i64(r)) else {
            return Err(MergeConflict::new(key, Some(l), Some(r)).with_detail("unparseable timestamp"));
        };

        let diff_hours = ts_left.abs_diff(ts_right) as f64 / 3600.0;
        if diff_hours == 0.0 {
            return Ok(None);
        }
        if self.clock_skew_windows.iter().any(|w| w.contains(diff_hours)) {
            // keep the later one, UTC is ahead of the local-time export
            return Ok((ts_right > ts_left).then(|| r.clone()));
        }
        Err(MergeConflict::new(key, Some(l), Some(r))
            .with_detail(format!("{:.1} hours apart", diff_hours)))
    }
}

fn merge_strict(
    key: &str,
    left: Field<'_>,
    right: Field<'_>,
) -> Result<Option<Value>, MergeConflict> {
    if left.is_vacant() {
        Ok(right.value().cloned())
    } else if right.is_vacant() {
        Ok(None)
    } else {
        Err(MergeConflict::new(key, left.value(), right.value()))
    }
}

fn people_names(value: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|person| person.get("name").and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .map(String::from)
}

fn union_people(left: Option<&Value>, right: Option<&Value>) -> Value {
    let names: BTreeSet<String> = people_names(left).chain(people_names(right)).collect();
    Value::Array(
        names
            .into_iter()
            .map(|name| {
                let mut person = Map::new();
                person.insert("name".to_string(), Value::String(name));
                Value::Object(person)
            })
            .collect(),
    )
}

/// Key-union of two objects. Nested objects recurse; differing scalars conflict.
fn merge_objects(
    path: &str,
    left: Option<&Value>,
    right: Option<&Value>,
) -> Result<Value, MergeConflict> {
    let (left, right) = match (left, right) {
        (None | Some(Value::Null), r) => return Ok(r.cloned().unwrap_or(Value::Null)),
        (Some(l), None | Some(Value::Null)) => return Ok(l.clone()),
        (Some(l), Some(r)) => (l, r),
    };
    let (Value::Object(left_map), Value::Object(right_map)) = (left, right) else {
        if left == right {
            return Ok(left.clone());
        }
        return Err(MergeConflict::new(path, Some(left), Some(right))
            .with_detail("cannot merge non-objects"));
    };

    let mut result = left_map.clone();
    for (key, value) in right_map {
        let nested_path = format!("{}.{}", path, key);
        match result.get(key) {
            None => {
                result.insert(key.clone(), value.clone());
            }
            Some(existing) if existing == value => {}
            Some(existing @ Value::Object(_)) if value.is_object() => {
                let merged = merge_objects(&nested_path, Some(existing), Some(value))?;
                result.insert(key.clone(), merged);
            }
            Some(existing) => {
                return Err(MergeConflict::new(nested_path, Some(existing), Some(value)));
            }
        }
    }
    Ok(Value::Object(result))
}

/// Whole-list aggregates, computed once before the pairwise fold.
struct Aggregates {
    total_views: Option<i64>,
    earliest_creation: Option<Value>,
    best_url: Option<Value>,
}

impl Aggregates {
    fn collect(docs: &[SidecarDocument]) -> Self {
        let mut total_views = None;
        let mut max_views = 0;
        let mut max_views_idx = 0;
        for (idx, doc) in docs.iter().enumerate() {
            let views = match doc.field(sidecar::IMAGE_VIEWS) {
                Field::Absent => continue,
                field => field.value().and_then(sidecar::integer_of).unwrap_or(0),
            };
            let total: &mut i64 = total_views.get_or_insert(0);
            *total = total.saturating_add(views);
            if views > max_views {
                max_views = views;
                max_views_idx = idx;
            }
        }

        let mut earliest: Option<(i64, &Value)> = None;
        for doc in docs {
            let Some(creation) = doc.get(sidecar::CREATION_TIME) else {
                continue;
            };
            if let Some(ts) = sidecar::timestamp_i64(creation) {
                if earliest.map_or(true, |(min, _)| ts < min) {
                    earliest = Some((ts, creation));
                }
            }
        }

        let best_url = match docs[max_views_idx].field(sidecar::URL) {
            Field::Present(url) => Some(url.clone()),
            _ => None,
        };

        Self {
            total_views,
            earliest_creation: earliest.map(|(_, v)| v.clone()),
            best_url,
        }
    }

    fn apply(self, merged: &mut SidecarDocument) {
        if let Some(total) = self.total_views {
            merged.insert(sidecar::IMAGE_VIEWS, Value::String(total.to_string()));
        }
        if let Some(creation) = self.earliest_creation {
            merged.insert(sidecar::CREATION_TIME, creation);
        }
        if let Some(url) = self.best_url {
            merged.insert(sidecar::URL, url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> SidecarDocument {
        SidecarDocument::from_value(value).unwrap()
    }

    fn merge(docs: Vec<Value>) -> Result<SidecarDocument, MergeConflict> {
        let docs: Vec<_> = docs.into_iter().map(doc).collect();
        MergePolicy::default().merge(&docs)
    }

    #[test]
    fn test_merge_with_itself_is_identity() {
        let x = json!({"photoTakenTime": {"timestamp": "1000000000"}});
        let merged = merge(vec![x.clone(), x.clone()]).unwrap();
        assert_eq!(merged, doc(x));
    }

    #[test]
    fn test_merge_single_document_unchanged() {
        let x = json!({"imageViews": "7", "title": "a.jpg"});
        assert_eq!(merge(vec![x.clone()]).unwrap(), doc(x));
        assert!(merge(vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_dst_shift_keeps_later_timestamp() {
        let merged = merge(vec![
            json!({"photoTakenTime": {"timestamp": "1000000000"}}),
            json!({"photoTakenTime": {"timestamp": "1000003600"}}),
        ])
        .unwrap();
        assert_eq!(merged.photo_taken_time(), Some(1000003600.0));

        let merged = merge(vec![
            json!({"photoTakenTime": {"timestamp": "1000003600"}}),
            json!({"photoTakenTime": {"timestamp": "1000000000"}}),
        ])
        .unwrap();
        assert_eq!(merged.photo_taken_time(), Some(1000003600.0));
    }

    #[test]
    fn test_timezone_shift_keeps_later_timestamp() {
        let merged = merge(vec![
            json!({"photoTakenTime": {"timestamp": "1000000000"}}),
            json!({"photoTakenTime": {"timestamp": "1000025200"}}),
        ])
        .unwrap();
        assert_eq!(merged.photo_taken_time(), Some(1000025200.0));
    }

    #[test]
    fn test_two_hour_shift_is_conflict() {
        let err = merge(vec![
            json!({"photoTakenTime": {"timestamp": "1000000000"}}),
            json!({"photoTakenTime": {"timestamp": "1000007200"}}),
        ])
        .unwrap_err();
        assert_eq!(err.field, "photoTakenTime");
        let message = err.to_string();
        assert!(message.contains("1000000000"), "{}", message);
        assert!(message.contains("1000007200"), "{}", message);
        assert!(message.contains("2.0 hours apart"), "{}", message);
    }

    #[test]
    fn test_image_views_are_summed() {
        let merged = merge(vec![json!({"imageViews": "3"}), json!({"imageViews": "5"})]).unwrap();
        assert_eq!(merged.get("imageViews"), Some(&json!("8")));

        let merged = merge(vec![json!({"imageViews": "abc"}), json!({"imageViews": "5"})]).unwrap();
        assert_eq!(merged.get("imageViews"), Some(&json!("5")));
    }

    #[test]
    fn test_huge_image_views_saturate() {
        let merged = merge(vec![
            json!({"imageViews": "9223372036854775807"}),
            json!({"imageViews": "1"}),
        ])
        .unwrap();
        assert_eq!(merged.get("imageViews"), Some(&json!("9223372036854775807")));
    }

    #[test]
    fn test_url_follows_most_viewed() {
        let merged = merge(vec![
            json!({"imageViews": "1", "url": "https://a"}),
            json!({"imageViews": "9", "url": "https://b"}),
            json!({"imageViews": "9", "url": "https://c"}),
        ])
        .unwrap();
        assert_eq!(merged.get("url"), Some(&json!("https://b")));
    }

    #[test]
    fn test_creation_time_takes_earliest() {
        let merged = merge(vec![
            json!({"creationTime": {"timestamp": "2000", "formatted": "later"}}),
            json!({"creationTime": {"timestamp": "1000", "formatted": "earlier"}}),
        ])
        .unwrap();
        assert_eq!(
            merged.get("creationTime"),
            Some(&json!({"timestamp": "1000", "formatted": "earlier"}))
        );
    }

    #[test]
    fn test_people_union_sorted_deduplicated() {
        let merged = merge(vec![
            json!({"people": [{"name": "B"}, {"name": "A"}]}),
            json!({"people": [{"name": "A"}, {"name": "C"}]}),
        ])
        .unwrap();
        assert_eq!(
            merged.get("people"),
            Some(&json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]))
        );

        let merged = merge(vec![json!({"people": [{"name": "A"}]}), json!({"people": [{"name": "B"}]})]).unwrap();
        assert_eq!(merged.get("people"), Some(&json!([{"name": "A"}, {"name": "B"}])));
    }

    #[test]
    fn test_prefer_present_keeps_non_empty_side() {
        let merged = merge(vec![json!({"description": ""}), json!({"description": "beach"})]).unwrap();
        assert_eq!(merged.get("description"), Some(&json!("beach")));

        let merged = merge(vec![json!({"description": "beach"}), json!({})]).unwrap();
        assert_eq!(merged.get("description"), Some(&json!("beach")));

        let err = merge(vec![json!({"description": "beach"}), json!({"description": "lake"})]).unwrap_err();
        assert_eq!(err.field, "description");
    }

    #[test]
    fn test_origin_objects_merge_recursively() {
        let merged = merge(vec![
            json!({"googlePhotosOrigin": {"mobileUpload": {"deviceType": "ANDROID_PHONE"}}}),
            json!({"googlePhotosOrigin": {"mobileUpload": {"deviceFolder": {"localFolderName": "Camera"}}}}),
        ])
        .unwrap();
        assert_eq!(
            merged.get("googlePhotosOrigin"),
            Some(&json!({"mobileUpload": {
                "deviceType": "ANDROID_PHONE",
                "deviceFolder": {"localFolderName": "Camera"}
            }}))
        );

        let err = merge(vec![
            json!({"googlePhotosOrigin": {"mobileUpload": {"deviceType": "ANDROID_PHONE"}}}),
            json!({"googlePhotosOrigin": {"mobileUpload": {"deviceType": "IOS_PHONE"}}}),
        ])
        .unwrap_err();
        assert_eq!(err.field, "googlePhotosOrigin.mobileUpload.deviceType");
    }

    #[test]
    fn test_strict_fields() {
        let merged = merge(vec![json!({"title": "a.jpg"}), json!({"title": null})]).unwrap();
        assert_eq!(merged.get("title"), Some(&json!("a.jpg")));

        let merged = merge(vec![json!({}), json!({"title": "a.jpg"})]).unwrap();
        assert_eq!(merged.get("title"), Some(&json!("a.jpg")));

        let err = merge(vec![
            json!({"geoData": {"latitude": 1.0}}),
            json!({"geoData": {"latitude": 2.0}}),
        ])
        .unwrap_err();
        assert_eq!(err.field, "geoData");
        assert_eq!(err.left, json!({"latitude": 1.0}));
        assert_eq!(err.right, json!({"latitude": 2.0}));
    }

    #[test]
    fn test_custom_policy_without_prefer_present() {
        let policy = MergePolicy {
            prefer_present: BTreeSet::new(),
            ..MergePolicy::default()
        };
        let docs = vec![doc(json!({"description": "x"})), doc(json!({"description": "y"}))];
        assert!(policy.merge(&docs).is_err());
    }
}
