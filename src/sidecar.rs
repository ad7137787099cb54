//! Sidecar metadata documents and capture-time extraction.
//!
//! A sidecar is a JSON object exported next to a media file. Lookups go
//! through [`Field`] so callers can tell an absent key from an explicit
//! `null`, an empty value, and a real one.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const PHOTO_TAKEN_TIME: &str = "photoTakenTime";
pub const CREATION_TIME: &str = "creationTime";
pub const IMAGE_VIEWS: &str = "imageViews";
pub const URL: &str = "url";
pub const DESCRIPTION: &str = "description";
pub const PEOPLE: &str = "people";
pub const PHOTOS_ORIGIN: &str = "googlePhotosOrigin";
pub const APP_SOURCE: &str = "appSource";
pub const PROVENANCE: &str = "provenance";

const GEO_FIELDS: [&str; 2] = ["geoData", "geoDataExif"];
const GEO_COMPONENTS: [&str; 5] = [
    "latitude",
    "longitude",
    "altitude",
    "latitudeSpan",
    "longitudeSpan",
];

/// Presence state of one key in a [`SidecarDocument`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Absent,
    Null,
    /// `""`, `[]` or `{}`.
    Empty(&'a Value),
    Present(&'a Value),
}

impl<'a> Field<'a> {
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => Field::Absent,
            Some(Value::Null) => Field::Null,
            Some(v @ Value::String(s)) if s.is_empty() => Field::Empty(v),
            Some(v @ Value::Array(a)) if a.is_empty() => Field::Empty(v),
            Some(v @ Value::Object(o)) if o.is_empty() => Field::Empty(v),
            Some(v) => Field::Present(v),
        }
    }

    /// Absent or explicit null.
    pub fn is_vacant(&self) -> bool {
        matches!(self, Field::Absent | Field::Null)
    }

    /// Anything that is not [`Field::Present`].
    pub fn is_empty(&self) -> bool {
        !matches!(self, Field::Present(_))
    }

    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Field::Absent => None,
            Field::Null => None,
            Field::Empty(v) | Field::Present(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SidecarDocument {
    fields: Map<String, Value>,
}

impl SidecarDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::Other(format!(
                "sidecar is not a JSON object (found {})",
                json_kind(&other)
            ))),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&text)?)
    }

    /// Load a sidecar, degrading to an empty document when it cannot be read.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Error reading JSON {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn field(&self, key: &str) -> Field<'_> {
        Field::of(self.fields.get(key))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The authoritative capture time, `photoTakenTime.timestamp`, as epoch seconds.
    pub fn photo_taken_time(&self) -> Option<f64> {
        self.get(PHOTO_TAKEN_TIME).and_then(timestamp_f64)
    }

    /// Drop fields that carry no information: an empty description and
    /// geolocation objects that are all zero.
    pub fn sanitize(mut self) -> Self {
        if matches!(self.get(DESCRIPTION), Some(Value::String(s)) if s.is_empty()) {
            self.fields.remove(DESCRIPTION);
        }
        for geo in GEO_FIELDS {
            if self.get(geo).is_some_and(is_zero_geo) {
                self.fields.remove(geo);
            }
        }
        self
    }
}

/// Read the capture time from the sidecar at `path`.
///
/// Unreadable or malformed documents are logged and yield `None`.
pub fn capture_time(path: &Path) -> Option<f64> {
    match SidecarDocument::load(path) {
        Ok(doc) => doc.photo_taken_time(),
        Err(e) => {
            warn!("Error reading JSON {}: {}", path.display(), e);
            None
        }
    }
}

/// `{"timestamp": "..."}` as a float. Numbers are accepted as well as strings.
pub fn timestamp_f64(value: &Value) -> Option<f64> {
    let ts = match value.get("timestamp")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    ts.filter(|ts| ts.is_finite())
}

/// `{"timestamp": "..."}` as an integer.
pub fn timestamp_i64(value: &Value) -> Option<i64> {
    value.get("timestamp").and_then(integer_of)
}

/// Integer reading of a JSON string or number.
pub fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// A geolocation object whose every component is exactly zero.
/// Missing components count as zero; non-numeric ones do not.
fn is_zero_geo(geo: &Value) -> bool {
    let Value::Object(map) = geo else {
        return false;
    };
    GEO_COMPONENTS.iter().all(|key| match map.get(*key) {
        None => true,
        Some(v) => v.as_f64() == Some(0.0),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
