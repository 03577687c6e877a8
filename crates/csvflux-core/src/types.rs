//! Point model for exported CSV rows

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond-precision Unix epoch timestamp
pub type Timestamp = i64;

/// Tag of a point; tag values are always text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Typed value of a CSV cell
///
/// Cells start out as text and are narrowed to a number when their column
/// holds numbers only. An empty cell stays an empty `String` until the
/// exporter replaces it with a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
}

impl FieldValue {
    /// Text form, as written to tags and to forced string fields
    ///
    /// Integral floats keep a trailing `.0` so `-999.0` stays distinguishable
    /// from the integer sentinel `-999`.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// True for the empty string only; numbers are never empty
    pub fn is_empty_text(&self) -> bool {
        matches!(self, FieldValue::String(s) if s.is_empty())
    }

    /// Integer form: floats are truncated, text is parsed
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            FieldValue::Float(_) => None,
            FieldValue::String(s) => s.trim().parse().ok(),
        }
    }

    /// Float form: integers are widened, text is parsed
    pub fn to_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::String(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) if v.is_nan() => write!(f, "nan"),
            FieldValue::Float(v) if v.is_infinite() => {
                write!(f, "{}", if *v > 0.0 { "inf" } else { "-inf" })
            }
            FieldValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{:.1}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// Named value of a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

/// One exported row: measurement, time, tags and fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    /// Nanoseconds since the Unix epoch, never negative
    pub timestamp: Timestamp,
    /// Sorted by key, then value
    pub tags: Vec<Tag>,
    /// In column order
    pub fields: Vec<Field>,
}

impl Point {
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            timestamp: None,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Check the invariants every sink relies on
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(CoreError::EmptyMeasurement);
        }
        if self.timestamp < 0 {
            return Err(CoreError::InvalidTimestamp(self.timestamp));
        }
        if self.fields.is_empty() {
            return Err(CoreError::NoFields);
        }
        if self.tags.iter().any(|t| t.key.is_empty()) {
            return Err(CoreError::EmptyTagKey);
        }
        if self.fields.iter().any(|f| f.key.is_empty()) {
            return Err(CoreError::EmptyFieldKey);
        }
        Ok(())
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

/// Collects the parts of a [`Point`] and validates them on [`PointBuilder::build`]
pub struct PointBuilder {
    measurement: String,
    timestamp: Option<Timestamp>,
    tags: Vec<Tag>,
    fields: Vec<Field>,
}

impl PointBuilder {
    pub fn timestamp(mut self, ts: Timestamp) -> Self {
        self.timestamp = Some(ts);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(Field {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn build(mut self) -> Result<Point> {
        // Identical tag sets encode identically
        self.tags.sort();

        let point = Point {
            measurement: self.measurement,
            timestamp: self.timestamp.ok_or(CoreError::MissingTimestamp)?,
            tags: self.tags,
            fields: self.fields,
        };
        point.validate()?;
        Ok(point)
    }
}
