//! Source ranges as they appear in raw coverage JSON.
//!
//! `line` is 1-based and `column` is 0-based. A column of
//! [`UNBOUNDED_COLUMN`] means "to the end of the line"; it is written to
//! JSON as `null`, which is what `Infinity` becomes in the raw format.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Column sentinel for ranges that extend to the end of their line.
pub const UNBOUNDED_COLUMN: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    #[serde(
        serialize_with = "serialize_column",
        deserialize_with = "deserialize_column"
    )]
    pub column: i64,
}

impl Position {
    pub fn new(line: u32, column: i64) -> Self {
        Self { line, column }
    }

    /// A position is usable for lookups when both coordinates are real,
    /// non-negative values. Line 0 does not exist in 1-based numbering.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.column >= 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column == UNBOUNDED_COLUMN {
            write!(f, "{}:Infinity", self.line)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

fn serialize_column<S: Serializer>(column: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    if *column == UNBOUNDED_COLUMN {
        serializer.serialize_none()
    } else {
        serializer.serialize_i64(*column)
    }
}

fn deserialize_column<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let column: Option<f64> = Option::deserialize(deserializer)?;
    Ok(match column {
        None => UNBOUNDED_COLUMN,
        Some(c) if c.is_infinite() && c > 0.0 => UNBOUNDED_COLUMN,
        Some(c) if c.fract() != 0.0 || !c.is_finite() => {
            return Err(serde::de::Error::custom(format!("invalid column: {c}")))
        }
        Some(c) => c as i64,
    })
}

/// A `{start, end}` range, optionally flagged as skipped by an ignore hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

impl Location {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            skip: false,
        }
    }

    /// Same range, marked as skipped.
    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Key used to deduplicate ranges regardless of the skip flag.
    #[must_use]
    pub fn range_key(&self) -> (Position, Position) {
        (self.start, self.end)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
