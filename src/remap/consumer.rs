//! Source map lookups.
//!
//! [`SourceMapConsumer`] is the capability the remapper needs;
//! [`SourceMapIndex`] implements it for version 3 source maps.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CovError, Result};

/// Which mapping to pick when there is no exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Closest mapping at or before the position.
    GreatestLowerBound,
    /// Closest mapping at or after the position.
    LeastUpperBound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    /// 1-based.
    pub line: u32,
    /// 0-based.
    pub column: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedPosition {
    pub line: u32,
    pub column: i64,
}

pub trait SourceMapConsumer {
    /// Original position for a generated one. Only mappings on the same
    /// generated line that carry a source qualify.
    fn original_position_for(&self, line: u32, column: i64, bias: Bias)
        -> Option<OriginalPosition>;

    /// Generated position for an original one. Only mappings of the same
    /// source qualify.
    fn generated_position_for(
        &self,
        source: &str,
        line: u32,
        column: i64,
        bias: Bias,
    ) -> Option<GeneratedPosition>;
}

/// The JSON shape of a version 3 source map.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    pub version: u32,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub source_root: Option<String>,
    pub sources: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping {
    generated_line: u32,
    generated_column: i64,
    source: Option<u32>,
    original_line: u32,
    original_column: i64,
}

impl Mapping {
    fn generated_key(&self) -> (u32, i64) {
        (self.generated_line, self.generated_column)
    }

    fn original_key(&self) -> (Option<u32>, u32, i64) {
        (self.source, self.original_line, self.original_column)
    }
}

/// Decoded mappings, sorted both ways for lookups.
#[derive(Debug, Clone)]
pub struct SourceMapIndex {
    sources: Vec<String>,
    by_generated: Vec<Mapping>,
    by_original: Vec<Mapping>,
}

fn base64_digit(byte: u8) -> Option<i64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(i64::from(value))
}

/// Decode one base64 VLQ segment into its fields.
fn decode_segment(segment: &str) -> Result<Vec<i64>> {
    let mut fields = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0;
    for byte in segment.bytes() {
        let digit = base64_digit(byte).ok_or_else(|| {
            CovError::SourceMap(format!("invalid base64 character {:?}", byte as char))
        })?;
        if shift > 60 {
            return Err(CovError::SourceMap("VLQ value overflows".to_string()));
        }
        value += (digit & 0x1f) << shift;
        if digit & 0x20 != 0 {
            shift += 5;
            continue;
        }
        let magnitude = value >> 1;
        fields.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }
    if shift != 0 {
        return Err(CovError::SourceMap(format!(
            "truncated VLQ segment {segment:?}"
        )));
    }
    Ok(fields)
}

fn add_delta(value: &mut i64, delta: i64) -> Result<()> {
    *value = value
        .checked_add(delta)
        .ok_or_else(|| CovError::SourceMap("mapping position overflows".to_string()))?;
    Ok(())
}

fn decode_mappings(mappings: &str, source_count: usize) -> Result<Vec<Mapping>> {
    let mut out = Vec::new();
    let (mut source, mut original_line, mut original_column) = (0i64, 0i64, 0i64);

    for (line_index, line) in mappings.split(';').enumerate() {
        let mut generated_column = 0i64;
        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_segment(segment)?;
            add_delta(&mut generated_column, fields[0])?;
            let mut mapping = Mapping {
                generated_line: line_index as u32 + 1,
                generated_column,
                source: None,
                original_line: 0,
                original_column: 0,
            };
            match fields.len() {
                1 => {}
                // Names are not used for coverage.
                4 | 5 => {
                    add_delta(&mut source, fields[1])?;
                    add_delta(&mut original_line, fields[2])?;
                    add_delta(&mut original_column, fields[3])?;
                    if source < 0 || source as usize >= source_count {
                        return Err(CovError::SourceMap(format!(
                            "mapping refers to missing source {source}"
                        )));
                    }
                    mapping.source = Some(source as u32);
                    mapping.original_line = u32::try_from(original_line.saturating_add(1))
                        .map_err(|_| {
                            CovError::SourceMap(format!(
                                "original line {original_line} out of range"
                            ))
                        })?;
                    mapping.original_column = original_column;
                }
                n => {
                    return Err(CovError::SourceMap(format!(
                        "mapping segment with {n} fields"
                    )))
                }
            }
            if generated_column < 0 || original_line < 0 || original_column < 0 {
                return Err(CovError::SourceMap(
                    "mapping has a negative position".to_string(),
                ));
            }
            out.push(mapping);
        }
    }
    Ok(out)
}

fn join_root(root: Option<&str>, source: &str) -> String {
    match root {
        Some(root)
            if !root.is_empty() && !source.starts_with('/') && !source.contains("://") =>
        {
            format!("{}/{source}", root.trim_end_matches('/'))
        }
        _ => source.to_string(),
    }
}

/// Index of the mapping `bias` selects for `needle` in a slice sorted by
/// `key`. Exact matches resolve to the lowest equal index.
fn search<K: Ord>(
    items: &[Mapping],
    needle: &K,
    key: impl Fn(&Mapping) -> K,
    bias: Bias,
) -> Option<usize> {
    match bias {
        Bias::LeastUpperBound => {
            let idx = items.partition_point(|m| key(m).cmp(needle) == Ordering::Less);
            (idx < items.len()).then_some(idx)
        }
        Bias::GreatestLowerBound => {
            let idx = items.partition_point(|m| key(m).cmp(needle) != Ordering::Greater);
            let mut found = idx.checked_sub(1)?;
            while found > 0 && key(&items[found - 1]) == key(&items[found]) {
                found -= 1;
            }
            Some(found)
        }
    }
}

impl SourceMapIndex {
    pub fn from_raw(raw: RawSourceMap) -> Result<Self> {
        if raw.version != 3 {
            return Err(CovError::SourceMap(format!(
                "unsupported source map version {}",
                raw.version
            )));
        }
        let sources: Vec<String> = raw
            .sources
            .iter()
            .map(|s| join_root(raw.source_root.as_deref(), s.as_deref().unwrap_or("")))
            .collect();
        let mut by_generated = decode_mappings(&raw.mappings, sources.len())?;
        by_generated.sort_by_key(Mapping::generated_key);

        let mut by_original: Vec<Mapping> = by_generated
            .iter()
            .filter(|m| m.source.is_some())
            .copied()
            .collect();
        by_original.sort_by_key(|m| (m.original_key(), m.generated_key()));

        Ok(Self {
            sources,
            by_generated,
            by_original,
        })
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawSourceMap = serde_json::from_value(value.clone())
            .map_err(|e| CovError::SourceMap(format!("malformed source map: {e}")))?;
        Self::from_raw(raw)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSourceMap = serde_json::from_str(json)
            .map_err(|e| CovError::SourceMap(format!("malformed source map: {e}")))?;
        Self::from_raw(raw)
    }

    /// Sources with the source root applied.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

impl SourceMapConsumer for SourceMapIndex {
    fn original_position_for(
        &self,
        line: u32,
        column: i64,
        bias: Bias,
    ) -> Option<OriginalPosition> {
        if line == 0 || column < 0 {
            return None;
        }
        let idx = search(&self.by_generated, &(line, column), Mapping::generated_key, bias)?;
        let mapping = self.by_generated[idx];
        if mapping.generated_line != line {
            return None;
        }
        let source = self.sources.get(mapping.source? as usize)?;
        Some(OriginalPosition {
            source: source.clone(),
            line: mapping.original_line,
            column: mapping.original_column,
        })
    }

    fn generated_position_for(
        &self,
        source: &str,
        line: u32,
        column: i64,
        bias: Bias,
    ) -> Option<GeneratedPosition> {
        if line == 0 || column < 0 {
            return None;
        }
        let source = self.sources.iter().position(|s| s == source)? as u32;
        let needle = (Some(source), line, column);
        let idx = search(&self.by_original, &needle, Mapping::original_key, bias)?;
        let mapping = self.by_original[idx];
        if mapping.source != Some(source) {
            return None;
        }
        Some(GeneratedPosition {
            line: mapping.generated_line,
            column: mapping.generated_column,
        })
    }
}
