use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde_json::Value;

use crate::error::{CovError, Result};
use crate::file::FileCoverage;
use crate::map::CoverageMap;

use super::consumer::SourceMapIndex;
use super::transformer::transform;

#[derive(Debug, Clone)]
enum MapSource {
    /// Base64 payload of a `data:` URL.
    Encoded(String),
    File(PathBuf),
    Inline(Value),
}

/// Source maps registered per generated file.
///
/// Maps are only read when coverage is transformed; a map that cannot be
/// read or parsed is logged and its file passes through unmapped.
#[derive(Debug, Clone, Default)]
pub struct MapStore {
    maps: HashMap<String, MapSource>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `sourceMappingURL` found in `generated_file`. Relative
    /// URLs are resolved against the generated file's directory.
    pub fn register_url(&mut self, generated_file: &str, url: &str) {
        if let Some(rest) = url.strip_prefix("data:") {
            match rest.split_once("base64,") {
                Some((_, payload)) => {
                    self.maps.insert(
                        generated_file.to_string(),
                        MapSource::Encoded(payload.to_string()),
                    );
                }
                None => tracing::warn!("{generated_file}: unsupported source map URL {url}"),
            }
            return;
        }
        let dir = Path::new(generated_file)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        self.maps
            .insert(generated_file.to_string(), MapSource::File(dir.join(url)));
    }

    /// Register an already parsed source map object.
    pub fn register_map(&mut self, generated_file: &str, map: Value) {
        self.maps
            .insert(generated_file.to_string(), MapSource::Inline(map));
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    fn read(source: &MapSource) -> Result<SourceMapIndex> {
        match source {
            MapSource::Encoded(payload) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload.trim())
                    .map_err(|e| CovError::SourceMap(format!("bad base64 payload: {e}")))?;
                let json = String::from_utf8(bytes)
                    .map_err(|e| CovError::SourceMap(format!("source map is not UTF-8: {e}")))?;
                SourceMapIndex::from_json(&json)
            }
            MapSource::File(path) => SourceMapIndex::from_json(&fs::read_to_string(path)?),
            MapSource::Inline(value) => SourceMapIndex::from_value(value),
        }
    }

    /// Registered map for `fc`, falling back to its `inputSourceMap`.
    fn find(&self, fc: &FileCoverage) -> Option<SourceMapIndex> {
        let result = match (self.maps.get(fc.path()), &fc.input_source_map) {
            (Some(source), _) => Self::read(source),
            (None, Some(value)) => SourceMapIndex::from_value(value),
            (None, None) => return None,
        };
        match result {
            Ok(map) => Some(map),
            Err(e) => {
                tracing::warn!("{}: ignoring source map: {e}", fc.path());
                None
            }
        }
    }

    /// Remap `coverage` onto original sources.
    pub fn transform_coverage(&self, coverage: &CoverageMap) -> CoverageMap {
        transform(coverage, |fc: &FileCoverage| self.find(fc))
    }
}
