//! Coverage for a set of files, keyed by path.

use indexmap::IndexMap;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::{CovError, Result};
use crate::file::FileCoverage;
use crate::summary::CoverageSummary;

/// File path -> coverage, in the order files were first added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageMap {
    data: IndexMap<String, FileCoverage>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{ path: FileCoverage }` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: CoverageMap = serde_json::from_str(json)?;
        for (key, fc) in &map.data {
            if key != fc.path() {
                return Err(CovError::InvalidInput(format!(
                    "coverage keyed by '{key}' describes '{}'",
                    fc.path()
                )));
            }
        }
        Ok(map)
    }

    /// Add a file's coverage, merging with what is already known for the
    /// same path.
    pub fn add_file_coverage(&mut self, fc: FileCoverage) -> Result<()> {
        match self.data.get_mut(fc.path()) {
            Some(existing) => existing.merge(&fc),
            None => {
                self.data.insert(fc.path().to_string(), fc);
                Ok(())
            }
        }
    }

    /// Merge every file of `other` into this map.
    pub fn merge(&mut self, other: &CoverageMap) -> Result<()> {
        for fc in other.data.values() {
            self.add_file_coverage(fc.clone())?;
        }
        Ok(())
    }

    /// Keep only the files for which `keep` returns true.
    pub fn filter(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.data.retain(|path, _| keep(path));
    }

    /// Drop every file whose path matches one of `patterns`.
    pub fn exclude(&mut self, patterns: &RegexSet) {
        self.filter(|path| !patterns.is_match(path));
    }

    pub fn files(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    pub fn file_coverage_for(&self, path: &str) -> Result<&FileCoverage> {
        self.data
            .get(path)
            .ok_or_else(|| CovError::NotFound(path.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileCoverage> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Summary over all files.
    #[must_use]
    pub fn coverage_summary(&self) -> CoverageSummary {
        let mut summary = CoverageSummary::new();
        for fc in self.data.values() {
            summary.merge(&fc.to_summary());
        }
        summary
    }
}

impl FromIterator<FileCoverage> for CoverageMap {
    /// Collect files; coverage for a repeated path is merged where the
    /// shapes agree and otherwise keeps the first occurrence.
    fn from_iter<I: IntoIterator<Item = FileCoverage>>(iter: I) -> Self {
        let mut map = CoverageMap::new();
        for fc in iter {
            if let Err(e) = map.add_file_coverage(fc) {
                tracing::warn!("dropping incompatible coverage: {e}");
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Location, Position};

    fn file(path: &str, hits: &[u64]) -> FileCoverage {
        let mut fc = FileCoverage::new(path);
        for (i, h) in hits.iter().enumerate() {
            let line = i as u32 + 1;
            fc.statement_map.insert(
                i as u32,
                Location::new(Position::new(line, 0), Position::new(line, 5)),
            );
            fc.s.insert(i as u32, *h);
        }
        fc
    }

    #[test]
    fn test_merge_adds_and_delegates() {
        let mut a: CoverageMap = vec![file("/a.js", &[1, 0])].into_iter().collect();
        let b: CoverageMap = vec![file("/a.js", &[0, 2]), file("/b.js", &[1])]
            .into_iter()
            .collect();
        a.merge(&b).unwrap();
        assert_eq!(a.files(), vec!["/a.js", "/b.js"]);
        let fa = a.file_coverage_for("/a.js").unwrap();
        assert_eq!(fa.s[&0], 1);
        assert_eq!(fa.s[&1], 2);
    }

    #[test]
    fn test_file_coverage_for_missing_is_not_found() {
        let map = CoverageMap::new();
        assert!(matches!(
            map.file_coverage_for("/nope.js"),
            Err(CovError::NotFound(p)) if p == "/nope.js"
        ));
    }

    #[test]
    fn test_exclude_removes_files_only() {
        let mut map: CoverageMap = vec![
            file("/src/a.js", &[1]),
            file("/test/a.test.js", &[1]),
            file("/node_modules/x/index.js", &[0]),
        ]
        .into_iter()
        .collect();
        let patterns = RegexSet::new([r"^/test/", r"/node_modules/"]).unwrap();
        map.exclude(&patterns);
        assert_eq!(map.files(), vec!["/src/a.js"]);
    }

    #[test]
    fn test_summary_merges_files() {
        let map: CoverageMap = vec![file("/a.js", &[1, 0]), file("/b.js", &[3, 3])]
            .into_iter()
            .collect();
        let summary = map.coverage_summary();
        assert_eq!(summary.statements.total, 4);
        assert_eq!(summary.statements.covered, 3);
        assert_eq!(summary.statements.pct, 75.0);
    }

    #[test]
    fn test_from_json_checks_keys() {
        let json = r#"{ "/a.js": { "path": "/b.js", "statementMap": {}, "s": {},
            "fnMap": {}, "f": {}, "branchMap": {}, "b": {} } }"#;
        assert!(CoverageMap::from_json(json).is_err());
    }
}
