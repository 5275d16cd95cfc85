//! Per-file coverage in the raw istanbul shape.
//!
//! Reference: https://github.com/istanbuljs/istanbuljs (lib-coverage)
//!
//! The serialized form is a JSON object with:
//!   - `statementMap`: `{ "0": { "start": {..}, "end": {..} }, ... }`
//!   - `s`:            `{ "0": 5, ... }` hit counts per statement
//!   - `fnMap`:        `{ "0": { "name", "decl", "loc" }, ... }`
//!   - `f`:            `{ "0": 3, ... }` hit counts per function
//!   - `branchMap`:    `{ "0": { "loc", "type", "locations": [..] }, ... }`
//!   - `b`:            `{ "0": [5, 0], ... }` hit counts per branch outcome
//!
//! plus the optional `all` marker and `inputSourceMap`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CovError, Result};
use crate::location::Location;
use crate::summary::{percent, CoverageSummary, Totals};

/// Kind of branching construct a branch id was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchType {
    If,
    Switch,
    CondExpr,
    BinaryExpr,
    DefaultArg,
}

impl BranchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchType::If => "if",
            BranchType::Switch => "switch",
            BranchType::CondExpr => "cond-expr",
            BranchType::BinaryExpr => "binary-expr",
            BranchType::DefaultArg => "default-arg",
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function metadata: `decl` is the name token, `loc` the body span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMapping {
    pub name: String,
    pub decl: Location,
    pub loc: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

/// Branch metadata with one location per outcome.
///
/// Older producers omit `loc`; consumers then anchor on the first outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    #[serde(rename = "type")]
    pub kind: BranchType,
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl BranchMapping {
    /// Line the branch is reported on.
    #[must_use]
    pub fn anchor_line(&self) -> Option<u32> {
        self.loc
            .map(|loc| loc.start.line)
            .or_else(|| self.locations.first().map(|loc| loc.start.line))
    }
}

/// Branch outcome totals for one source line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineBranchCoverage {
    pub covered: u64,
    pub total: u64,
    pub coverage: f64,
}

/// Coverage for exactly one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFileCoverage")]
pub struct FileCoverage {
    path: String,
    #[serde(rename = "statementMap")]
    pub statement_map: BTreeMap<u32, Location>,
    #[serde(rename = "fnMap")]
    pub fn_map: BTreeMap<u32, FunctionMapping>,
    #[serde(rename = "branchMap")]
    pub branch_map: BTreeMap<u32, BranchMapping>,
    pub s: BTreeMap<u32, u64>,
    pub f: BTreeMap<u32, u64>,
    pub b: BTreeMap<u32, Vec<u64>>,
    /// Loaded but never executed: carries no information during merges.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
    #[serde(
        rename = "inputSourceMap",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_source_map: Option<Value>,
}

/// Wire shape accepted before the key invariants are checked.
#[derive(Deserialize)]
struct RawFileCoverage {
    path: String,
    #[serde(rename = "statementMap")]
    statement_map: BTreeMap<u32, Location>,
    #[serde(rename = "fnMap")]
    fn_map: BTreeMap<u32, FunctionMapping>,
    #[serde(rename = "branchMap")]
    branch_map: BTreeMap<u32, BranchMapping>,
    s: BTreeMap<u32, u64>,
    f: BTreeMap<u32, u64>,
    b: BTreeMap<u32, Vec<u64>>,
    #[serde(default)]
    all: bool,
    #[serde(rename = "inputSourceMap", default)]
    input_source_map: Option<Value>,
}

impl TryFrom<RawFileCoverage> for FileCoverage {
    type Error = CovError;

    fn try_from(raw: RawFileCoverage) -> Result<Self> {
        let fc = FileCoverage {
            path: raw.path,
            statement_map: raw.statement_map,
            fn_map: raw.fn_map,
            branch_map: raw.branch_map,
            s: raw.s,
            f: raw.f,
            b: raw.b,
            all: raw.all,
            input_source_map: raw.input_source_map,
        };
        fc.validate()?;
        Ok(fc)
    }
}

impl FileCoverage {
    /// Empty coverage for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            statement_map: BTreeMap::new(),
            fn_map: BTreeMap::new(),
            branch_map: BTreeMap::new(),
            s: BTreeMap::new(),
            f: BTreeMap::new(),
            b: BTreeMap::new(),
            all: false,
            input_source_map: None,
        }
    }

    /// Parse and validate one serialized file coverage object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check that every map has a matching counter table.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(CovError::InvalidInput(
                "file coverage is missing a path".to_string(),
            ));
        }
        if !self.s.keys().eq(self.statement_map.keys()) {
            return Err(self.invalid("statement ids in `s` and `statementMap` differ"));
        }
        if !self.f.keys().eq(self.fn_map.keys()) {
            return Err(self.invalid("function ids in `f` and `fnMap` differ"));
        }
        if !self.b.keys().eq(self.branch_map.keys()) {
            return Err(self.invalid("branch ids in `b` and `branchMap` differ"));
        }
        for (id, counts) in &self.b {
            let outcomes = self.branch_map.get(id).map_or(0, |m| m.locations.len());
            if counts.len() != outcomes {
                return Err(self.invalid(&format!(
                    "branch {id} has {} counts for {outcomes} locations",
                    counts.len()
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, msg: &str) -> CovError {
        CovError::InvalidInput(format!("{}: {msg}", self.path))
    }

    /// Merge another observation of the same file into this one.
    ///
    /// Hit counts are summed per id, branch counts element-wise. Ids only
    /// present in `other` are added. A side carrying the `all` marker is
    /// discarded in favour of the other side. On error `self` is left
    /// untouched.
    pub fn merge(&mut self, other: &FileCoverage) -> Result<()> {
        if self.path != other.path {
            return Err(CovError::PathMismatch {
                expected: self.path.clone(),
                found: other.path.clone(),
            });
        }
        if other.all {
            return Ok(());
        }
        if self.all {
            *self = other.clone();
            return Ok(());
        }

        for (id, counts) in &other.b {
            if let Some(mine) = self.b.get(id) {
                if mine.len() != counts.len() {
                    return Err(CovError::BranchShapeMismatch {
                        path: self.path.clone(),
                        branch: *id,
                        expected: mine.len(),
                        found: counts.len(),
                    });
                }
            }
        }

        for (id, hits) in &other.s {
            if let Some(loc) = other.statement_map.get(id) {
                self.statement_map.entry(*id).or_insert(*loc);
            }
            *self.s.entry(*id).or_insert(0) += hits;
        }

        for (id, hits) in &other.f {
            if let Some(mapping) = other.fn_map.get(id) {
                self.fn_map.entry(*id).or_insert_with(|| mapping.clone());
            }
            *self.f.entry(*id).or_insert(0) += hits;
        }

        for (id, counts) in &other.b {
            match self.b.get_mut(id) {
                Some(mine) => {
                    for (total, hits) in mine.iter_mut().zip(counts) {
                        *total += hits;
                    }
                }
                None => {
                    if let Some(mapping) = other.branch_map.get(id) {
                        self.branch_map.insert(*id, mapping.clone());
                    }
                    self.b.insert(*id, counts.clone());
                }
            }
        }

        if self.input_source_map.is_none() {
            self.input_source_map = other.input_source_map.clone();
        }
        Ok(())
    }

    /// Zero every counter, keeping the maps.
    pub fn reset_hits(&mut self) {
        self.s.values_mut().for_each(|hits| *hits = 0);
        self.f.values_mut().for_each(|hits| *hits = 0);
        self.b
            .values_mut()
            .for_each(|counts| counts.iter_mut().for_each(|hits| *hits = 0));
    }

    /// Line number -> hit count, where a line's count is the maximum over
    /// the statements starting on it.
    #[must_use]
    pub fn line_coverage(&self) -> BTreeMap<u32, u64> {
        let mut lines: BTreeMap<u32, u64> = BTreeMap::new();
        for (id, loc) in &self.statement_map {
            let hits = self.s.get(id).copied().unwrap_or(0);
            lines
                .entry(loc.start.line)
                .and_modify(|e| *e = (*e).max(hits))
                .or_insert(hits);
        }
        lines
    }

    /// Sorted lines whose best statement was never executed.
    #[must_use]
    pub fn uncovered_lines(&self) -> Vec<u32> {
        self.line_coverage()
            .into_iter()
            .filter(|&(_, hits)| hits == 0)
            .map(|(line, _)| line)
            .collect()
    }

    /// Branch outcomes grouped by the line of their branch.
    #[must_use]
    pub fn branch_coverage_by_line(&self) -> BTreeMap<u32, LineBranchCoverage> {
        let mut outcomes: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
        for (id, mapping) in &self.branch_map {
            let Some(line) = mapping.anchor_line() else {
                continue;
            };
            if let Some(counts) = self.b.get(id) {
                outcomes.entry(line).or_default().extend(counts);
            }
        }

        outcomes
            .into_iter()
            .map(|(line, counts)| {
                let total = counts.len() as u64;
                let covered = counts.iter().filter(|&&hits| hits > 0).count() as u64;
                let coverage = if total == 0 {
                    100.0
                } else {
                    covered as f64 / total as f64 * 100.0
                };
                (
                    line,
                    LineBranchCoverage {
                        covered,
                        total,
                        coverage,
                    },
                )
            })
            .collect()
    }

    /// Compute the four metric groups for this file.
    #[must_use]
    pub fn to_summary(&self) -> CoverageSummary {
        let statements = simple_totals(
            self.s
                .iter()
                .map(|(id, hits)| (*hits, self.statement_map.get(id).is_some_and(|l| l.skip))),
        );
        let functions = simple_totals(
            self.f
                .iter()
                .map(|(id, hits)| (*hits, self.fn_map.get(id).is_some_and(|m| m.skip))),
        );
        let branches = simple_totals(self.b.iter().flat_map(|(id, counts)| {
            let mapping = self.branch_map.get(id);
            counts.iter().enumerate().map(move |(i, hits)| {
                let skip = mapping
                    .and_then(|m| m.locations.get(i))
                    .is_some_and(|l| l.skip);
                (*hits, skip)
            })
        }));

        let line_hits = self.line_coverage();
        let covered_lines = line_hits.values().filter(|&&hits| hits > 0).count() as u64;
        let lines = Totals {
            total: line_hits.len() as u64,
            covered: covered_lines,
            skipped: 0,
            pct: percent(covered_lines, line_hits.len() as u64),
        };

        CoverageSummary {
            lines,
            statements,
            functions,
            branches,
        }
    }
}

/// Totals over `(hits, skipped)` pairs. Skipped entries count only toward
/// `skipped`.
fn simple_totals(entries: impl Iterator<Item = (u64, bool)>) -> Totals {
    let (mut total, mut covered, mut skipped) = (0, 0, 0);
    for (hits, skip) in entries {
        if skip {
            skipped += 1;
            continue;
        }
        total += 1;
        if hits > 0 {
            covered += 1;
        }
    }
    Totals::new(total, covered, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Position;

    fn loc(line: u32, start: i64, end: i64) -> Location {
        Location::new(Position::new(line, start), Position::new(line, end))
    }

    fn three_statements() -> FileCoverage {
        let mut fc = FileCoverage::new("/src/app.js");
        fc.statement_map.insert(1, loc(1, 0, 10));
        fc.statement_map.insert(2, loc(1, 12, 20));
        fc.statement_map.insert(3, loc(2, 0, 8));
        fc.s.insert(1, 0);
        fc.s.insert(2, 1);
        fc.s.insert(3, 0);
        fc
    }

    fn with_branch(counts: Vec<u64>) -> FileCoverage {
        let mut fc = FileCoverage::new("/src/app.js");
        let locations = (0..counts.len() as i64).map(|i| loc(3, i * 5, i * 5 + 4)).collect();
        fc.branch_map.insert(
            0,
            BranchMapping {
                loc: Some(loc(3, 0, 20)),
                kind: BranchType::If,
                locations,
                line: Some(3),
            },
        );
        fc.b.insert(0, counts);
        fc
    }

    #[test]
    fn test_uncovered_lines_use_max_per_line() {
        let fc = three_statements();
        assert_eq!(fc.uncovered_lines(), vec![2]);
        let lines = fc.line_coverage();
        assert_eq!(lines[&1], 1);
        assert_eq!(lines[&2], 0);
    }

    #[test]
    fn test_summary_counts() {
        let mut fc = three_statements();
        fc.branch_map = with_branch(vec![2, 0]).branch_map;
        fc.b.insert(0, vec![2, 0]);
        let summary = fc.to_summary();
        assert_eq!(summary.statements.total, 3);
        assert_eq!(summary.statements.covered, 1);
        assert_eq!(summary.lines.total, 2);
        assert_eq!(summary.lines.covered, 1);
        assert_eq!(summary.lines.pct, 50.0);
        assert_eq!(summary.branches.total, 2);
        assert_eq!(summary.branches.covered, 1);
        assert_eq!(summary.functions.total, 0);
        assert_eq!(summary.functions.pct, 100.0);
    }

    #[test]
    fn test_skipped_excluded_from_totals() {
        let mut fc = with_branch(vec![3, 0]);
        let mapping = fc.branch_map.get_mut(&0).unwrap();
        mapping.locations[1].skip = true;
        let summary = fc.to_summary();
        assert_eq!(summary.branches.total, 1);
        assert_eq!(summary.branches.covered, 1);
        assert_eq!(summary.branches.skipped, 1);
        assert_eq!(summary.branches.pct, 100.0);
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = with_branch(vec![1, 0]);
        let b = with_branch(vec![0, 1]);
        a.merge(&b).unwrap();
        assert_eq!(a.b[&0], vec![1, 1]);
    }

    #[test]
    fn test_merge_adds_missing_ids() {
        let mut a = FileCoverage::new("/src/app.js");
        let b = three_statements();
        a.merge(&b).unwrap();
        assert_eq!(a.statement_map.len(), 3);
        assert_eq!(a.s[&2], 1);
    }

    #[test]
    fn test_merge_rejects_other_path() {
        let mut a = FileCoverage::new("/src/a.js");
        let b = FileCoverage::new("/src/b.js");
        assert!(matches!(
            a.merge(&b),
            Err(CovError::PathMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_branch_shape_mismatch_is_an_error() {
        let mut a = with_branch(vec![1, 0]);
        let b = with_branch(vec![1, 0, 4]);
        let before = a.clone();
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(
            err,
            CovError::BranchShapeMismatch {
                branch: 0,
                expected: 2,
                found: 3,
                ..
            }
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn test_all_marker_is_absorbed_in_either_order() {
        let real = three_statements();
        let mut baseline = three_statements();
        baseline.reset_hits();
        baseline.all = true;

        let mut left = baseline.clone();
        left.merge(&real).unwrap();
        let mut right = real.clone();
        right.merge(&baseline).unwrap();

        assert_eq!(left, real);
        assert_eq!(right, real);
    }

    #[test]
    fn test_reset_hits_keeps_maps() {
        let mut fc = with_branch(vec![4, 2]);
        fc.merge(&three_statements()).unwrap();
        fc.reset_hits();
        assert!(fc.s.values().all(|&h| h == 0));
        assert_eq!(fc.b[&0], vec![0, 0]);
        assert_eq!(fc.statement_map.len(), 3);
    }

    #[test]
    fn test_branch_coverage_by_line_both_shapes() {
        let mut fc = with_branch(vec![1, 0]);
        // Old shape: no `loc`, anchored on the first location.
        fc.branch_map.insert(
            1,
            BranchMapping {
                loc: None,
                kind: BranchType::CondExpr,
                locations: vec![loc(7, 0, 2), loc(7, 4, 6)],
                line: None,
            },
        );
        fc.b.insert(1, vec![2, 2]);

        let by_line = fc.branch_coverage_by_line();
        assert_eq!(by_line[&3].covered, 1);
        assert_eq!(by_line[&3].total, 2);
        assert_eq!(by_line[&3].coverage, 50.0);
        assert_eq!(by_line[&7].covered, 2);
        assert_eq!(by_line[&7].coverage, 100.0);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "path": "/src/app.js",
            "statementMap": {
                "0": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 10 } }
            },
            "fnMap": {
                "0": {
                    "name": "main",
                    "decl": { "start": { "line": 1, "column": 9 }, "end": { "line": 1, "column": 13 } },
                    "loc": { "start": { "line": 1, "column": 16 }, "end": { "line": 3, "column": 1 } },
                    "line": 1
                }
            },
            "branchMap": {
                "0": {
                    "loc": { "start": { "line": 2, "column": 2 }, "end": { "line": 2, "column": 20 } },
                    "type": "cond-expr",
                    "locations": [
                        { "start": { "line": 2, "column": 6 }, "end": { "line": 2, "column": 7 } },
                        { "start": { "line": 2, "column": 10 }, "end": { "line": 2, "column": null } }
                    ],
                    "line": 2
                }
            },
            "s": { "0": 3 },
            "f": { "0": 1 },
            "b": { "0": [1, 2] }
        }"#;
        let fc = FileCoverage::from_json(json).unwrap();
        let again = FileCoverage::from_json(&serde_json::to_string(&fc).unwrap()).unwrap();
        assert_eq!(fc, again);
        assert_eq!(fc.branch_map[&0].kind, BranchType::CondExpr);
    }

    #[test]
    fn test_missing_key_fails() {
        let json = r#"{ "path": "/a.js", "statementMap": {}, "s": {}, "fnMap": {}, "f": {}, "b": {} }"#;
        assert!(FileCoverage::from_json(json).is_err());
    }

    #[test]
    fn test_mismatched_keys_fail() {
        let json = r#"{
            "path": "/a.js",
            "statementMap": { "0": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 1 } } },
            "s": {}, "fnMap": {}, "f": {}, "branchMap": {}, "b": {}
        }"#;
        let err = FileCoverage::from_json(json).unwrap_err();
        assert!(err.to_string().contains("statementMap"));
    }
}
