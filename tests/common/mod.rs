#![allow(dead_code)]

use std::path::PathBuf;

use jscov::file::{BranchMapping, BranchType, FileCoverage};
use jscov::instrument::{Instrument, InstrumentOptions, InstrumentOutput, Instrumenter};
use jscov::location::{Location, Position};
use tempfile::TempDir;

pub fn loc(line: u32, start: i64, end: i64) -> Location {
    Location::new(Position::new(line, start), Position::new(line, end))
}

/// A file with one statement per entry of `hits`, on consecutive lines,
/// plus one two-way `if` branch on line 1 when `branch` is given.
pub fn file_coverage(path: &str, hits: &[u64], branch: Option<[u64; 2]>) -> FileCoverage {
    let mut fc = FileCoverage::new(path);
    for (i, h) in hits.iter().enumerate() {
        let id = i as u32;
        fc.statement_map.insert(id, loc(id + 1, 0, 10));
        fc.s.insert(id, *h);
    }
    if let Some(counts) = branch {
        fc.branch_map.insert(
            0,
            BranchMapping {
                loc: Some(loc(1, 0, 10)),
                kind: BranchType::If,
                locations: vec![loc(1, 0, 10), loc(1, 0, 10)],
                line: Some(1),
            },
        );
        fc.b.insert(0, counts.to_vec());
    }
    fc
}

pub fn instrument(code: &str, filename: &str) -> InstrumentOutput {
    Instrumenter::new(InstrumentOptions::default())
        .unwrap()
        .instrument_sync(code, filename, None)
        .unwrap()
}

/// Write `contents` into a fresh temporary directory. The caller must hold
/// onto `TempDir` to keep the file alive.
pub fn write_temp(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
