//! Explicit stand-in for the global object instrumented code writes to.
//!
//! One registry holds the live coverage objects of one process, keyed by
//! file path. Separate registries never share state, which is what tests
//! and multi-worker setups want.

use indexmap::IndexMap;

use crate::error::{CovError, Result};
use crate::file::FileCoverage;
use crate::map::CoverageMap;

use super::InstrumentOutput;

/// What [`CoverageRegistry::register`] did with a coverage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First registration for the path.
    Created,
    /// Same hash already present; accumulated hits are kept.
    Reused,
    /// A stale object with a different hash was replaced.
    Replaced,
}

#[derive(Debug, Clone)]
struct Entry {
    hash: String,
    coverage: FileCoverage,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageRegistry {
    files: IndexMap<String, Entry>,
}

impl CoverageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `coverage` for its path. Loading the same file again must
    /// not wipe its hits, so an entry with the same hash is reused.
    pub fn register(&mut self, hash: &str, coverage: FileCoverage) -> Registration {
        let path = coverage.path().to_string();
        match self.files.get_mut(&path) {
            Some(entry) if entry.hash == hash => Registration::Reused,
            Some(entry) => {
                tracing::debug!("replacing stale coverage for {path}");
                *entry = Entry {
                    hash: hash.to_string(),
                    coverage,
                };
                Registration::Replaced
            }
            None => {
                self.files.insert(
                    path,
                    Entry {
                        hash: hash.to_string(),
                        coverage,
                    },
                );
                Registration::Created
            }
        }
    }

    /// Register the skeleton produced by the instrumenter.
    pub fn register_output(&mut self, output: &InstrumentOutput) -> Registration {
        self.register(&output.hash, output.coverage.clone())
    }

    fn file_mut(&mut self, path: &str) -> Result<&mut FileCoverage> {
        self.files
            .get_mut(path)
            .map(|entry| &mut entry.coverage)
            .ok_or_else(|| CovError::NotFound(path.to_string()))
    }

    pub fn hit_statement(&mut self, path: &str, id: u32) -> Result<()> {
        let fc = self.file_mut(path)?;
        let hits = fc
            .s
            .get_mut(&id)
            .ok_or_else(|| CovError::InvalidInput(format!("{path}: no statement {id}")))?;
        *hits += 1;
        Ok(())
    }

    pub fn hit_function(&mut self, path: &str, id: u32) -> Result<()> {
        let fc = self.file_mut(path)?;
        let hits = fc
            .f
            .get_mut(&id)
            .ok_or_else(|| CovError::InvalidInput(format!("{path}: no function {id}")))?;
        *hits += 1;
        Ok(())
    }

    pub fn hit_branch(&mut self, path: &str, id: u32, outcome: usize) -> Result<()> {
        let fc = self.file_mut(path)?;
        let hits = fc
            .b
            .get_mut(&id)
            .and_then(|counts| counts.get_mut(outcome))
            .ok_or_else(|| {
                CovError::InvalidInput(format!("{path}: no outcome {outcome} for branch {id}"))
            })?;
        *hits += 1;
        Ok(())
    }

    pub fn coverage_for(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path).map(|entry| &entry.coverage)
    }

    /// Snapshot of every registered file.
    pub fn to_coverage_map(&self) -> CoverageMap {
        self.files
            .values()
            .map(|entry| entry.coverage.clone())
            .collect()
    }

    /// Snapshot in the `{ path: FileCoverage }` form written to disk.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_coverage_map())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Location, Position};

    fn skeleton() -> FileCoverage {
        let mut fc = FileCoverage::new("/a.js");
        fc.statement_map.insert(
            0,
            Location::new(Position::new(1, 0), Position::new(1, 4)),
        );
        fc.s.insert(0, 0);
        fc
    }

    #[test]
    fn test_same_hash_keeps_hits() {
        let mut reg = CoverageRegistry::new();
        assert_eq!(reg.register("h1", skeleton()), Registration::Created);
        reg.hit_statement("/a.js", 0).unwrap();
        assert_eq!(reg.register("h1", skeleton()), Registration::Reused);
        assert_eq!(reg.coverage_for("/a.js").unwrap().s[&0], 1);
    }

    #[test]
    fn test_new_hash_self_heals() {
        let mut reg = CoverageRegistry::new();
        reg.register("h1", skeleton());
        reg.hit_statement("/a.js", 0).unwrap();
        assert_eq!(reg.register("h2", skeleton()), Registration::Replaced);
        assert_eq!(reg.coverage_for("/a.js").unwrap().s[&0], 0);
    }

    #[test]
    fn test_unknown_targets() {
        let mut reg = CoverageRegistry::new();
        assert!(matches!(
            reg.hit_statement("/missing.js", 0),
            Err(CovError::NotFound(_))
        ));
        reg.register("h1", skeleton());
        assert!(reg.hit_statement("/a.js", 7).is_err());
        assert!(reg.hit_branch("/a.js", 0, 0).is_err());
    }

    #[test]
    fn test_json_snapshot_parses_back() {
        let mut reg = CoverageRegistry::new();
        reg.register("h1", skeleton());
        reg.hit_statement("/a.js", 0).unwrap();
        let map = CoverageMap::from_json(&reg.to_json().unwrap()).unwrap();
        assert_eq!(map.file_coverage_for("/a.js").unwrap().s[&0], 1);
    }
}
