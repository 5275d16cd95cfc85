use std::collections::{BTreeMap, HashMap};

use crate::file::{BranchMapping, BranchType, FileCoverage, FunctionMapping};
use crate::location::{Location, Position};

type RangeKey = (Position, Position);

/// Coverage accumulated for one original source file.
///
/// Several generated entries can land on the same original range (a
/// source inlined twice, or two bundles of the same module). Entries with
/// equal ranges share one id and their hits add up.
#[derive(Debug)]
pub struct MappedCoverage {
    data: FileCoverage,
    statements: HashMap<RangeKey, u32>,
    functions: HashMap<RangeKey, u32>,
    branches: HashMap<Vec<RangeKey>, u32>,
}

fn next_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    map.keys().next_back().map_or(0, |id| id + 1)
}

impl MappedCoverage {
    pub fn new(path: impl Into<String>) -> Self {
        Self::from_file_coverage(FileCoverage::new(path))
    }

    /// Start from existing coverage, keeping its ids.
    pub fn from_file_coverage(data: FileCoverage) -> Self {
        let statements = data
            .statement_map
            .iter()
            .map(|(id, loc)| (loc.range_key(), *id))
            .collect();
        let functions = data
            .fn_map
            .iter()
            .map(|(id, meta)| (meta.decl.range_key(), *id))
            .collect();
        let branches = data
            .branch_map
            .iter()
            .map(|(id, meta)| (branch_key(&meta.locations), *id))
            .collect();
        Self {
            data,
            statements,
            functions,
            branches,
        }
    }

    pub fn path(&self) -> &str {
        self.data.path()
    }

    pub fn add_statement(&mut self, loc: Location, hits: u64) -> u32 {
        let id = match self.statements.get(&loc.range_key()) {
            Some(id) => *id,
            None => {
                let id = next_id(&self.data.statement_map);
                self.data.statement_map.insert(id, loc);
                self.statements.insert(loc.range_key(), id);
                id
            }
        };
        *self.data.s.entry(id).or_insert(0) += hits;
        id
    }

    /// Functions are identified by their declaration range.
    pub fn add_function(&mut self, name: &str, decl: Location, loc: Location, hits: u64) -> u32 {
        let id = match self.functions.get(&decl.range_key()) {
            Some(id) => *id,
            None => {
                let id = next_id(&self.data.fn_map);
                self.data.fn_map.insert(
                    id,
                    FunctionMapping {
                        name: name.to_string(),
                        decl,
                        loc,
                        line: Some(loc.start.line),
                        skip: loc.skip,
                    },
                );
                self.functions.insert(decl.range_key(), id);
                id
            }
        };
        *self.data.f.entry(id).or_insert(0) += hits;
        id
    }

    /// Branches are identified by the ranges of all their outcomes.
    pub fn add_branch(
        &mut self,
        kind: BranchType,
        loc: Location,
        locations: Vec<Location>,
        hits: &[u64],
    ) -> u32 {
        let key = branch_key(&locations);
        let id = match self.branches.get(&key) {
            Some(id) => *id,
            None => {
                let id = next_id(&self.data.branch_map);
                self.data.b.insert(id, vec![0; locations.len()]);
                self.data.branch_map.insert(
                    id,
                    BranchMapping {
                        loc: Some(loc),
                        kind,
                        locations,
                        line: Some(loc.start.line),
                    },
                );
                self.branches.insert(key, id);
                id
            }
        };
        if let Some(counts) = self.data.b.get_mut(&id) {
            for (count, hit) in counts.iter_mut().zip(hits) {
                *count += hit;
            }
        }
        id
    }

    pub fn into_file_coverage(self) -> FileCoverage {
        self.data
    }
}

fn branch_key(locations: &[Location]) -> Vec<RangeKey> {
    locations.iter().map(Location::range_key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, sc: i64, ec: i64) -> Location {
        Location::new(Position::new(line, sc), Position::new(line, ec))
    }

    #[test]
    fn test_equal_ranges_share_an_id() {
        let mut mc = MappedCoverage::new("/src/a.ts");
        assert_eq!(mc.add_statement(loc(1, 0, 5), 2), 0);
        assert_eq!(mc.add_statement(loc(2, 0, 5), 1), 1);
        assert_eq!(mc.add_statement(loc(1, 0, 5), 3), 0);

        let fc = mc.into_file_coverage();
        assert_eq!(fc.path(), "/src/a.ts");
        assert_eq!(fc.s[&0], 5);
        assert_eq!(fc.s[&1], 1);
    }

    #[test]
    fn test_functions_dedupe_on_decl() {
        let mut mc = MappedCoverage::new("/src/a.ts");
        let first = mc.add_function("f", loc(1, 9, 10), loc(1, 0, 20), 1);
        let again = mc.add_function("f", loc(1, 9, 10), loc(1, 0, 22), 4);
        assert_eq!(first, again);
        let fc = mc.into_file_coverage();
        assert_eq!(fc.f[&first], 5);
        assert_eq!(fc.fn_map[&first].loc, loc(1, 0, 20));
    }

    #[test]
    fn test_branch_hits_add_elementwise() {
        let mut mc = MappedCoverage::new("/src/a.ts");
        let outcomes = vec![loc(3, 0, 4), loc(3, 8, 12)];
        mc.add_branch(BranchType::If, loc(3, 0, 12), outcomes.clone(), &[1, 0]);
        mc.add_branch(BranchType::If, loc(3, 0, 12), outcomes, &[2, 5]);
        mc.add_branch(BranchType::If, loc(4, 0, 12), vec![loc(4, 0, 4)], &[1]);
        let fc = mc.into_file_coverage();
        assert_eq!(fc.b[&0], vec![3, 5]);
        assert_eq!(fc.b[&1], vec![1]);
    }

    #[test]
    fn test_existing_ids_are_kept() {
        let mut fc = FileCoverage::new("/src/a.js");
        fc.statement_map.insert(4, loc(1, 0, 3));
        fc.s.insert(4, 1);
        let mut mc = MappedCoverage::from_file_coverage(fc);
        assert_eq!(mc.add_statement(loc(1, 0, 3), 1), 4);
        assert_eq!(mc.add_statement(loc(2, 0, 3), 0), 5);
        assert_eq!(mc.into_file_coverage().s[&4], 2);
    }
}
