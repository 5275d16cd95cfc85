//! Coverage skeleton built up while a file is instrumented.

use serde_json::Value;

use crate::file::{BranchMapping, BranchType, FileCoverage, FunctionMapping};
use crate::location::Location;

/// Hands out sequential ids for statements, functions and branches and
/// records their locations with zeroed counters.
#[derive(Debug)]
pub struct SourceCoverage {
    data: FileCoverage,
    next_statement: u32,
    next_function: u32,
    next_branch: u32,
}

impl SourceCoverage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            data: FileCoverage::new(path),
            next_statement: 0,
            next_function: 0,
            next_branch: 0,
        }
    }

    pub fn new_statement(&mut self, loc: Location) -> u32 {
        let id = self.next_statement;
        self.next_statement += 1;
        self.data.statement_map.insert(id, loc);
        self.data.s.insert(id, 0);
        id
    }

    /// Register a function. Unnamed functions are called `(anonymous_<id>)`.
    pub fn new_function(&mut self, name: Option<&str>, decl: Location, loc: Location) -> u32 {
        let id = self.next_function;
        self.next_function += 1;
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("(anonymous_{id})"),
        };
        self.data.fn_map.insert(
            id,
            FunctionMapping {
                name,
                decl,
                loc,
                line: Some(loc.start.line),
                skip: false,
            },
        );
        self.data.f.insert(id, 0);
        id
    }

    /// Register a branch with no outcomes yet.
    pub fn new_branch(&mut self, kind: BranchType, loc: Location) -> u32 {
        let id = self.next_branch;
        self.next_branch += 1;
        self.data.branch_map.insert(
            id,
            BranchMapping {
                loc: Some(loc),
                kind,
                locations: Vec::new(),
                line: Some(loc.start.line),
            },
        );
        self.data.b.insert(id, Vec::new());
        id
    }

    /// Append an outcome to `branch` and return its index.
    pub fn add_branch_path(&mut self, branch: u32, loc: Location) -> usize {
        match (
            self.data.branch_map.get_mut(&branch),
            self.data.b.get_mut(&branch),
        ) {
            (Some(mapping), Some(counts)) => {
                mapping.locations.push(loc);
                counts.push(0);
                counts.len() - 1
            }
            // Ids only come from `new_branch`.
            _ => 0,
        }
    }

    pub fn set_input_source_map(&mut self, map: Value) {
        self.data.input_source_map = Some(map);
    }

    /// Finish the skeleton, pruning branches that ended up with no
    /// outcomes. Remaining ids keep their numbers.
    #[must_use]
    pub fn freeze(mut self) -> FileCoverage {
        let empty: Vec<u32> = self
            .data
            .branch_map
            .iter()
            .filter(|(_, mapping)| mapping.locations.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in empty {
            self.data.branch_map.remove(&id);
            self.data.b.remove(&id);
        }
        self.data
    }
}
