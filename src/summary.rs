//! Aggregate coverage numbers for a file or a group of files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coverage percentage floored to two decimals, 100 when there is nothing
/// to cover.
///
/// The division happens in integer space so that values like
/// 999998/999999 never round up to 100.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let hundredths = (u128::from(covered) * 10_000) / u128::from(total);
    hundredths as f64 / 100.0
}

/// One metric group: statements, functions, branches or lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total: u64,
    pub covered: u64,
    pub skipped: u64,
    pub pct: f64,
}

impl Default for Totals {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl Totals {
    pub fn new(total: u64, covered: u64, skipped: u64) -> Self {
        Self {
            total,
            covered,
            skipped,
            pct: percent(covered, total),
        }
    }

    fn merge(&mut self, other: &Totals) {
        *self = Totals::new(
            self.total + other.total,
            self.covered + other.covered,
            self.skipped + other.skipped,
        );
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({}/{})", self.pct, self.covered, self.total)
    }
}

/// The four metric groups reported for every file and directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub lines: Totals,
    pub statements: Totals,
    pub functions: Totals,
    pub branches: Totals,
}

impl CoverageSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another summary's counts into this one. Percentages are
    /// recomputed from the summed counts, so merge order never matters.
    pub fn merge(&mut self, other: &CoverageSummary) -> &mut Self {
        self.lines.merge(&other.lines);
        self.statements.merge(&other.statements);
        self.functions.merge(&other.functions);
        self.branches.merge(&other.branches);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.total == 0
    }
}
