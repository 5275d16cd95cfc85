//! Plain-text output: a coverage table driven by the report tree, and
//! compact line-range formatting.

use crate::summary::CoverageSummary;
use crate::tree::{NodeRef, Visitor};

const ROOT_LABEL: &str = "All files";

fn depth(node: NodeRef<'_>) -> usize {
    std::iter::successors(node.parent(), |p| p.parent()).count()
}

fn label(node: NodeRef<'_>) -> String {
    if node.is_root() {
        ROOT_LABEL.to_string()
    } else {
        format!("{}{}", " ".repeat(depth(node)), node.relative_name())
    }
}

fn widest_label(node: NodeRef<'_>) -> usize {
    node.children()
        .map(widest_label)
        .fold(label(node).chars().count(), usize::max)
}

/// Table with one row per tree node: statements, branches, functions and
/// lines percentages.
#[derive(Debug, Default)]
pub struct TextSummary {
    out: String,
    width: usize,
}

impl TextSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    fn separator(&mut self) {
        let line = format!(
            "{}-|---------|----------|---------|---------\n",
            "-".repeat(self.width)
        );
        self.out.push_str(&line);
    }

    fn row(&mut self, node: NodeRef<'_>) {
        let Some(s) = node.coverage_summary(false) else {
            return;
        };
        let row = format_row(&label(node), self.width, &s);
        self.out.push_str(&row);
    }
}

fn format_row(name: &str, width: usize, s: &CoverageSummary) -> String {
    format!(
        "{name:<width$} | {:>7} | {:>8} | {:>7} | {:>7}\n",
        s.statements.pct, s.branches.pct, s.functions.pct, s.lines.pct
    )
}

impl Visitor for TextSummary {
    fn on_start(&mut self, root: NodeRef<'_>) {
        self.width = widest_label(root).max("File".len());
        self.separator();
        let header = format!(
            "{:<width$} | % Stmts | % Branch | % Funcs | % Lines\n",
            "File",
            width = self.width
        );
        self.out.push_str(&header);
        self.separator();
    }

    fn on_summary(&mut self, node: NodeRef<'_>) {
        self.row(node);
    }

    fn on_detail(&mut self, node: NodeRef<'_>) {
        self.row(node);
    }

    fn on_end(&mut self, _root: NodeRef<'_>) {
        self.separator();
    }
}

/// Maximum number of consecutive non-instrumentable lines that can be bridged
/// when coalescing uncovered ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging short
/// gaps where every line in the gap is non-instrumentable.
///
/// Both `lines` and `all_instrumentable` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], all_instrumentable: &[u32]) -> Vec<(u32, u32)> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let (mut start, mut end) = (first, first);
    for &line in rest {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP
            && (end + 1..line).all(|l| all_instrumentable.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }
    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32], all_instrumentable: &[u32]) -> String {
    coalesce_ranges(lines, all_instrumentable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
