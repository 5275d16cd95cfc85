//! Text-level plumbing: byte offsets to line/column positions, and splice
//! edits applied to the original source in one pass.

use crate::location::Position;

/// Maps byte offsets to 1-based lines and UTF-16 columns, the units
/// JavaScript tooling reports.
#[derive(Debug)]
pub struct LineIndex<'a> {
    src: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(src: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { src, line_starts }
    }

    pub fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts.get(line.wrapping_sub(1)).copied().unwrap_or(0);
        let column = self
            .src
            .get(start..offset)
            .map_or(0, |text| text.encode_utf16().count());
        Position::new(line.max(1) as u32, column as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EditKind {
    /// Text closing a wrapper that ends here.
    Close,
    /// Replacement of a source range.
    Replace,
    /// Text opening a wrapper or counter that starts here.
    Open,
}

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    kind: EditKind,
    seq: usize,
    text: String,
}

impl Edit {
    fn sort_key(&self) -> (usize, EditKind, isize) {
        // Wrappers nest: openers at one offset go out in registration
        // order, closers in reverse.
        let seq = self.seq as isize;
        let order = match self.kind {
            EditKind::Close => -seq,
            _ => seq,
        };
        (self.start, self.kind, order)
    }
}

/// Ordered set of insertions against an immutable source string.
#[derive(Debug, Default)]
pub struct Edits {
    edits: Vec<Edit>,
    seq: usize,
}

impl Edits {
    pub fn new() -> Self {
        // seq 0 is reserved for `prepend`.
        Self {
            edits: Vec::new(),
            seq: 1,
        }
    }

    fn push(&mut self, start: usize, end: usize, kind: EditKind, text: String) {
        self.edits.push(Edit {
            start,
            end,
            kind,
            seq: self.seq,
            text,
        });
        self.seq += 1;
    }

    /// Insert text that must precede anything opened later at `offset`.
    pub fn open(&mut self, offset: usize, text: impl Into<String>) {
        self.push(offset, offset, EditKind::Open, text.into());
    }

    /// Insert text that must follow anything closed later at `offset`.
    pub fn close(&mut self, offset: usize, text: impl Into<String>) {
        self.push(offset, offset, EditKind::Close, text.into());
    }

    /// Replace `start..end`. Insertions strictly inside the range are lost.
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        self.push(start, end, EditKind::Replace, text.into());
    }

    /// Insert text ahead of every other opener at `offset`.
    pub fn prepend(&mut self, offset: usize, text: impl Into<String>) {
        self.edits.push(Edit {
            start: offset,
            end: offset,
            kind: EditKind::Open,
            seq: 0,
            text: text.into(),
        });
    }

    /// Wrap `start..end` as `(<counter>, <original>)`.
    pub fn wrap_expression(&mut self, start: usize, end: usize, counter: &str) {
        self.open(start, format!("({counter}, "));
        self.close(end, ")");
    }

    pub fn apply(mut self, src: &str) -> String {
        self.edits.sort_by_key(Edit::sort_key);
        let extra: usize = self.edits.iter().map(|e| e.text.len()).sum();
        let mut out = String::with_capacity(src.len() + extra);
        let mut cursor = 0;
        for edit in &self.edits {
            if edit.start < cursor {
                continue;
            }
            out.push_str(&src[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end.max(edit.start);
        }
        out.push_str(&src[cursor..]);
        out
    }
}
