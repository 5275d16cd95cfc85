//! Slash-separated path keys used to shape report trees.
//!
//! A [`Path`] is a list of segments with the filesystem root stripped, so
//! `/a/b/c.js`, `a\b\c.js` and `a//b/c.js` all become `["a", "b", "c.js"]`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CovError, Result};

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\\/]+").unwrap());
static DRIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]:$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a filesystem-style path. Windows drive prefixes are dropped
    /// along with the root.
    pub fn parse(s: &str) -> Self {
        let mut segments: Vec<String> = SEPARATORS
            .split(s)
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect();
        if segments.first().is_some_and(|first| DRIVE.is_match(first)) {
            segments.remove(0);
        }
        Self { segments }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn elements(&self) -> &[String] {
        &self.segments
    }

    pub fn has_parent(&self) -> bool {
        !self.segments.is_empty()
    }

    /// The enclosing path. Fails on the root, which has no parent.
    pub fn parent(&self) -> Result<Path> {
        match self.segments.split_last() {
            Some((_, rest)) => Ok(Path::from_segments(rest.to_vec())),
            None => Err(CovError::InvalidInput(
                "the root path has no parent".to_string(),
            )),
        }
    }

    /// Last segment, or `""` for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// True when `other` equals this path or lies below it.
    pub fn contains(&self, other: &Path) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    pub fn ancestor_of(&self, other: &Path) -> bool {
        self.contains(other) && self.segments.len() != other.segments.len()
    }

    pub fn descendant_of(&self, other: &Path) -> bool {
        other.ancestor_of(self)
    }

    /// Longest shared leading run of segments.
    #[must_use]
    pub fn common_prefix_path(&self, other: &Path) -> Path {
        Path::from_segments(
            self.segments
                .iter()
                .zip(&other.segments)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a.clone())
                .collect(),
        )
    }

    /// Remove the first `n` segments.
    pub fn strip_prefix_len(&mut self, n: usize) {
        let n = n.min(self.segments.len());
        self.segments.drain(..n);
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn shift(&mut self) -> Option<String> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.segments.remove(0))
        }
    }

    pub fn unshift(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, segment.into());
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn is_absolute(p: &str) -> bool {
    p.starts_with('/') || p.starts_with('\\') || DRIVE.is_match(p.get(..2).unwrap_or(""))
}

/// Resolve `source` as written in a source map against the directory of
/// the generated file. Absolute sources come back unchanged apart from a
/// `file://` prefix, which is dropped.
pub fn resolve_relative(source: &str, generated_file: &str) -> String {
    let source = source.strip_prefix("file://").unwrap_or(source);
    if is_absolute(source) {
        return source.to_string();
    }

    let dir = match generated_file.rfind(['/', '\\']) {
        Some(idx) => &generated_file[..idx],
        None => "",
    };
    let absolute = is_absolute(generated_file);

    let mut out: Vec<&str> = Vec::new();
    for seg in SEPARATORS.split(dir).chain(SEPARATORS.split(source)) {
        match seg {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| *last != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    if absolute && !DRIVE.is_match(out.first().copied().unwrap_or("")) {
        format!("/{joined}")
    } else {
        joined
    }
}
