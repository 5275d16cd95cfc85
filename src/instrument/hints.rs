//! Comment scanning: ignore hints and `sourceMappingURL` directives.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;

static HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*istanbul\s+ignore\s+(if|else|next)(?:\W|$)").unwrap());
static SOURCE_MAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[#@]\s*sourceMappingURL=(.*)\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    If,
    Else,
    Next,
}

#[derive(Debug, Clone)]
struct Comment {
    start: usize,
    hint: Option<Hint>,
}

/// A `sourceMappingURL` comment and the byte range it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapComment {
    pub url: String,
    pub start: usize,
    pub end: usize,
}

/// All comments of one file, indexed by where they end.
#[derive(Debug)]
pub struct CommentIndex<'a> {
    src: &'a str,
    by_end: HashMap<usize, Comment>,
    source_map: Option<SourceMapComment>,
}

/// Comment body without its `//` or `/* */` delimiters.
fn comment_value(text: &str) -> &str {
    if let Some(line) = text.strip_prefix("//") {
        line
    } else {
        text.strip_prefix("/*")
            .map(|body| body.strip_suffix("*/").unwrap_or(body))
            .unwrap_or(text)
    }
}

fn parse_hint(value: &str) -> Option<Hint> {
    let caps = HINT_RE.captures(value.trim())?;
    match caps.get(1)?.as_str() {
        "if" => Some(Hint::If),
        "else" => Some(Hint::Else),
        _ => Some(Hint::Next),
    }
}

impl<'a> CommentIndex<'a> {
    pub fn build(root: Node<'_>, src: &'a str) -> Self {
        let mut index = Self {
            src,
            by_end: HashMap::new(),
            source_map: None,
        };
        index.collect(root);
        index
    }

    fn collect(&mut self, node: Node<'_>) {
        if node.kind() == "comment" {
            let (start, end) = (node.start_byte(), node.end_byte());
            let value = comment_value(&self.src[start..end]);
            if let Some(caps) = SOURCE_MAP_RE.captures(value.trim()) {
                if let Some(url) = caps.get(1) {
                    // Last one wins.
                    self.source_map = Some(SourceMapComment {
                        url: url.as_str().trim().to_string(),
                        start,
                        end,
                    });
                }
            }
            self.by_end.insert(
                end,
                Comment {
                    start,
                    hint: parse_hint(value),
                },
            );
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child);
        }
    }

    /// Hint carried by the comments directly in front of `node`. Only
    /// whitespace and other comments may sit in between; the nearest
    /// matching comment wins.
    pub fn hint_for(&self, node: Node<'_>) -> Option<Hint> {
        let bytes = self.src.as_bytes();
        let mut pos = node.start_byte();
        loop {
            while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
                pos -= 1;
            }
            let comment = self.by_end.get(&pos)?;
            if comment.hint.is_some() {
                return comment.hint;
            }
            pos = comment.start;
        }
    }

    pub fn source_map_comment(&self) -> Option<&SourceMapComment> {
        self.source_map.as_ref()
    }
}
