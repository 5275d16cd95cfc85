//! JavaScript instrumentation.
//!
//! Source is parsed with tree-sitter and counters are spliced into the
//! original text, so everything that is not instrumented comes out byte for
//! byte. The result registers its coverage object on a global at run time
//! through the block produced by [`codegen::registration_block`].

pub mod baseline;
pub mod codegen;
pub mod edits;
pub mod hints;
pub mod options;
pub mod registry;
pub mod source_coverage;
pub mod visitor;

use serde_json::Value;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{CovError, Result};
use crate::file::FileCoverage;

pub use baseline::BaselineCollector;
pub use options::InstrumentOptions;
pub use registry::{CoverageRegistry, Registration};

use codegen::Counters;
use edits::LineIndex;
use hints::CommentIndex;
use visitor::Visitor;

/// Everything produced by instrumenting one file.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentOutput {
    pub code: String,
    /// Zeroed coverage skeleton for the file.
    pub coverage: FileCoverage,
    /// Hash stored alongside the coverage object at run time.
    pub hash: String,
    /// Captured `sourceMappingURL`, if the source had one.
    pub source_mapping_url: Option<String>,
}

/// Anything that can turn source text into instrumented source text.
pub trait Instrument {
    fn instrument_sync(
        &mut self,
        code: &str,
        filename: &str,
        input_source_map: Option<&Value>,
    ) -> Result<InstrumentOutput>;
}

pub struct Instrumenter {
    opts: InstrumentOptions,
    parser: Parser,
}

impl std::fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumenter")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Instrumenter {
    pub fn new(opts: InstrumentOptions) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| CovError::InvalidInput(format!("failed to load JavaScript grammar: {e}")))?;
        Ok(Self { opts, parser })
    }

    pub fn options(&self) -> &InstrumentOptions {
        &self.opts
    }

    /// Instrument raw bytes, which must be UTF-8.
    pub fn instrument_bytes(
        &mut self,
        code: &[u8],
        filename: &str,
        input_source_map: Option<&Value>,
    ) -> Result<InstrumentOutput> {
        let code = std::str::from_utf8(code).map_err(|e| {
            CovError::InvalidInput(format!("{filename}: source is not valid UTF-8: {e}"))
        })?;
        self.instrument_sync(code, filename, input_source_map)
    }

    /// Callback flavour of [`Instrument::instrument_sync`]: failures are
    /// handed to `callback` instead of being returned.
    pub fn instrument<F>(
        &mut self,
        code: &str,
        filename: &str,
        input_source_map: Option<&Value>,
        callback: F,
    ) where
        F: FnOnce(Result<InstrumentOutput>),
    {
        callback(self.instrument_sync(code, filename, input_source_map));
    }

    fn parse(&mut self, code: &str, filename: &str) -> Result<Tree> {
        self.parser.parse(code, None).ok_or_else(|| CovError::Syntax {
            path: filename.to_string(),
            line: 1,
            column: 0,
            message: "parser gave up".to_string(),
        })
    }

    fn check(&self, root: Node<'_>, code: &str, filename: &str) -> Result<()> {
        let lines = LineIndex::new(code);
        let syntax = |node: Node, message: String| {
            let pos = lines.position(node.start_byte());
            CovError::Syntax {
                path: filename.to_string(),
                line: pos.line,
                column: pos.column as u32,
                message,
            }
        };

        if let Some(bad) = first_error(root) {
            let message = if bad.is_missing() {
                format!("missing `{}`", bad.kind())
            } else {
                let text: String = code[bad.byte_range()].chars().take(20).collect();
                format!("unexpected `{text}`")
            };
            return Err(syntax(bad, message));
        }
        if !self.opts.auto_wrap {
            if let Some(ret) = top_level_return(root) {
                return Err(syntax(ret, "'return' outside of function".to_string()));
            }
        }
        if !self.opts.es_modules {
            let mut cursor = root.walk();
            let item = root
                .named_children(&mut cursor)
                .find(|n| matches!(n.kind(), "import_statement" | "export_statement"));
            if let Some(item) = item {
                return Err(syntax(
                    item,
                    "'import' and 'export' may only appear in modules".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn top_level_return(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "return_statement" {
        return Some(node);
    }
    if visitor::is_function(node) || node.kind() == "class_static_block" {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(top_level_return)
}

impl Instrument for Instrumenter {
    fn instrument_sync(
        &mut self,
        code: &str,
        filename: &str,
        input_source_map: Option<&Value>,
    ) -> Result<InstrumentOutput> {
        let tree = self.parse(code, filename)?;
        let root = tree.root_node();

        if let Some(embedded) = codegen::read_embedded_coverage(root, code) {
            tracing::debug!("{filename} is already instrumented");
            return Ok(InstrumentOutput {
                code: code.to_string(),
                coverage: embedded.coverage,
                hash: embedded.hash,
                source_mapping_url: None,
            });
        }
        self.check(root, code, filename)?;

        let lines = LineIndex::new(code);
        let comments = CommentIndex::build(root, code);
        let func = codegen::coverage_function_name(filename);
        let counters = Counters::new(func.clone());
        let visit = Visitor::new(code, filename, &lines, &comments, &self.opts, counters).run(root);

        let mut source_coverage = visit.coverage;
        if let Some(map) = input_source_map {
            source_coverage.set_input_source_map(map.clone());
        }
        let coverage = source_coverage.freeze();
        let (data, hash) = codegen::coverage_data(&coverage)?;
        let block = codegen::registration_block(&func, filename, &hash, &data, &self.opts)?;

        let mut edits = visit.edits;
        edits.prepend(visit.preamble_at, format!("{}{block}", visit.preamble_prefix));

        let mut source_mapping_url = None;
        if self.opts.record_source_map_url {
            if let Some(comment) = comments.source_map_comment() {
                source_mapping_url = Some(comment.url.clone());
                edits.replace(comment.start, comment.end, "");
            }
        }

        tracing::debug!(
            "instrumented {filename}: {} statements, {} functions, {} branches",
            coverage.s.len(),
            coverage.f.len(),
            coverage.b.len()
        );
        Ok(InstrumentOutput {
            code: edits.apply(code),
            coverage,
            hash,
            source_mapping_url,
        })
    }
}
