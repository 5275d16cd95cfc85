//! Single-pass walk over a parsed program that registers every statement,
//! function and branch and splices counters into the source text.

use tree_sitter::Node;

use crate::file::BranchType;
use crate::location::{Location, Position};

use super::codegen::Counters;
use super::edits::{Edits, LineIndex};
use super::hints::{CommentIndex, Hint};
use super::options::InstrumentOptions;
use super::source_coverage::SourceCoverage;

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

/// Statements that get their own counter. Declarations, blocks, empty
/// statements and module items do not.
const COUNTED_STATEMENTS: &[&str] = &[
    "expression_statement",
    "break_statement",
    "continue_statement",
    "debugger_statement",
    "return_statement",
    "throw_statement",
    "try_statement",
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_statement",
    "with_statement",
    "labeled_statement",
];

/// Initializers whose statement counter is hoisted in front of the
/// declaration so the runtime still infers the function or class name.
const NAME_INFERRING_VALUES: &[&str] = &[
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "class",
];

pub fn is_function(node: Node<'_>) -> bool {
    FUNCTION_KINDS.contains(&node.kind())
}

fn is_logical(node: Node<'_>) -> bool {
    node.kind() == "binary_expression"
        && node
            .child_by_field_name("operator")
            .is_some_and(|op| matches!(op.kind(), "&&" | "||" | "??"))
}

fn is_directive(node: Node<'_>) -> bool {
    if node.kind() != "expression_statement" {
        return false;
    }
    let mut cursor = node.walk();
    let named: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    matches!(named.as_slice(), [only] if only.kind() == "string")
}

/// End of the last non-comment token under `node`. Trailing comments can
/// end up inside a node, and closing text must not land after them.
fn code_end(node: Node<'_>) -> usize {
    let mut index = node.child_count();
    while index > 0 {
        index -= 1;
        if let Some(child) = node.child(index) {
            if child.kind() != "comment" {
                return code_end(child);
            }
        }
    }
    node.end_byte()
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Where the preamble or a function counter goes in a statement list:
/// after `start` (the opening brace or file start) and past any directive
/// prologue. The bool is set when a semicolon has to be supplied because
/// the last directive relied on automatic insertion.
fn after_prologue(children: &[Node<'_>], start: usize) -> (usize, bool) {
    let mut offset = start;
    let mut needs_semicolon = false;
    for child in children {
        match child.kind() {
            "comment" => continue,
            "hash_bang_line" => {
                offset = child.end_byte();
                needs_semicolon = false;
            }
            _ if is_directive(*child) => {
                offset = code_end(*child);
                let mut cursor = child.walk();
                let last = child
                    .children(&mut cursor)
                    .filter(|c| c.kind() != "comment")
                    .last();
                needs_semicolon = last.map_or(true, |last| last.kind() != ";");
            }
            _ => break,
        }
    }
    (offset, needs_semicolon)
}

/// Result of walking one program.
pub struct VisitOutput {
    pub coverage: SourceCoverage,
    pub edits: Edits,
    /// Offset for the registration block.
    pub preamble_at: usize,
    /// Text that must precede the registration block at `preamble_at`.
    pub preamble_prefix: &'static str,
}

pub struct Visitor<'a> {
    src: &'a str,
    lines: &'a LineIndex<'a>,
    comments: &'a CommentIndex<'a>,
    opts: &'a InstrumentOptions,
    counters: Counters,
    cov: SourceCoverage,
    edits: Edits,
}

impl<'a> Visitor<'a> {
    pub fn new(
        src: &'a str,
        path: &str,
        lines: &'a LineIndex<'a>,
        comments: &'a CommentIndex<'a>,
        opts: &'a InstrumentOptions,
        counters: Counters,
    ) -> Self {
        Self {
            src,
            lines,
            comments,
            opts,
            counters,
            cov: SourceCoverage::new(path),
            edits: Edits::new(),
        }
    }

    pub fn run(mut self, program: Node<'a>) -> VisitOutput {
        let children = named_children(program);
        let (mut preamble_at, needs_semicolon) = after_prologue(&children, 0);
        let mut preamble_prefix = if needs_semicolon { ";" } else { "" };
        // Keep the hashbang on its own line.
        if children
            .iter()
            .any(|c| c.kind() == "hash_bang_line" && c.end_byte() == preamble_at)
        {
            if self.src[preamble_at..].starts_with('\n') {
                preamble_at += 1;
            } else {
                preamble_prefix = "\n";
            }
        }
        self.visit_statements(&children, true);
        VisitOutput {
            coverage: self.cov,
            edits: self.edits,
            preamble_at,
            preamble_prefix,
        }
    }

    fn loc(&self, node: Node<'_>) -> Location {
        Location::new(
            self.lines.position(node.start_byte()),
            self.lines.position(code_end(node)),
        )
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        &self.src[node.byte_range()]
    }

    fn hint(&self, node: Node<'_>) -> Option<Hint> {
        self.comments.hint_for(node)
    }

    fn wrap(&mut self, node: Node<'_>, counter: &str) {
        self.edits
            .wrap_expression(node.start_byte(), code_end(node), counter);
    }

    /// Generic entry for any node outside statement position.
    fn visit(&mut self, node: Node<'a>) {
        if node.kind() == "comment" || self.hint(node) == Some(Hint::Next) {
            return;
        }
        match node.kind() {
            _ if is_function(node) => self.cover_function(node),
            "ternary_expression" => self.cover_ternary(node),
            "binary_expression" if is_logical(node) => self.cover_logical(node),
            "assignment_pattern" | "object_assignment_pattern" => self.cover_default_arg(node),
            "variable_declaration" | "lexical_declaration" => self.visit_declaration(node, None),
            "field_definition" => self.cover_field(node),
            "statement_block" => self.visit_statements(&named_children(node), false),
            kind if COUNTED_STATEMENTS.contains(&kind) => {
                self.visit_statement(node, node.start_byte())
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'a>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit_statements(&mut self, children: &[Node<'a>], directives: bool) {
        let mut in_prologue = directives;
        for &child in children {
            match child.kind() {
                "comment" | "hash_bang_line" => continue,
                _ if in_prologue && is_directive(child) => continue,
                _ => {
                    in_prologue = false;
                    self.visit_statement(child, child.start_byte());
                }
            }
        }
    }

    /// A statement in list position. `counter_at` is where its counter
    /// goes: its own start, or the start of the outermost enclosing label.
    fn visit_statement(&mut self, node: Node<'a>, counter_at: usize) {
        if node.kind() == "comment" || self.hint(node) == Some(Hint::Next) {
            return;
        }
        if COUNTED_STATEMENTS.contains(&node.kind()) {
            let id = self.cov.new_statement(self.loc(node));
            self.edits
                .open(counter_at, format!("{};", self.counters.statement(id)));
        }
        match node.kind() {
            "if_statement" => self.cover_if(node),
            "switch_statement" => self.cover_switch(node),
            "labeled_statement" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_statement(body, counter_at);
                }
            }
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement"
            | "with_statement" => {
                let body = node.child_by_field_name("body");
                for child in named_children(node) {
                    if Some(child) == body {
                        self.visit_arm(child, None);
                    } else if child.kind() == "expression_statement" {
                        // `for (init; cond; ...)` clauses are not statements.
                        self.visit_children(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "variable_declaration" | "lexical_declaration" => {
                self.visit_declaration(node, Some(counter_at))
            }
            "export_statement" => {
                for child in named_children(node) {
                    if matches!(child.kind(), "variable_declaration" | "lexical_declaration") {
                        self.visit_declaration(child, Some(counter_at));
                    } else {
                        self.visit(child);
                    }
                }
            }
            "statement_block" => self.visit_statements(&named_children(node), false),
            _ if is_function(node) => self.cover_function(node),
            _ => self.visit_children(node),
        }
    }

    /// A single-statement slot (if/else arm, loop body). Non-block
    /// statements are wrapped in braces so counters can precede them.
    /// `prefix` is a branch counter to run on entry.
    fn visit_arm(&mut self, node: Node<'a>, prefix: Option<String>) {
        if node.kind() == "statement_block" {
            if let Some(prefix) = prefix {
                self.edits.open(node.start_byte() + 1, format!("{prefix};"));
            }
            if self.hint(node) != Some(Hint::Next) {
                self.visit_statements(&named_children(node), false);
            }
            return;
        }
        self.edits.open(node.start_byte(), "{");
        self.edits.close(code_end(node), "}");
        if let Some(prefix) = prefix {
            self.edits.open(node.start_byte(), format!("{prefix};"));
        }
        self.visit_statement(node, node.start_byte());
    }

    fn visit_declaration(&mut self, node: Node<'a>, hoist_at: Option<usize>) {
        for child in named_children(node) {
            if child.kind() == "variable_declarator" {
                self.cover_declarator(child, hoist_at);
            } else {
                self.visit(child);
            }
        }
    }

    fn cover_declarator(&mut self, node: Node<'a>, hoist_at: Option<usize>) {
        if let Some(name) = node.child_by_field_name("name") {
            self.visit(name);
        }
        let Some(value) = node.child_by_field_name("value") else {
            return;
        };
        let id = self.cov.new_statement(self.loc(value));
        let counter = self.counters.statement(id);
        match hoist_at {
            Some(at) if NAME_INFERRING_VALUES.contains(&value.kind()) => {
                self.edits.open(at, format!("{counter};"));
            }
            _ => self.wrap(value, &counter),
        }
        self.visit(value);
    }

    fn cover_field(&mut self, node: Node<'a>) {
        if let Some(property) = node.child_by_field_name("property") {
            self.visit(property);
        }
        if let Some(value) = node.child_by_field_name("value") {
            let id = self.cov.new_statement(self.loc(value));
            let counter = self.counters.statement(id);
            self.wrap(value, &counter);
            self.visit(value);
        }
    }

    fn cover_function(&mut self, node: Node<'a>) {
        let name_node = node.child_by_field_name("name");
        if node.kind() == "method_definition"
            && node.parent().is_some_and(|p| p.kind() == "class_body")
            && name_node.is_some_and(|n| {
                let name = self.text(n);
                self.opts.ignore_class_methods.iter().any(|m| m == name)
            })
        {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };

        let named = name_node.filter(|n| {
            matches!(
                n.kind(),
                "identifier" | "property_identifier" | "private_property_identifier"
            )
        });
        let decl = match named {
            Some(n) => self.loc(n),
            None => {
                let start = self.lines.position(node.start_byte());
                Location::new(start, Position::new(start.line, start.column + 1))
            }
        };
        let name = named.map(|n| self.text(n));
        let id = self.cov.new_function(name, decl, self.loc(body));

        if let Some(name_node) = name_node.filter(|n| n.kind() == "computed_property_name") {
            self.visit(name_node);
        }
        for field in ["parameters", "parameter"] {
            if let Some(params) = node.child_by_field_name(field) {
                self.visit(params);
            }
        }

        let counter = self.counters.function(id);
        if body.kind() == "statement_block" {
            let children = named_children(body);
            let (at, needs_semicolon) = after_prologue(&children, body.start_byte() + 1);
            let semicolon = if needs_semicolon { ";" } else { "" };
            self.edits.open(at, format!("{semicolon}{counter};"));
            self.visit_statements(&children, true);
        } else {
            // Expression-bodied arrow: becomes a block with one return.
            let ret = self.cov.new_statement(self.loc(body));
            self.edits.open(
                body.start_byte(),
                format!("{{{counter};{};return ", self.counters.statement(ret)),
            );
            self.edits.close(code_end(body), "}");
            self.visit(body);
        }
    }

    fn cover_if(&mut self, node: Node<'a>) {
        let hint = self.hint(node);
        let loc = self.loc(node);
        let branch = self.cov.new_branch(BranchType::If, loc);
        let consequence = node.child_by_field_name("consequence");
        let alternative = node
            .child_by_field_name("alternative")
            .and_then(|clause| named_children(clause).into_iter().find(|n| n.kind() != "comment"));

        let if_loc = if hint == Some(Hint::If) { loc.skipped() } else { loc };
        let else_loc = alternative.map_or(loc, |alt| self.loc(alt));
        let else_loc = if hint == Some(Hint::Else) { else_loc.skipped() } else { else_loc };
        let if_path = self.cov.add_branch_path(branch, if_loc);
        let else_path = self.cov.add_branch_path(branch, else_loc);

        if alternative.is_none() && hint != Some(Hint::Else) {
            self.edits.close(
                consequence.map_or(code_end(node), code_end),
                format!(" else {{{};}}", self.counters.branch(branch, else_path)),
            );
        }

        if let Some(condition) = node.child_by_field_name("condition") {
            self.visit(condition);
        }
        if let Some(consequence) = consequence {
            if hint != Some(Hint::If) {
                self.visit_arm(consequence, Some(self.counters.branch(branch, if_path)));
            }
        }
        if let Some(alternative) = alternative {
            if hint != Some(Hint::Else) {
                self.visit_arm(alternative, Some(self.counters.branch(branch, else_path)));
            }
        }
    }

    fn cover_switch(&mut self, node: Node<'a>) {
        let branch = self.cov.new_branch(BranchType::Switch, self.loc(node));
        if let Some(value) = node.child_by_field_name("value") {
            self.visit(value);
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for case in named_children(body) {
            if !matches!(case.kind(), "switch_case" | "switch_default")
                || self.hint(case) == Some(Hint::Next)
            {
                continue;
            }
            let path = self.cov.add_branch_path(branch, self.loc(case));
            let mut cursor = case.walk();
            let colon = case.children(&mut cursor).find(|c| c.kind() == ":");
            if let Some(colon) = colon {
                self.edits.open(
                    colon.end_byte(),
                    format!("{};", self.counters.branch(branch, path)),
                );
            }
            if let Some(value) = case.child_by_field_name("value") {
                self.visit(value);
            }
            let mut cursor = case.walk();
            let body: Vec<Node> = case.children_by_field_name("body", &mut cursor).collect();
            self.visit_statements(&body, false);
        }
    }

    fn cover_ternary(&mut self, node: Node<'a>) {
        let branch = self.cov.new_branch(BranchType::CondExpr, self.loc(node));
        if let Some(condition) = node.child_by_field_name("condition") {
            self.visit(condition);
        }
        for field in ["consequence", "alternative"] {
            let Some(arm) = node.child_by_field_name(field) else {
                continue;
            };
            if self.hint(arm) == Some(Hint::Next) {
                continue;
            }
            let path = self.cov.add_branch_path(branch, self.loc(arm));
            let counter = self.counters.branch(branch, path);
            self.wrap(arm, &counter);
            self.visit(arm);
        }
    }

    fn find_leaves(&self, node: Node<'a>, leaves: &mut Vec<Node<'a>>) {
        if is_logical(node) {
            if self.hint(node) == Some(Hint::Next) {
                return;
            }
            for field in ["left", "right"] {
                if let Some(side) = node.child_by_field_name(field) {
                    self.find_leaves(side, leaves);
                }
            }
        } else {
            leaves.push(node);
        }
    }

    fn cover_logical(&mut self, node: Node<'a>) {
        let branch = self.cov.new_branch(BranchType::BinaryExpr, self.loc(node));
        let mut leaves = Vec::new();
        for field in ["left", "right"] {
            if let Some(side) = node.child_by_field_name(field) {
                self.find_leaves(side, &mut leaves);
            }
        }
        for leaf in leaves {
            if self.hint(leaf) == Some(Hint::Next) {
                continue;
            }
            let path = self.cov.add_branch_path(branch, self.loc(leaf));
            let counter = self.counters.branch(branch, path);
            self.wrap(leaf, &counter);
            self.visit(leaf);
        }
    }

    fn cover_default_arg(&mut self, node: Node<'a>) {
        if let Some(left) = node.child_by_field_name("left") {
            self.visit(left);
        }
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        let branch = self.cov.new_branch(BranchType::DefaultArg, self.loc(node));
        let path = self.cov.add_branch_path(branch, self.loc(right));
        let counter = self.counters.branch(branch, path);
        self.wrap(right, &counter);
        self.visit(right);
    }
}
