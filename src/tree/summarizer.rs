//! Builds report trees from a coverage map.
//!
//! File paths are first made relative to the deepest directory shared by
//! every file. Three shapes are available:
//!
//! - `flat`: every file directly under one root.
//! - `pkg`: one node per directory that directly holds files.
//! - `nested`: the full directory tree, with chains of single-directory
//!   nodes folded into one.

use indexmap::IndexMap;

use crate::error::CovError;
use crate::file::FileCoverage;
use crate::map::CoverageMap;
use crate::path::Path;

use super::node::{NodeId, ReportNode, ReportTree};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummarizerKind {
    Flat,
    #[default]
    Pkg,
    Nested,
}

impl SummarizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizerKind::Flat => "flat",
            SummarizerKind::Pkg => "pkg",
            SummarizerKind::Nested => "nested",
        }
    }
}

impl std::str::FromStr for SummarizerKind {
    type Err = CovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(SummarizerKind::Flat),
            "pkg" | "package" => Ok(SummarizerKind::Pkg),
            "nested" => Ok(SummarizerKind::Nested),
            _ => Err(CovError::InvalidInput(format!(
                "Unknown summarizer: '{s}'. Supported: flat, pkg, nested"
            ))),
        }
    }
}

impl std::fmt::Display for SummarizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Entry {
    path: Path,
    coverage: FileCoverage,
}

/// Scratch arena used while a tree is being shaped.
#[derive(Default)]
struct Arena {
    nodes: Vec<Option<ReportNode>>,
}

impl Arena {
    fn add(&mut self, path: Path, coverage: Option<FileCoverage>) -> NodeId {
        self.nodes.push(Some(ReportNode::new(path, coverage)));
        self.nodes.len() - 1
    }

    fn node(&self, id: NodeId) -> Option<&ReportNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ReportNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn is_file(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.coverage.is_some())
    }

    /// Synthetic root over `children`.
    fn add_root(&mut self, children: Vec<NodeId>) -> NodeId {
        let root = self.add(Path::root(), None);
        if let Some(node) = self.node_mut(root) {
            node.children = children;
        }
        root
    }

    /// Put `prefix` in front of the path of every node except `root`.
    fn prefix_all(&mut self, root: NodeId, prefix: &str) {
        for (id, node) in self.nodes.iter_mut().enumerate() {
            if let Some(node) = node {
                if id != root {
                    node.path.unshift(prefix);
                }
            }
        }
    }

    /// Collapse chains of single-directory nodes under `id`. Returns the
    /// node that takes `id`'s place.
    fn fold(&mut self, id: NodeId) -> NodeId {
        let children = self.children(id);
        if let [only] = children[..] {
            if !self.is_file(only) {
                return self.fold(only);
            }
        }
        let folded: Vec<NodeId> = children.into_iter().map(|kid| self.fold(kid)).collect();
        if let Some(node) = self.node_mut(id) {
            node.children = folded;
        }
        id
    }

    fn into_tree(self, root: NodeId) -> ReportTree {
        ReportTree::from_arena(self.nodes, root)
    }
}

/// Shapes a snapshot of a coverage map into report trees.
pub struct Summarizer {
    entries: Vec<Entry>,
    common_parent: Path,
}

impl Summarizer {
    pub fn new(coverage: &CoverageMap) -> Self {
        let mut entries: Vec<Entry> = coverage
            .iter()
            .map(|fc| Entry {
                path: Path::parse(fc.path()),
                coverage: fc.clone(),
            })
            .collect();

        let parents: Vec<Path> = entries
            .iter()
            .map(|e| e.path.parent().unwrap_or_default())
            .collect();
        let common_parent = match parents.split_first() {
            Some((first, rest)) => rest
                .iter()
                .fold(first.clone(), |common, p| common.common_prefix_path(p)),
            None => Path::root(),
        };
        for entry in &mut entries {
            entry.path.strip_prefix_len(common_parent.len());
        }

        Self {
            entries,
            common_parent,
        }
    }

    /// Directory shared by every file, before it was stripped.
    pub fn common_parent(&self) -> &Path {
        &self.common_parent
    }

    pub fn tree(&self, kind: SummarizerKind) -> ReportTree {
        match kind {
            SummarizerKind::Flat => self.flat(),
            SummarizerKind::Pkg => self.pkg(),
            SummarizerKind::Nested => self.nested(),
        }
    }

    pub fn flat(&self) -> ReportTree {
        let mut arena = Arena::default();
        let files = self
            .entries
            .iter()
            .map(|e| arena.add(e.path.clone(), Some(e.coverage.clone())))
            .collect();
        let root = arena.add_root(files);
        arena.into_tree(root)
    }

    pub fn pkg(&self) -> ReportTree {
        let mut arena = Arena::default();
        let mut dirs: IndexMap<String, NodeId> = IndexMap::new();
        for entry in &self.entries {
            let dir_path = entry.path.parent().unwrap_or_default();
            let dir = *dirs
                .entry(dir_path.to_string())
                .or_insert_with(|| arena.add(dir_path, None));
            let file = arena.add(entry.path.clone(), Some(entry.coverage.clone()));
            arena.add_child(dir, file);
        }

        let dirs: Vec<NodeId> = dirs.into_values().collect();
        if let [only] = dirs[..] {
            return arena.into_tree(only);
        }

        // Files at the top level share the root's empty path; give every
        // node a prefix so they stay distinguishable.
        let has_top_level_files = dirs
            .iter()
            .any(|&id| arena.node(id).is_some_and(|n| n.path.is_empty()));
        let root = arena.add_root(dirs);
        if has_top_level_files {
            let prefix = if self.common_parent.is_empty() {
                "root".to_string()
            } else {
                self.common_parent.name().to_string()
            };
            arena.prefix_all(root, &prefix);
        }
        arena.into_tree(root)
    }

    pub fn nested(&self) -> ReportTree {
        let mut arena = Arena::default();
        let mut dirs: IndexMap<String, NodeId> = IndexMap::new();
        let mut tops: Vec<NodeId> = Vec::new();

        for entry in &self.entries {
            let mut child = arena.add(entry.path.clone(), Some(entry.coverage.clone()));
            let mut child_path = entry.path.clone();
            // Walk up until an existing directory node (or the top) is hit.
            while let Ok(dir_path) = child_path.parent() {
                let key = dir_path.to_string();
                if let Some(&dir) = dirs.get(&key) {
                    arena.add_child(dir, child);
                    break;
                }
                let dir = arena.add(dir_path.clone(), None);
                dirs.insert(key, dir);
                arena.add_child(dir, child);
                if !dir_path.has_parent() {
                    tops.push(dir);
                    break;
                }
                child = dir;
                child_path = dir_path;
            }
        }

        let tops: Vec<NodeId> = tops.into_iter().map(|id| arena.fold(id)).collect();
        let root = match tops[..] {
            [only] => only,
            _ => arena.add_root(tops),
        };
        arena.into_tree(root)
    }
}
