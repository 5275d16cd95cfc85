//! Report tree storage.
//!
//! Nodes live in one arena owned by [`ReportTree`]; parents are plain
//! indices, so the tree has a single owner and no reference cycles.

use std::cell::OnceCell;

use crate::file::FileCoverage;
use crate::path::Path;
use crate::summary::CoverageSummary;

use super::visitor::Visitor;

pub type NodeId = usize;

#[derive(Debug)]
pub(crate) struct ReportNode {
    pub(crate) path: Path,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Present exactly on detail (file) nodes.
    pub(crate) coverage: Option<FileCoverage>,
    full_summary: OnceCell<CoverageSummary>,
    files_summary: OnceCell<Option<CoverageSummary>>,
}

impl ReportNode {
    pub(crate) fn new(path: Path, coverage: Option<FileCoverage>) -> Self {
        Self {
            path,
            parent: None,
            children: Vec::new(),
            coverage,
            full_summary: OnceCell::new(),
            files_summary: OnceCell::new(),
        }
    }
}

/// A tree of summary (directory) and detail (file) nodes.
#[derive(Debug)]
pub struct ReportTree {
    nodes: Vec<ReportNode>,
    root: NodeId,
}

impl ReportTree {
    /// Adopt the nodes reachable from `root`, renumbered in pre-order.
    /// Summary children are sorted by their path string.
    pub(crate) fn from_arena(mut arena: Vec<Option<ReportNode>>, root: NodeId) -> Self {
        let mut nodes = Vec::new();
        let mut stack = vec![(root, None)];
        while let Some((old_id, parent)) = stack.pop() {
            let Some(mut node) = arena.get_mut(old_id).and_then(Option::take) else {
                continue;
            };
            let id = nodes.len();
            let mut kids = std::mem::take(&mut node.children);
            kids.sort_by_cached_key(|kid| {
                arena
                    .get(*kid)
                    .and_then(Option::as_ref)
                    .map(|n| n.path.to_string())
                    .unwrap_or_default()
            });
            node.parent = parent;
            nodes.push(node);
            if let Some(parent) = parent {
                nodes[parent].children.push(id);
            }
            // Reverse so the first child is popped first.
            stack.extend(kids.into_iter().rev().map(|kid| (kid, Some(id))));
        }
        Self { nodes, root: 0 }
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: self.root,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the tree in pre-order: `on_start` on the root, then
    /// `on_summary` or `on_detail` for every node, then `on_end`.
    pub fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        let root = self.root();
        visitor.on_start(root);
        visit_node(root, visitor);
        visitor.on_end(root);
    }
}

fn visit_node<V: Visitor + ?Sized>(node: NodeRef<'_>, visitor: &mut V) {
    if node.is_summary() {
        visitor.on_summary(node);
    } else {
        visitor.on_detail(node);
    }
    for child in node.children() {
        visit_node(child, visitor);
    }
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ReportTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a ReportNode {
        &self.tree.nodes[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &'a Path {
        &self.node().path
    }

    pub fn is_summary(&self) -> bool {
        self.node().coverage.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    pub fn file_coverage(&self) -> Option<&'a FileCoverage> {
        self.node().coverage.as_ref()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// Full path of the node within the tree.
    pub fn qualified_name(&self) -> String {
        self.path().to_string()
    }

    /// Path relative to the parent node, or the full path when the parent
    /// is not an ancestor in path terms.
    pub fn relative_name(&self) -> String {
        let parent_path = self.parent().map(|p| p.path().clone()).unwrap_or_default();
        let mine = self.path();
        if parent_path.ancestor_of(mine) {
            let mut rel = mine.clone();
            rel.strip_prefix_len(parent_path.len());
            rel.to_string()
        } else {
            mine.to_string()
        }
    }

    /// Aggregate summary of the node, memoized per mode.
    ///
    /// With `files_only`, summary children are skipped and a summary node
    /// without file children yields `None`.
    pub fn coverage_summary(&self, files_only: bool) -> Option<CoverageSummary> {
        let node = self.node();
        if let Some(fc) = &node.coverage {
            return Some(*node.full_summary.get_or_init(|| fc.to_summary()));
        }
        if files_only {
            return *node.files_summary.get_or_init(|| {
                let mut summary = CoverageSummary::new();
                let mut count = 0;
                for child in self.children().filter(|c| !c.is_summary()) {
                    if let Some(child_summary) = child.coverage_summary(true) {
                        summary.merge(&child_summary);
                        count += 1;
                    }
                }
                (count > 0).then_some(summary)
            });
        }
        Some(*node.full_summary.get_or_init(|| {
            let mut summary = CoverageSummary::new();
            for child in self.children() {
                if let Some(child_summary) = child.coverage_summary(false) {
                    summary.merge(&child_summary);
                }
            }
            summary
        }))
    }
}
