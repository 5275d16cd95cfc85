use super::node::NodeRef;

/// Callbacks for [`ReportTree::visit`](super::ReportTree::visit). Every
/// method defaults to doing nothing.
pub trait Visitor {
    fn on_start(&mut self, _root: NodeRef<'_>) {}
    fn on_summary(&mut self, _node: NodeRef<'_>) {}
    fn on_detail(&mut self, _node: NodeRef<'_>) {}
    fn on_end(&mut self, _root: NodeRef<'_>) {}
}

/// Fans every callback out to its visitors in the order they were added,
/// so several reports can be produced from one walk.
#[derive(Default)]
pub struct CompositeVisitor<'a> {
    visitors: Vec<&'a mut dyn Visitor>,
}

impl<'a> CompositeVisitor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, visitor: &'a mut dyn Visitor) -> &mut Self {
        self.visitors.push(visitor);
        self
    }
}

impl Visitor for CompositeVisitor<'_> {
    fn on_start(&mut self, root: NodeRef<'_>) {
        for v in &mut self.visitors {
            v.on_start(root);
        }
    }

    fn on_summary(&mut self, node: NodeRef<'_>) {
        for v in &mut self.visitors {
            v.on_summary(node);
        }
    }

    fn on_detail(&mut self, node: NodeRef<'_>) {
        for v in &mut self.visitors {
            v.on_detail(node);
        }
    }

    fn on_end(&mut self, root: NodeRef<'_>) {
        for v in &mut self.visitors {
            v.on_end(root);
        }
    }
}
