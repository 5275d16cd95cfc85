//! Hierarchical views over a coverage map for reporters.

pub mod node;
pub mod summarizer;
pub mod visitor;

pub use node::{NodeId, NodeRef, ReportTree};
pub use summarizer::{Summarizer, SummarizerKind};
pub use visitor::{CompositeVisitor, Visitor};
