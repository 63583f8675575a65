//! The field dependency graph.
pub mod dag;

pub use dag::DerivationGraph;
pub use petgraph::graph::NodeIndex;
