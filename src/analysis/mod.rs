//! Static analysis over the derivation graph.
pub mod topology;
