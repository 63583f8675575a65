//! dag.rs
//! The dependency graph between a schema's fields, rebuilt on every recompute.

use crate::store::{FieldId, FormSchema};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Nodes are fields in declaration order; an edge runs from a parent to the
/// derived field that reads it.
#[derive(Debug, Clone, Default)]
pub struct DerivationGraph {
    graph: DiGraph<FieldId, ()>,
    index: HashMap<FieldId, NodeIndex>,
    // (derived field, parent id that is not in the schema)
    missing: Vec<(NodeIndex, FieldId)>,
}

impl DerivationGraph {
    pub fn build(schema: &FormSchema) -> Self {
        let mut graph = DiGraph::with_capacity(schema.fields.len(), schema.fields.len());
        let mut index = HashMap::with_capacity(schema.fields.len());

        for field in &schema.fields {
            // Loaded data may repeat an id; the first occurrence owns it.
            if !index.contains_key(&field.id) {
                let node = graph.add_node(field.id.clone());
                index.insert(field.id.clone(), node);
            }
        }

        let mut missing = Vec::new();
        for field in schema.derived_fields() {
            let child = index[&field.id];
            for parent in field.parent_ids() {
                match index.get(parent) {
                    Some(&p) => {
                        graph.update_edge(p, child, ());
                    }
                    None => missing.push((child, parent.clone())),
                }
            }
        }

        Self { graph, index, missing }
    }

    pub fn node_count(&self) -> usize { self.graph.node_count() }

    pub fn node(&self, id: &FieldId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn field(&self, node: NodeIndex) -> &FieldId {
        &self.graph[node]
    }

    /// Children sorted by declaration order.
    pub fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Outgoing)
    }

    /// Parents that exist in the schema, sorted by declaration order.
    pub fn parents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Incoming)
    }

    pub fn has_self_loop(&self, node: NodeIndex) -> bool {
        self.graph.contains_edge(node, node)
    }

    /// References to parents that do not exist, in schema order.
    pub fn missing_parents(&self) -> &[(NodeIndex, FieldId)] {
        &self.missing
    }

    pub(crate) fn inner(&self) -> &DiGraph<FieldId, ()> {
        &self.graph
    }

    /// Every field that reads, directly or transitively, from one of `start`.
    /// The start fields themselves are included.
    pub fn downstream_from(&self, start: &[FieldId]) -> HashSet<FieldId> {
        self.reachable(start, Direction::Outgoing)
    }

    fn reachable(&self, start: &[FieldId], dir: Direction) -> HashSet<FieldId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = start.iter().filter_map(|id| self.node(id)).collect();

        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.graph.neighbors_directed(node, dir));
            }
        }
        visited.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    fn sorted_neighbors(&self, node: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(node, dir).collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
