use crate::graph::{DerivationGraph, NodeIndex};
use petgraph::algo::tarjan_scc;
use std::collections::{HashMap, HashSet, VecDeque};

/// The evaluation plan for one recompute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Every node not touched by a cycle; parents always precede children.
    pub order: Vec<NodeIndex>,
    /// Nodes that sit on a cycle (including self-loops).
    pub circular: HashSet<NodeIndex>,
    /// Nodes downstream of a cycle, mapped to the unresolved parent that blocks them.
    pub blocked: HashMap<NodeIndex, NodeIndex>,
}

impl Resolution {
    pub fn is_acyclic(&self) -> bool {
        self.circular.is_empty()
    }
}

/// Orders the graph with Kahn's algorithm and isolates anything a cycle touches.
///
/// The queue is seeded in declaration order and released children are visited
/// in declaration order, so the same schema always yields the same plan.
/// Nodes that are never released are split with Tarjan's SCC: members of a
/// non-trivial component (or a self-loop) are circular; the rest only depend
/// on one.
pub fn resolve(graph: &DerivationGraph) -> Resolution {
    let count = graph.node_count();
    let mut in_degree = vec![0usize; count];
    let mut queue = VecDeque::with_capacity(count);
    let mut order = Vec::with_capacity(count);

    for node in graph.inner().node_indices() {
        let degree = graph.parents(node).len();
        in_degree[node.index()] = degree;
        if degree == 0 {
            queue.push_back(node);
        }
    }

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for child in graph.children(node) {
            let slot = &mut in_degree[child.index()];
            *slot -= 1;
            if *slot == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() == count {
        return Resolution { order, ..Default::default() };
    }

    let released: HashSet<NodeIndex> = order.iter().copied().collect();
    let mut circular = HashSet::new();
    for component in tarjan_scc(graph.inner()) {
        let on_cycle = component.len() > 1 || graph.has_self_loop(component[0]);
        if on_cycle {
            circular.extend(component);
        }
    }

    let mut blocked = HashMap::new();
    for node in graph.inner().node_indices() {
        if released.contains(&node) || circular.contains(&node) {
            continue;
        }
        // An unreleased node always has an unreleased parent.
        if let Some(parent) = graph.parents(node).into_iter().find(|p| !released.contains(p)) {
            blocked.insert(node, parent);
        }
    }

    Resolution { order, circular, blocked }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Field, FieldId, FieldType, FormSchema};

    fn ordinary(id: &str) -> Field {
        Field::with_id(id, FieldType::Number, id)
    }

    fn derived(id: &str, parents: &[&str]) -> Field {
        ordinary(id).derived_from(parents.iter().map(|p| FieldId::from(*p)), "0")
    }

    fn plan(fields: Vec<Field>) -> (DerivationGraph, Resolution) {
        let graph = DerivationGraph::build(&FormSchema { fields, ..FormSchema::draft() });
        let res = resolve(&graph);
        (graph, res)
    }

    fn names(graph: &DerivationGraph, nodes: &[NodeIndex]) -> Vec<String> {
        nodes.iter().map(|n| graph.field(*n).0.clone()).collect()
    }

    #[test]
    fn test_sort_diamond_dependency() {
        // Shape: A -> B, A -> C, B+C -> D, declared out of order
        let (g, res) = plan(vec![
            derived("d", &["b", "c"]),
            derived("c", &["a"]),
            ordinary("a"),
            derived("b", &["a"]),
        ]);

        assert!(res.is_acyclic());
        assert_eq!(names(&g, &res.order), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_order_is_declaration_order_for_independent_fields() {
        let (g, res) = plan(vec![ordinary("z"), ordinary("y"), derived("x", &["y"]), ordinary("w")]);
        assert_eq!(names(&g, &res.order), vec!["z", "y", "w", "x"]);
    }

    #[test]
    fn test_cycle_is_isolated() {
        // X <-> Y, Z reads Y, W reads A only
        let (g, res) = plan(vec![
            ordinary("a"),
            derived("x", &["y"]),
            derived("y", &["x", "a"]),
            derived("z", &["y"]),
            derived("w", &["a"]),
        ]);

        let node = |id: &str| g.node(&FieldId::from(id)).unwrap();
        assert_eq!(names(&g, &res.order), vec!["a", "w"]);
        assert_eq!(res.circular, HashSet::from([node("x"), node("y")]));
        assert_eq!(res.blocked, HashMap::from([(node("z"), node("y"))]));
    }

    #[test]
    fn test_self_loop_and_chained_block() {
        let (g, res) = plan(vec![derived("s", &["s"]), derived("t", &["s"]), derived("u", &["t"])]);

        let node = |id: &str| g.node(&FieldId::from(id)).unwrap();
        assert!(res.order.is_empty());
        assert_eq!(res.circular, HashSet::from([node("s")]));
        assert_eq!(res.blocked.get(&node("u")), Some(&node("t")));
    }
}
