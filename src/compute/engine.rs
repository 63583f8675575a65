//! A synchronous, single-threaded derivation engine.
use crate::analysis::topology;
use crate::compute::ledger::{DerivationError, Derived, Ledger};
use crate::expr::{FormulaEvaluator, Inputs};
use crate::graph::{DerivationGraph, NodeIndex};
use crate::store::{Derivation, FieldId, FormSchema, Value};
use log::{debug, warn};
use std::collections::HashMap;

pub struct DerivationEngine<'a> {
    schema: &'a FormSchema,
    evaluator: &'a dyn FormulaEvaluator,
}

impl<'a> DerivationEngine<'a> {
    pub fn new(schema: &'a FormSchema, evaluator: &'a dyn FormulaEvaluator) -> Self {
        Self { schema, evaluator }
    }

    /// Derives every derived field of the schema from the ordinary `values`.
    ///
    /// The result depends only on the schema, the values and the evaluator, so
    /// calling this twice with the same arguments gives equal ledgers.
    pub fn compute(&self, values: &HashMap<FieldId, Value>) -> Ledger {
        let graph = DerivationGraph::build(self.schema);
        let plan = topology::resolve(&graph);
        let mut ledger = Ledger::new();

        // First unknown parent per field, in parentFields order.
        let mut missing: HashMap<NodeIndex, &FieldId> = HashMap::new();
        for (node, parent) in graph.missing_parents() {
            warn!("Field '{}' derives from missing field '{}'", graph.field(*node), parent);
            missing.entry(*node).or_insert(parent);
        }

        for &node in &plan.order {
            let id = graph.field(node);
            let Some(derivation) = self.schema.field(id).and_then(|f| f.derivation.as_ref()) else {
                continue;
            };
            let result = match missing.get(&node) {
                Some(&parent) => Err(DerivationError::MissingParent { parent: parent.clone() }),
                None => self.derive(derivation, values, &ledger),
            };
            if let Err(e) = &result {
                debug!("Field '{}' did not derive: {}", id, e);
            }
            ledger.insert(id.clone(), result);
        }

        if !plan.is_acyclic() {
            let mut members: Vec<&FieldId> = plan.circular.iter().map(|&n| graph.field(n)).collect();
            members.sort();
            warn!("Circular dependency between fields {:?}", members);
        }
        for &node in &plan.circular {
            ledger.insert(graph.field(node).clone(), Err(DerivationError::CircularDependency));
        }
        for (&node, &parent) in &plan.blocked {
            let parent = graph.field(parent).clone();
            ledger.insert(graph.field(node).clone(), Err(DerivationError::DependsOnCycle { parent }));
        }

        debug!(
            "Recomputed {} derived fields ({} failed)",
            ledger.len(),
            ledger.failures().count()
        );
        ledger
    }

    /// Every parent of `derivation` exists and precedes it in the plan.
    fn derive(&self, derivation: &Derivation, values: &HashMap<FieldId, Value>, ledger: &Ledger) -> Derived {
        let mut inputs = Inputs::new();
        for parent in &derivation.parent_ids {
            let parent_is_derived = self.schema.field(parent).is_some_and(|f| f.is_derived());
            // A failed derived parent is seen as an absent value.
            let value = if parent_is_derived {
                ledger.value(parent).cloned()
            } else {
                values.get(parent).cloned()
            };
            inputs.push(parent.clone(), value);
        }
        Ok(self.evaluator.evaluate(&derivation.formula, &inputs)?)
    }
}
