//! Policy table.
//!
//! Built once at startup from [`rules::standard_rule`] and shared read-only
//! (`Arc<PolicyTable>`) by every request. A pair without a rule is a
//! fail-closed gap: the engine denies it as `Unregistered`.

mod rules;

pub use rules::{standard_rule, Access, IdentityPredicate, PolicyRule};

use rowguard_common::{EntityType, Operation};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: HashMap<(EntityType, Operation), PolicyRule>,
}

impl PolicyTable {
    /// The fixed social/messaging policy set.
    pub fn standard() -> Self {
        let mut rules = HashMap::new();
        for entity in EntityType::ALL {
            for op in Operation::ALL {
                if let Some(rule) = standard_rule(entity, op) {
                    rules.insert((entity, op), rule);
                }
            }
        }
        let table = Self { rules };
        debug!(
            registered = table.len(),
            unregistered = ?table.unregistered(),
            "policy table built"
        );
        table
    }

    pub fn rule(&self, entity: EntityType, op: Operation) -> Option<&PolicyRule> {
        self.rules.get(&(entity, op))
    }

    pub fn is_registered(&self, entity: EntityType, op: Operation) -> bool {
        self.rules.contains_key(&(entity, op))
    }

    /// Every (entity, operation) pair that has no rule, in declaration order.
    pub fn unregistered(&self) -> Vec<(EntityType, Operation)> {
        EntityType::ALL
            .iter()
            .flat_map(|e| Operation::ALL.iter().map(move |o| (*e, *o)))
            .filter(|(e, o)| !self.is_registered(*e, *o))
            .collect()
    }

    /// Registered rules, in declaration order.
    pub fn entries(&self) -> Vec<(EntityType, Operation, &PolicyRule)> {
        EntityType::ALL
            .iter()
            .flat_map(|e| Operation::ALL.iter().map(move |o| (*e, *o)))
            .filter_map(|(e, o)| self.rule(e, o).map(|r| (e, o, r)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}
