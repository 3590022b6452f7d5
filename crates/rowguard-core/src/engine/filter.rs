//! Read filter handed to callers that fetch rows themselves.

use super::{PolicyEngine, RowSet};
use crate::error::Denial;
use crate::policy::PolicyRule;
use crate::principal::Principal;
use crate::resolver::RelationshipResolver;
use rowguard_common::{EntityType, Operation, Row};

/// Read decision bound to one principal, entity and resolver.
///
/// The rule lookup and identity check happen once, when the filter is built;
/// each row then costs one predicate evaluation. Every rejected row is
/// recorded as a denial.
pub struct RowFilter<'a, R> {
    engine: &'a PolicyEngine,
    principal: &'a Principal,
    entity: EntityType,
    gate: Result<PolicyRule, Denial>,
    resolver: &'a R,
}

impl<'a, R> RowFilter<'a, R>
where
    R: RelationshipResolver,
{
    pub(super) fn new(
        engine: &'a PolicyEngine,
        principal: &'a Principal,
        entity: EntityType,
        resolver: &'a R,
    ) -> Self {
        let gate = engine.gate(principal, entity, Operation::Read);
        Self {
            engine,
            principal,
            entity,
            gate,
            resolver,
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// Check one row.
    pub fn check(&self, row: &Row) -> Result<(), Denial> {
        let result = match &self.gate {
            Ok(rule) => self.engine.evaluate(
                self.principal,
                self.entity,
                Operation::Read,
                *rule,
                row,
                self.resolver,
            ),
            Err(denial) => Err(denial.clone()),
        };
        if let Err(denial) = &result {
            self.engine.record(self.principal, denial, Some(row.key()));
        }
        result
    }

    pub fn allows(&self, row: &Row) -> bool {
        self.check(row).is_ok()
    }

    /// Keep the visible rows, in order.
    pub fn apply(&self, rows: Vec<Row>) -> RowSet {
        match &self.gate {
            Ok(rule) => self.engine.filter_with(
                self.principal,
                self.entity,
                Operation::Read,
                *rule,
                rows,
                self.resolver,
            ),
            Err(denial) => {
                let hidden = rows.len();
                if hidden > 0 {
                    let denial = denial
                        .clone()
                        .with_detail(format!("{} rows hidden", hidden));
                    self.engine.record(self.principal, &denial, None);
                }
                RowSet::all_hidden(hidden)
            }
        }
    }
}
