//! Policy enforcement engine.
//!
//! Flow per call:
//! 1. Look up the rule for (entity, operation); no rule is `Unregistered`
//! 2. Anonymous principal against an identity rule is `Unauthenticated`
//! 3. Check the target's shape and entity
//! 4. Update/delete: re-fetch the current row from the store
//! 5. Evaluate the predicate; a failed lookup is `Indeterminate`
//!
//! Writes get [`Decision::Allow`] or [`Decision::Deny`]; reads get
//! [`Decision::Filtered`] with the visible subset. Every denial is handed to
//! the configured [`DenialSink`]; allows are not recorded.

mod filter;

pub use filter::RowFilter;

use crate::audit::{DenialEvent, DenialSink};
use crate::error::{AccessError, Denial, DenialKind};
use crate::policy::{Access, PolicyRule, PolicyTable};
use crate::principal::Principal;
use crate::resolver::{RelationshipResolver, RowFetcher};
use rowguard_common::{EntityType, Operation, Row, RowKey, UserId};
use std::sync::Arc;
use tracing::debug;

/// What an operation is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A row that does not exist yet (insert), or a single candidate row.
    Proposed(Row),
    /// A stored row (update/delete), optionally with its proposed new state.
    Existing {
        key: RowKey,
        proposed: Option<Row>,
    },
    /// Candidate rows of a read.
    Rows(Vec<Row>),
}

impl Target {
    pub fn existing(key: RowKey) -> Self {
        Self::Existing {
            key,
            proposed: None,
        }
    }

    pub fn key(&self) -> Option<RowKey> {
        match self {
            Self::Proposed(row) => Some(row.key()),
            Self::Existing { key, .. } => Some(*key),
            Self::Rows(_) => None,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Proposed(_) => "proposed row",
            Self::Existing { .. } => "existing row",
            Self::Rows(_) => "row set",
        }
    }
}

/// Outcome of a read: the visible rows, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    /// Rows excluded for any reason (indeterminate ones included).
    pub hidden: usize,
    /// Rows excluded because a lookup failed or ran out of time.
    pub indeterminate: usize,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn all_hidden(count: usize) -> Self {
        Self {
            rows: Vec::new(),
            hidden: count,
            indeterminate: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { rule: &'static str },
    Deny(Denial),
    Filtered(RowSet),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Deny(d) => Some(d),
            _ => None,
        }
    }

    /// `Ok` for an allow or a filtered read, `Err` for a denial.
    pub fn require(self) -> Result<(), AccessError> {
        match self {
            Self::Allow { .. } | Self::Filtered(_) => Ok(()),
            Self::Deny(d) => Err(d.into()),
        }
    }

    pub fn into_row_set(self) -> Option<RowSet> {
        match self {
            Self::Filtered(set) => Some(set),
            _ => None,
        }
    }
}

/// Stateless evaluator over an immutable policy table.
#[derive(Clone)]
pub struct PolicyEngine {
    table: Arc<PolicyTable>,
    sink: Arc<dyn DenialSink>,
}

impl PolicyEngine {
    pub fn new(table: Arc<PolicyTable>, sink: Arc<dyn DenialSink>) -> Self {
        Self { table, sink }
    }

    pub fn with_standard_policies(sink: Arc<dyn DenialSink>) -> Self {
        Self::new(Arc::new(PolicyTable::standard()), sink)
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// Decide one operation.
    ///
    /// Update accepts `Target::Proposed(new_row)` as shorthand for
    /// `Existing { key: new_row.key(), proposed: Some(new_row) }`; delete
    /// accepts it as shorthand for `Existing { key, proposed: None }` and
    /// ignores the payload. Read accepts any shape and filters it.
    pub fn authorize<R>(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
        target: Target,
        resolver: &R,
    ) -> Decision
    where
        R: RelationshipResolver + RowFetcher,
    {
        let rule = match self.gate(principal, entity, op) {
            Ok(rule) => rule,
            Err(denial) if op == Operation::Read => {
                let (hidden, key) = match &target {
                    Target::Rows(rows) => (rows.len(), None),
                    other => (1, other.key()),
                };
                if hidden > 0 {
                    self.record(
                        principal,
                        &denial.with_detail(format!("{} rows hidden", hidden)),
                        key,
                    );
                }
                return Decision::Filtered(RowSet::all_hidden(hidden));
            }
            Err(denial) => return self.deny(principal, denial, target.key()),
        };

        match (op, target) {
            (Operation::Read, Target::Rows(rows)) => {
                Decision::Filtered(self.filter_with(principal, entity, op, rule, rows, resolver))
            }
            (Operation::Read, Target::Proposed(row)) => Decision::Filtered(self.filter_with(
                principal,
                entity,
                op,
                rule,
                vec![row],
                resolver,
            )),
            (Operation::Read, Target::Existing { key, .. }) => {
                Decision::Filtered(self.read_existing(principal, entity, rule, key, resolver))
            }
            (Operation::Insert, Target::Proposed(row)) => {
                let key = row.key();
                match self.evaluate(principal, entity, op, rule, &row, resolver) {
                    Ok(()) => Decision::Allow { rule: rule.name },
                    Err(denial) => self.deny(principal, denial, Some(key)),
                }
            }
            (Operation::Update, Target::Proposed(row)) => {
                let key = row.key();
                self.decide_existing(principal, entity, op, rule, key, Some(row), resolver)
            }
            (Operation::Update, Target::Existing { key, proposed }) => {
                self.decide_existing(principal, entity, op, rule, key, proposed, resolver)
            }
            (Operation::Delete, target @ (Target::Proposed(_) | Target::Existing { .. })) => {
                match target.key() {
                    Some(key) => {
                        self.decide_existing(principal, entity, op, rule, key, None, resolver)
                    }
                    None => {
                        let denial = Denial::target_mismatch(entity, op, "no target key");
                        self.deny(principal, denial, None)
                    }
                }
            }
            (op, target) => {
                let denial = Denial::target_mismatch(
                    entity,
                    op,
                    format!("{} not accepted for {}", target.shape(), op),
                );
                self.deny(principal, denial, target.key())
            }
        }
    }

    /// Decide an insert of `row`.
    pub fn authorize_insert<R>(&self, principal: &Principal, row: Row, resolver: &R) -> Decision
    where
        R: RelationshipResolver + RowFetcher,
    {
        let entity = row.entity_type();
        self.authorize(
            principal,
            entity,
            Operation::Insert,
            Target::Proposed(row),
            resolver,
        )
    }

    /// Decide an update of the stored row `key`, optionally checking its
    /// proposed new state too.
    pub fn authorize_update<R>(
        &self,
        principal: &Principal,
        key: RowKey,
        proposed: Option<Row>,
        resolver: &R,
    ) -> Decision
    where
        R: RelationshipResolver + RowFetcher,
    {
        self.authorize(
            principal,
            key.entity_type(),
            Operation::Update,
            Target::Existing { key, proposed },
            resolver,
        )
    }

    pub fn authorize_delete<R>(&self, principal: &Principal, key: RowKey, resolver: &R) -> Decision
    where
        R: RelationshipResolver + RowFetcher,
    {
        self.authorize(
            principal,
            key.entity_type(),
            Operation::Delete,
            Target::existing(key),
            resolver,
        )
    }

    /// Reduce `rows` to the ones `principal` may read.
    pub fn filter_rows<R>(
        &self,
        principal: &Principal,
        entity: EntityType,
        rows: Vec<Row>,
        resolver: &R,
    ) -> RowSet
    where
        R: RelationshipResolver,
    {
        self.row_filter(principal, entity, resolver).apply(rows)
    }

    /// A reusable read filter for callers that fetch rows themselves.
    pub fn row_filter<'a, R>(
        &'a self,
        principal: &'a Principal,
        entity: EntityType,
        resolver: &'a R,
    ) -> RowFilter<'a, R>
    where
        R: RelationshipResolver,
    {
        RowFilter::new(self, principal, entity, resolver)
    }

    /// The acting user for an operation whose target row can only be built
    /// once the caller's identity is known. Anonymous callers get the same
    /// denial (and audit record) `authorize` would produce.
    pub fn require_identity(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
    ) -> Result<UserId, AccessError> {
        match (self.gate(principal, entity, op), principal.user_id()) {
            (Ok(_), Some(user)) => Ok(user),
            (Err(denial), _) => {
                self.record(principal, &denial, None);
                Err(denial.into())
            }
            (Ok(rule), None) => {
                let denial = Denial::unauthenticated(entity, op, rule.name);
                self.record(principal, &denial, None);
                Err(denial.into())
            }
        }
    }

    fn gate(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
    ) -> Result<PolicyRule, Denial> {
        let rule = *self
            .table
            .rule(entity, op)
            .ok_or_else(|| Denial::unregistered(entity, op))?;
        if !rule.is_public() && !principal.is_authenticated() {
            return Err(Denial::unauthenticated(entity, op, rule.name));
        }
        Ok(rule)
    }

    /// Evaluate `rule` against one row.
    fn evaluate(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
        rule: PolicyRule,
        row: &Row,
        resolver: &dyn RelationshipResolver,
    ) -> Result<(), Denial> {
        if row.entity_type() != entity {
            return Err(Denial::target_mismatch(
                entity,
                op,
                format!("{} row offered", row.entity_type()),
            ));
        }
        match rule.access {
            Access::Public => Ok(()),
            Access::Identity(predicate) => {
                let Some(user) = principal.user_id() else {
                    return Err(Denial::unauthenticated(entity, op, rule.name));
                };
                match predicate(user, row, resolver) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Denial::forbidden(entity, op, rule.name)),
                    Err(e) => Err(Denial::indeterminate(entity, op, Some(rule.name), &e)),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decide_existing<R>(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
        rule: PolicyRule,
        key: RowKey,
        proposed: Option<Row>,
        resolver: &R,
    ) -> Decision
    where
        R: RelationshipResolver + RowFetcher,
    {
        if key.entity_type() != entity {
            let denial = Denial::target_mismatch(
                entity,
                op,
                format!("{} key offered", key.entity_type()),
            );
            return self.deny(principal, denial, Some(key));
        }
        if let Some(row) = &proposed {
            if row.key() != key {
                let denial =
                    Denial::target_mismatch(entity, op, "proposed row does not match target key");
                return self.deny(principal, denial, Some(key));
            }
        }

        let current = match resolver.fetch_row(key) {
            Ok(Some(row)) => row,
            Ok(None) => {
                let denial = Denial::target_missing(entity, op, rule.name);
                return self.deny(principal, denial, Some(key));
            }
            Err(e) => {
                let denial = Denial::indeterminate(entity, op, Some(rule.name), &e);
                return self.deny(principal, denial, Some(key));
            }
        };

        if let Err(denial) = self.evaluate(principal, entity, op, rule, &current, resolver) {
            return self.deny(principal, denial, Some(key));
        }
        if let Some(row) = &proposed {
            if let Err(denial) = self.evaluate(principal, entity, op, rule, row, resolver) {
                let denial = if denial.kind == DenialKind::Forbidden {
                    denial.with_detail("proposed row fails rule")
                } else {
                    denial
                };
                return self.deny(principal, denial, Some(key));
            }
            if let Some(field) = changed_fixed_field(&current, row) {
                let denial = Denial::forbidden(entity, op, rule.name)
                    .with_detail(format!("{} may not change", field));
                return self.deny(principal, denial, Some(key));
            }
        }
        Decision::Allow { rule: rule.name }
    }

    fn read_existing<R>(
        &self,
        principal: &Principal,
        entity: EntityType,
        rule: PolicyRule,
        key: RowKey,
        resolver: &R,
    ) -> RowSet
    where
        R: RelationshipResolver + RowFetcher,
    {
        if key.entity_type() != entity {
            let denial = Denial::target_mismatch(
                entity,
                Operation::Read,
                format!("{} key offered", key.entity_type()),
            );
            self.record(principal, &denial, Some(key));
            return RowSet::all_hidden(1);
        }
        match resolver.fetch_row(key) {
            Ok(Some(row)) => {
                self.filter_with(principal, entity, Operation::Read, rule, vec![row], resolver)
            }
            Ok(None) => RowSet::default(),
            Err(e) => {
                let denial = Denial::indeterminate(entity, Operation::Read, Some(rule.name), &e);
                self.record(principal, &denial, Some(key));
                RowSet {
                    rows: Vec::new(),
                    hidden: 1,
                    indeterminate: 1,
                }
            }
        }
    }

    fn filter_with(
        &self,
        principal: &Principal,
        entity: EntityType,
        op: Operation,
        rule: PolicyRule,
        rows: Vec<Row>,
        resolver: &dyn RelationshipResolver,
    ) -> RowSet {
        let mut set = RowSet::default();
        for row in rows {
            match self.evaluate(principal, entity, op, rule, &row, resolver) {
                Ok(()) => set.rows.push(row),
                Err(denial) => {
                    set.hidden += 1;
                    if denial.kind == DenialKind::Indeterminate {
                        set.indeterminate += 1;
                    }
                    self.record(principal, &denial, Some(row.key()));
                }
            }
        }
        debug!(
            entity = %entity,
            rule = rule.name,
            visible = set.rows.len(),
            hidden = set.hidden,
            indeterminate = set.indeterminate,
            "rows filtered"
        );
        set
    }

    fn deny(&self, principal: &Principal, denial: Denial, target: Option<RowKey>) -> Decision {
        self.record(principal, &denial, target);
        Decision::Deny(denial)
    }

    fn record(&self, principal: &Principal, denial: &Denial, target: Option<RowKey>) {
        self.sink
            .record(&DenialEvent::from_denial(principal, denial, target));
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("rules", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// First field an update may not rewrite, if `proposed` rewrites one.
///
/// A friend request keeps its endpoints for life; only its status moves.
fn changed_fixed_field(current: &Row, proposed: &Row) -> Option<&'static str> {
    match (current, proposed) {
        (Row::FriendRequest(cur), Row::FriendRequest(new)) => {
            if cur.sender != new.sender {
                Some("sender")
            } else if cur.receiver != new.receiver {
                Some("receiver")
            } else {
                None
            }
        }
        _ => None,
    }
}
