//! Bound query: the syntax tree with every identifier resolved.
//!
//! Leaves point at table-group columns, parameter slots or literals. The
//! producer turns this into SQL without consulting the syntax tree again.

use std::fmt;

use serde::Serialize;

use super::join_index::{ColumnRef, GroupId};
use super::path::CollectionRef;
use crate::hql::{BinaryOp, Literal, NullPrecedence, SortDirection, UnaryOp};
use crate::metamodel::ValueType;

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    /// A basic-valued column.
    Column {
        column: ColumnRef,
        value_type: ValueType,
    },
    /// An entity-valued reference; compares by identifier.
    Entity { group: GroupId, entity: String },
    /// An embeddable value, one column per basic leaf.
    Embeddable {
        columns: Vec<ColumnRef>,
        embeddable: String,
    },
    Literal(Literal),
    Parameter { slot: usize },
    /// An entity name compared against `TYPE(x)`.
    TypeLiteral { entity: String, value: String },
    /// `TYPE(x)`: the discriminator column of x's group.
    Discriminator { column: ColumnRef },
    Binary {
        left: Box<BoundExpr>,
        op: BinaryOp,
        right: Box<BoundExpr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },
    Function {
        name: String,
        args: Vec<BoundExpr>,
        distinct: bool,
    },
    CountStar,
    Case {
        operand: Option<Box<BoundExpr>>,
        whens: Vec<(BoundExpr, BoundExpr)>,
        else_result: Option<Box<BoundExpr>>,
    },
    IsNull {
        expr: Box<BoundExpr>,
        negated: bool,
    },
    Between {
        expr: Box<BoundExpr>,
        low: Box<BoundExpr>,
        high: Box<BoundExpr>,
        negated: bool,
    },
    InList {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        negated: bool,
    },
    Like {
        expr: Box<BoundExpr>,
        pattern: Box<BoundExpr>,
        escape: Option<Box<BoundExpr>>,
        negated: bool,
    },
    /// Element count of a collection.
    Size(CollectionRef),
    IsEmpty {
        collection: CollectionRef,
        negated: bool,
    },
    MemberOf {
        element: Box<BoundExpr>,
        collection: CollectionRef,
        negated: bool,
    },
    Paren(Box<BoundExpr>),
    /// A select item referenced through its result variable.
    ResultVariable(usize),
    /// Stands in for a sub-expression that failed to bind.
    Error,
}

impl BoundExpr {
    /// Groups whose columns this expression reads, in first-use order.
    pub fn referenced_groups(&self) -> Vec<GroupId> {
        let mut groups = Vec::new();
        self.collect_groups(&mut groups);
        groups
    }

    fn collect_groups(&self, out: &mut Vec<GroupId>) {
        fn add(out: &mut Vec<GroupId>, g: GroupId) {
            if !out.contains(&g) {
                out.push(g);
            }
        }
        match self {
            BoundExpr::Column { column, .. } | BoundExpr::Discriminator { column } => add(out, column.group),
            BoundExpr::Entity { group, .. } => add(out, *group),
            BoundExpr::Embeddable { columns, .. } => {
                for c in columns {
                    add(out, c.group);
                }
            }
            BoundExpr::Size(c) | BoundExpr::IsEmpty { collection: c, .. } => add(out, c.owner),
            BoundExpr::MemberOf {
                element,
                collection,
                ..
            } => {
                add(out, collection.owner);
                element.collect_groups(out);
            }
            BoundExpr::Binary { left, right, .. } => {
                left.collect_groups(out);
                right.collect_groups(out);
            }
            BoundExpr::Unary { expr, .. }
            | BoundExpr::IsNull { expr, .. }
            | BoundExpr::Paren(expr) => expr.collect_groups(out),
            BoundExpr::Function { args, .. } => {
                for a in args {
                    a.collect_groups(out);
                }
            }
            BoundExpr::Case {
                operand,
                whens,
                else_result,
            } => {
                if let Some(o) = operand {
                    o.collect_groups(out);
                }
                for (w, t) in whens {
                    w.collect_groups(out);
                    t.collect_groups(out);
                }
                if let Some(e) = else_result {
                    e.collect_groups(out);
                }
            }
            BoundExpr::Between { expr, low, high, .. } => {
                expr.collect_groups(out);
                low.collect_groups(out);
                high.collect_groups(out);
            }
            BoundExpr::InList { expr, list, .. } => {
                expr.collect_groups(out);
                for item in list {
                    item.collect_groups(out);
                }
            }
            BoundExpr::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                expr.collect_groups(out);
                pattern.collect_groups(out);
                if let Some(e) = escape {
                    e.collect_groups(out);
                }
            }
            BoundExpr::Literal(_)
            | BoundExpr::Parameter { .. }
            | BoundExpr::TypeLiteral { .. }
            | BoundExpr::CountStar
            | BoundExpr::ResultVariable(_)
            | BoundExpr::Error => {}
        }
    }
}

// ============================================================================
// Query
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSelectItem {
    pub expr: BoundExpr,
    /// Result variable declared with `as`.
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSort {
    pub expr: BoundExpr,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullPrecedence>,
}

/// A fully bound `select` statement.
///
/// Table groups live in the join index of the translation context; this
/// only records which of them are roots and which are fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundQuery {
    pub distinct: bool,
    pub select: Vec<BoundSelectItem>,
    pub roots: Vec<GroupId>,
    pub fetches: Vec<GroupId>,
    pub where_clause: Option<BoundExpr>,
    pub group_by: Vec<BoundExpr>,
    pub having: Option<BoundExpr>,
    pub order_by: Vec<BoundSort>,
    pub limit: Option<BoundExpr>,
    pub offset: Option<BoundExpr>,
}

// ============================================================================
// Parameters
// ============================================================================

/// How a parameter is referenced in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    Named(String),
    Positional(u32),
}

impl ParameterKey {
    /// Parse `:name` or `?1`.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(name) = text.strip_prefix(':') {
            (!name.is_empty()).then(|| ParameterKey::Named(name.to_string()))
        } else if let Some(label) = text.strip_prefix('?') {
            label.parse::<u32>().ok().filter(|&p| p > 0).map(ParameterKey::Positional)
        } else {
            None
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::Named(name) => write!(f, ":{}", name),
            ParameterKey::Positional(position) => write!(f, "?{}", position),
        }
    }
}

/// A parameter the caller declares up front, optionally typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub key: ParameterKey,
    pub value_type: Option<ValueType>,
}

impl ParameterDeclaration {
    pub fn new(key: ParameterKey) -> Self {
        Self {
            key,
            value_type: None,
        }
    }

    pub fn typed(key: ParameterKey, value_type: ValueType) -> Self {
        Self {
            key,
            value_type: Some(value_type),
        }
    }
}

/// Where the value of a bind slot comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterSource {
    Named { name: String },
    Positional { position: u32 },
    /// A parameter of an enabled filter.
    Filter { filter: String, parameter: String },
}

impl From<ParameterKey> for ParameterSource {
    fn from(key: ParameterKey) -> Self {
        match key {
            ParameterKey::Named(name) => ParameterSource::Named { name },
            ParameterKey::Positional(position) => ParameterSource::Positional { position },
        }
    }
}

impl ParameterSource {
    /// The query-level key, for sources written in the query text.
    pub fn key(&self) -> Option<ParameterKey> {
        match self {
            ParameterSource::Named { name } => Some(ParameterKey::Named(name.clone())),
            ParameterSource::Positional { position } => Some(ParameterKey::Positional(*position)),
            ParameterSource::Filter { .. } => None,
        }
    }
}

impl fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterSource::Named { name } => write!(f, ":{}", name),
            ParameterSource::Positional { position } => write!(f, "?{}", position),
            ParameterSource::Filter { filter, parameter } => write!(f, "{}.{}", filter, parameter),
        }
    }
}

/// One bind slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSlot {
    pub source: ParameterSource,
    pub value_type: Option<ValueType>,
}

/// Bind slots in first-occurrence order; a repeated source reuses its slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterRegistry {
    slots: Vec<ParameterSlot>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `source`, allocating one on first use.
    pub fn slot_for(&mut self, source: ParameterSource) -> usize {
        if let Some(slot) = self.slots.iter().position(|s| s.source == source) {
            return slot;
        }
        tracing::trace!(%source, slot = self.slots.len(), "new parameter slot");
        self.slots.push(ParameterSlot {
            source,
            value_type: None,
        });
        self.slots.len() - 1
    }

    /// Record an inferred type; the first inference wins.
    pub fn infer_type(&mut self, slot: usize, value_type: ValueType) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.value_type.get_or_insert(value_type);
        }
    }

    /// Record a declared type, replacing any inference.
    pub fn declare_type(&mut self, slot: usize, value_type: ValueType) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.value_type = Some(value_type);
        }
    }

    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
