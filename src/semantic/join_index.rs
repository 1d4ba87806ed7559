//! From-clause bookkeeping: table groups, their joins and their aliases.
//!
//! Every navigation target in a query gets exactly one [`TableGroup`] per
//! (parent group, relative path) key, so a path used in several clauses
//! joins once. Groups are addressed by [`GroupId`], their creation index.

use std::collections::HashMap;

use crate::metamodel::table::{entity_tables, identifier_columns, subclass_restriction};
use crate::metamodel::{
    CollectionElement, CollectionMapping, EntityType, Metamodel, MetamodelError, ToOneMapping,
    ValueType,
};
use crate::sql::JoinType;

use super::bound::BoundExpr;

pub type GroupId = usize;

/// A column of one table of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub group: GroupId,
    /// Index into the group's `tables`.
    pub table: usize,
    pub column: String,
}

impl ColumnRef {
    pub fn new(group: GroupId, table: usize, column: impl Into<String>) -> Self {
        Self {
            group,
            table,
            column: column.into(),
        }
    }
}

/// One SQL table reference inside a group.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReference {
    pub table: String,
    pub schema: Option<String>,
    pub alias: String,
    /// Equalities joining this table to an earlier table of the same group:
    /// (earlier table index, earlier column, column on this table).
    pub join_columns: Vec<(usize, String, String)>,
}

/// What the rows of a group are.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKind {
    Entity { entity: String },
    BasicElements { column: String, value_type: ValueType },
    EmbeddableElements { embeddable: String, column_prefix: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOrigin {
    /// Synthesized for a path traversal.
    Implicit,
    /// Declared with `join` in the from clause.
    Explicit,
}

/// How a non-root group attaches to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupJoin {
    pub parent: GroupId,
    /// Navigated attribute name.
    pub attribute: String,
    pub join_type: JoinType,
    pub origin: JoinOrigin,
    /// Equalities between a parent column and a column of `tables[0]`.
    pub on: Vec<(ColumnRef, String)>,
    /// Bound `with` condition.
    pub condition: Option<BoundExpr>,
}

/// The tables and aliases bound to one navigation target.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub id: GroupId,
    /// Navigation path as written, for diagnostics (`o.customer`).
    pub path: String,
    pub kind: GroupKind,
    pub tables: Vec<TableReference>,
    /// Index of the first entity table; 1 when a collection table comes
    /// first.
    pub entity_table: usize,
    pub user_alias: Option<String>,
    /// `None` for from-clause roots.
    pub join: Option<GroupJoin>,
    pub fetched: bool,
    /// List index or map key column on `tables[0]`.
    pub index_column: Option<(String, ValueType)>,
    /// Discriminator column and accepted values for single-table subclasses.
    pub restriction: Option<(String, Vec<String>)>,
}

impl TableGroup {
    /// Alias of the group's first table, the one SQL predicates qualify.
    pub fn primary_alias(&self) -> &str {
        self.tables.first().map(|t| t.alias.as_str()).unwrap_or_default()
    }

    pub fn entity_alias(&self) -> &str {
        self.tables
            .get(self.entity_table)
            .map(|t| t.alias.as_str())
            .unwrap_or_else(|| self.primary_alias())
    }

    pub fn entity_name(&self) -> Option<&str> {
        match &self.kind {
            GroupKind::Entity { entity } => Some(entity),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.join.as_ref().map(|j| j.parent)
    }
}

/// Which value of a group an alias denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupView {
    /// The entity or element value.
    Value,
    /// The collection index (`join indices(...)`).
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasTarget {
    pub group: GroupId,
    pub view: GroupView,
}

// ============================================================================
// Alias generation
// ============================================================================

/// Generates `{stem}{n}_{table}` aliases with a counter per stem.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    counters: HashMap<String, usize>,
}

impl AliasGenerator {
    /// Next base alias for `name`, without the table suffix (`p1`).
    pub fn next_base(&mut self, name: &str) -> String {
        let stem = alias_stem(name);
        let counter = self.counters.entry(stem.clone()).or_insert(0);
        *counter += 1;
        format!("{}{}", stem, counter)
    }
}

/// Lowercase acronym of a camel-case or underscored name:
/// `Person` is `p`, `orderLines` is `ol`, `com.acme.LineItem` is `li`.
pub fn alias_stem(name: &str) -> String {
    let simple = name.rsplit('.').next().unwrap_or(name);
    let mut stem = String::new();
    let mut boundary = true;
    for c in simple.chars() {
        if c == '_' || c == '$' {
            boundary = true;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            boundary = false;
            continue;
        }
        if boundary || c.is_ascii_uppercase() {
            stem.push(c.to_ascii_lowercase());
        }
        boundary = false;
    }
    if stem.is_empty() {
        stem.push('t');
    }
    stem
}

// ============================================================================
// Join targets
// ============================================================================

/// The association a new join follows.
#[derive(Debug, Clone, Copy)]
pub enum Association<'a> {
    /// Parent-side foreign key columns, in target identifier order.
    ToOne {
        mapping: &'a ToOneMapping,
        foreign_key: &'a [ColumnRef],
    },
    /// Parent-side identifier columns, in key column order.
    Collection {
        mapping: &'a CollectionMapping,
        owner_ids: &'a [ColumnRef],
    },
}

/// Everything needed to create a joined group.
#[derive(Debug, Clone, Copy)]
pub struct JoinRequest<'a> {
    pub parent: GroupId,
    /// Path relative to the parent group (`address.country`, `lines`).
    pub relative_path: &'a str,
    /// Full path for diagnostics.
    pub display_path: &'a str,
    pub association: Association<'a>,
    pub join_type: JoinType,
    pub origin: JoinOrigin,
}

// ============================================================================
// Join index
// ============================================================================

/// Per-query registry of table groups.
#[derive(Debug, Default)]
pub struct JoinIndex {
    groups: Vec<TableGroup>,
    paths: HashMap<(GroupId, String), GroupId>,
    aliases: HashMap<String, AliasTarget>,
    generator: AliasGenerator,
}

impl JoinIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[TableGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&TableGroup> {
        self.groups.get(id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut TableGroup> {
        self.groups.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// SQL alias of a column's table.
    pub fn table_alias(&self, column: &ColumnRef) -> Option<&str> {
        self.groups
            .get(column.group)
            .and_then(|g| g.tables.get(column.table))
            .map(|t| t.alias.as_str())
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    /// Bind a user alias. Aliases are case-sensitive and unique per query.
    pub fn register_alias(&mut self, alias: &str, target: AliasTarget) -> Result<(), String> {
        if self.aliases.contains_key(alias) {
            return Err(format!("alias declared more than once: {}", alias));
        }
        self.aliases.insert(alias.to_string(), target);
        if target.view == GroupView::Value {
            if let Some(group) = self.groups.get_mut(target.group) {
                group.user_alias.get_or_insert_with(|| alias.to_string());
            }
        }
        Ok(())
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<AliasTarget> {
        self.aliases.get(alias).copied()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    /// Reserve a fresh single-table alias, for subquery tables.
    pub fn reserve_alias(&mut self, name: &str) -> String {
        format!("{}_0", self.generator.next_base(name))
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Create the group for a from-clause root.
    pub fn create_root(
        &mut self,
        metamodel: &dyn Metamodel,
        entity: &EntityType,
        path: &str,
    ) -> Result<GroupId, MetamodelError> {
        let base = self.generator.next_base(entity.simple_name());
        let tables = entity_table_references(metamodel, entity, &base, 0)?;
        let id = self.groups.len();
        tracing::trace!(id, entity = %entity.name, alias = %base, "root table group");
        self.groups.push(TableGroup {
            id,
            path: path.to_string(),
            kind: GroupKind::Entity {
                entity: entity.name.clone(),
            },
            tables,
            entity_table: 0,
            user_alias: None,
            join: None,
            fetched: false,
            index_column: None,
            restriction: subclass_restriction(metamodel, entity),
        });
        Ok(id)
    }

    /// Existing group for (parent, relative path).
    pub fn lookup(&self, parent: GroupId, relative_path: &str) -> Option<GroupId> {
        self.paths.get(&(parent, relative_path.to_string())).copied()
    }

    /// Make later traversals of (parent, relative path) reuse `group`.
    /// The first registration wins.
    pub fn register_path(&mut self, parent: GroupId, relative_path: &str, group: GroupId) {
        self.paths
            .entry((parent, relative_path.to_string()))
            .or_insert(group);
    }

    /// The group for a path traversal, created and registered on first use.
    pub fn resolve_or_create_join(
        &mut self,
        metamodel: &dyn Metamodel,
        request: JoinRequest<'_>,
    ) -> Result<GroupId, MetamodelError> {
        if let Some(existing) = self.lookup(request.parent, request.relative_path) {
            return Ok(existing);
        }
        let id = self.create_join(metamodel, request)?;
        self.register_path(request.parent, request.relative_path, id);
        Ok(id)
    }

    /// Create a joined group without registering its path.
    pub fn create_join(
        &mut self,
        metamodel: &dyn Metamodel,
        request: JoinRequest<'_>,
    ) -> Result<GroupId, MetamodelError> {
        let id = self.groups.len();
        let mut group = match request.association {
            Association::ToOne {
                mapping,
                foreign_key,
            } => {
                let target = lookup_entity(metamodel, &mapping.target)?;
                let base = self.generator.next_base(&mapping.name);
                let tables = entity_table_references(metamodel, target, &base, 0)?;
                let on = foreign_key
                    .iter()
                    .cloned()
                    .zip(identifier_column_names(metamodel, target)?)
                    .collect();
                TableGroup {
                    id,
                    path: request.display_path.to_string(),
                    kind: GroupKind::Entity {
                        entity: target.name.clone(),
                    },
                    tables,
                    entity_table: 0,
                    user_alias: None,
                    join: Some(GroupJoin {
                        parent: request.parent,
                        attribute: mapping.name.clone(),
                        join_type: request.join_type,
                        origin: request.origin,
                        on,
                        condition: None,
                    }),
                    fetched: false,
                    index_column: None,
                    restriction: subclass_restriction(metamodel, target),
                }
            }
            Association::Collection { mapping, owner_ids } => {
                self.collection_group(metamodel, id, mapping, owner_ids, &request)?
            }
        };
        group.id = id;
        tracing::trace!(
            id,
            path = %group.path,
            alias = %group.primary_alias(),
            join_type = ?request.join_type,
            "joined table group"
        );
        self.groups.push(group);
        Ok(id)
    }

    fn collection_group(
        &mut self,
        metamodel: &dyn Metamodel,
        id: GroupId,
        mapping: &CollectionMapping,
        owner_ids: &[ColumnRef],
        request: &JoinRequest<'_>,
    ) -> Result<TableGroup, MetamodelError> {
        let base = self.generator.next_base(&mapping.name);
        let on: Vec<(ColumnRef, String)> = owner_ids
            .iter()
            .cloned()
            .zip(mapping.key_columns.iter().cloned())
            .collect();

        let (kind, tables, entity_table, restriction) = match (&mapping.table, &mapping.element) {
            (None, CollectionElement::Entity { target, .. }) => {
                let target = lookup_entity(metamodel, target)?;
                let tables = entity_table_references(metamodel, target, &base, 0)?;
                (
                    GroupKind::Entity {
                        entity: target.name.clone(),
                    },
                    tables,
                    0,
                    subclass_restriction(metamodel, target),
                )
            }
            (Some(table), element) => {
                let mut tables = vec![TableReference {
                    table: table.clone(),
                    schema: mapping.schema.clone(),
                    alias: format!("{}_0", base),
                    join_columns: vec![],
                }];
                let (kind, entity_table, restriction) = match element {
                    CollectionElement::Entity { target, columns } => {
                        let target = lookup_entity(metamodel, target)?;
                        let mut entity_tables = entity_table_references(metamodel, target, &base, 1)?;
                        let keys = identifier_column_names(metamodel, target)?;
                        if let Some(first) = entity_tables.first_mut() {
                            first.join_columns = columns
                                .iter()
                                .cloned()
                                .zip(keys)
                                .map(|(element_column, key)| (0, element_column, key))
                                .collect();
                        }
                        tables.extend(entity_tables);
                        (
                            GroupKind::Entity {
                                entity: target.name.clone(),
                            },
                            1,
                            subclass_restriction(metamodel, target),
                        )
                    }
                    CollectionElement::Basic { column, value_type } => (
                        GroupKind::BasicElements {
                            column: column.clone(),
                            value_type: *value_type,
                        },
                        0,
                        None,
                    ),
                    CollectionElement::Embeddable {
                        embeddable,
                        column_prefix,
                    } => (
                        GroupKind::EmbeddableElements {
                            embeddable: embeddable.clone(),
                            column_prefix: column_prefix.clone(),
                        },
                        0,
                        None,
                    ),
                };
                (kind, tables, entity_table, restriction)
            }
            (None, _) => {
                return Err(MetamodelError::Invalid(vec![format!(
                    "{}: element collection needs a table",
                    mapping.name
                )]))
            }
        };

        Ok(TableGroup {
            id,
            path: request.display_path.to_string(),
            kind,
            tables,
            entity_table,
            user_alias: None,
            join: Some(GroupJoin {
                parent: request.parent,
                attribute: mapping.name.clone(),
                join_type: request.join_type,
                origin: request.origin,
                on,
                condition: None,
            }),
            fetched: false,
            index_column: mapping
                .index
                .as_ref()
                .map(|i| (i.column.clone(), i.value_type)),
            restriction,
        })
    }
}

fn lookup_entity<'a>(metamodel: &'a dyn Metamodel, name: &str) -> Result<&'a EntityType, MetamodelError> {
    metamodel
        .entity_type(name)
        .ok_or_else(|| MetamodelError::UnknownType(name.to_string()))
}

/// Table references for an entity's hierarchy, numbered from `first_index`.
/// Subclass tables join the hierarchy's first table on their key columns.
fn entity_table_references(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
    base: &str,
    first_index: usize,
) -> Result<Vec<TableReference>, MetamodelError> {
    let tables = entity_tables(metamodel, entity)?;
    let root_keys = tables.first().map(|t| t.key_columns.clone()).unwrap_or_default();
    Ok(tables
        .into_iter()
        .enumerate()
        .map(|(i, table)| TableReference {
            join_columns: if i == 0 {
                vec![]
            } else {
                root_keys
                    .iter()
                    .cloned()
                    .zip(table.key_columns)
                    .map(|(root, own)| (first_index, root, own))
                    .collect()
            },
            alias: format!("{}_{}", base, first_index + i),
            table: table.name,
            schema: table.schema,
        })
        .collect())
}

/// Identifier column names of `entity`, which a joining foreign key
/// references.
fn identifier_column_names(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
) -> Result<Vec<String>, MetamodelError> {
    Ok(identifier_columns(metamodel, entity)?
        .into_iter()
        .map(|c| c.column)
        .collect())
}
