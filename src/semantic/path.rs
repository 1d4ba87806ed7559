//! Path expression resolution.
//!
//! Walks a dotted path segment by segment against the metamodel, creating
//! (or reusing) the table groups each association step needs:
//!
//! - embedded: same group, column prefix accumulates
//! - to-one: join to the target entity's group
//! - to-many: collection-valued if last; otherwise its elements are joined,
//!   implicitly or through an explicit `elements`/`indices` qualifier
//! - `size`: element count, rendered as a correlated subquery

use std::fmt;

use serde::Serialize;

use super::join_index::{
    AliasTarget, Association, ColumnRef, GroupId, GroupKind, GroupView, JoinIndex, JoinOrigin,
    JoinRequest,
};
use crate::metamodel::table::{embeddable_columns, identifier_columns, table_index};
use crate::metamodel::{
    AttributeDescriptor, CollectionElement, CollectionMapping, EntityType, Metamodel, ValueType,
};
use crate::sql::JoinType;

// ============================================================================
// Resolved paths
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Basic,
    Embedded,
    ToOne,
    ToMany,
    CollectionElement,
    CollectionIndex,
    CollectionSize,
}

/// One resolved segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStep {
    pub name: String,
    pub kind: StepKind,
    /// Entity, embeddable or value type the step produces.
    pub type_name: String,
}

/// A plural attribute reached by a path, before any join to its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRef {
    pub owner: GroupId,
    pub owner_entity: String,
    pub mapping: CollectionMapping,
    /// Owner identifier columns, in key column order.
    pub owner_ids: Vec<ColumnRef>,
    /// The path as written, for diagnostics.
    pub path: String,
}

/// What a resolved path denotes.
#[derive(Debug, Clone, PartialEq)]
pub enum PathTarget {
    Basic {
        column: ColumnRef,
        value_type: ValueType,
    },
    Entity {
        group: GroupId,
        entity: String,
    },
    Embeddable {
        columns: Vec<ColumnRef>,
        embeddable: String,
    },
    /// A collection-valued path that was not joined.
    Collection(CollectionRef),
    Size(CollectionRef),
    Index {
        column: ColumnRef,
        value_type: ValueType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub steps: Vec<PathStep>,
    pub target: PathTarget,
    /// Group created by the final association step of an explicit join,
    /// with the view its alias should bind.
    pub joined: Option<(GroupId, GroupView)>,
}

/// The clause a path appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    From,
    With,
    Select,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Clause::From => "from",
            Clause::With => "with",
            Clause::Select => "select",
            Clause::Where => "where",
            Clause::GroupBy => "group by",
            Clause::Having => "having",
            Clause::OrderBy => "order by",
        })
    }
}

/// Join settings applied to the last association of a from-clause path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplicitJoin {
    pub join_type: JoinType,
    /// Register the path so implicit traversals reuse the join.
    pub reusable: bool,
}

/// Where resolution currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// An entity; its tables start at `offset` within the group.
    Entity {
        group: GroupId,
        entity: String,
        offset: usize,
    },
    Embeddable {
        group: GroupId,
        table: usize,
        embeddable: String,
        prefix: String,
    },
    Value {
        column: ColumnRef,
        value_type: ValueType,
    },
}

impl Scope {
    /// The scope an alias denotes.
    pub fn of_alias(joins: &JoinIndex, target: AliasTarget) -> Option<Scope> {
        let group = joins.group(target.group)?;
        if target.view == GroupView::Index {
            let (column, value_type) = group.index_column.clone()?;
            return Some(Scope::Value {
                column: ColumnRef::new(group.id, 0, column),
                value_type,
            });
        }
        Self::of_group(joins, group.id)
    }

    /// The value scope of a group's rows.
    pub fn of_group(joins: &JoinIndex, id: GroupId) -> Option<Scope> {
        let group = joins.group(id)?;
        Some(match &group.kind {
            GroupKind::Entity { entity } => Scope::Entity {
                group: id,
                entity: entity.clone(),
                offset: group.entity_table,
            },
            GroupKind::BasicElements { column, value_type } => Scope::Value {
                column: ColumnRef::new(id, 0, column.clone()),
                value_type: *value_type,
            },
            GroupKind::EmbeddableElements {
                embeddable,
                column_prefix,
            } => Scope::Embeddable {
                group: id,
                table: 0,
                embeddable: embeddable.clone(),
                prefix: column_prefix.clone(),
            },
        })
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolution state carried across segments.
struct Walk<'s> {
    scope: Scope,
    /// Segments walked since the scope's group was entered.
    relative: Vec<&'s str>,
    display: String,
    steps: Vec<PathStep>,
    joined: Option<(GroupId, GroupView)>,
    index_last: bool,
}

pub struct PathResolver<'a> {
    metamodel: &'a dyn Metamodel,
}

impl<'a> PathResolver<'a> {
    pub fn new(metamodel: &'a dyn Metamodel) -> Self {
        Self { metamodel }
    }

    /// Resolve `segments` starting from `start`, named `start_name` in
    /// diagnostics.
    ///
    /// Errors are returned as user-facing messages.
    pub fn resolve(
        &self,
        joins: &mut JoinIndex,
        start: Scope,
        start_name: &str,
        segments: &[&str],
        clause: Clause,
        explicit: Option<ExplicitJoin>,
    ) -> Result<ResolvedPath, String> {
        let mut walk = Walk {
            scope: start,
            relative: vec![],
            display: start_name.to_string(),
            steps: vec![],
            joined: None,
            index_last: false,
        };

        let mut i = 0;
        while i < segments.len() {
            let segment = segments[i];
            let last = i + 1 == segments.len();
            let (group, table, prefix, descriptor, owner) = match walk.scope.clone() {
                Scope::Value { .. } => {
                    return Err(format!(
                        "could not resolve property: {} of: {}",
                        segment, walk.display
                    ));
                }
                Scope::Entity {
                    group,
                    entity,
                    offset,
                } => {
                    let entity_type = self.entity(&entity)?;
                    let attribute = self
                        .metamodel
                        .entity_attribute(entity_type, segment)
                        .ok_or_else(|| {
                            format!("could not resolve property: {} of: {}", segment, entity_type.name)
                        })?;
                    let table = offset + table_index(self.metamodel, entity_type, attribute.declaring_type);
                    (
                        group,
                        table,
                        String::new(),
                        attribute.descriptor,
                        Some((entity_type, offset)),
                    )
                }
                Scope::Embeddable {
                    group,
                    table,
                    embeddable,
                    prefix,
                } => {
                    let descriptor = self
                        .metamodel
                        .embeddable_type(&embeddable)
                        .and_then(|e| e.declared_attribute(segment))
                        .ok_or_else(|| {
                            format!("could not resolve property: {} of: {}", segment, embeddable)
                        })?;
                    (group, table, prefix, descriptor, None)
                }
            };

            walk.display.push('.');
            walk.display.push_str(segment);
            walk.relative.push(segment);

            match descriptor {
                AttributeDescriptor::Basic(m) => {
                    walk.steps.push(PathStep {
                        name: segment.to_string(),
                        kind: StepKind::Basic,
                        type_name: m.value_type.to_string(),
                    });
                    walk.scope = Scope::Value {
                        column: ColumnRef::new(group, table, format!("{}{}", prefix, m.column())),
                        value_type: m.value_type,
                    };
                }
                AttributeDescriptor::Embedded(m) => {
                    walk.steps.push(PathStep {
                        name: segment.to_string(),
                        kind: StepKind::Embedded,
                        type_name: m.embeddable.clone(),
                    });
                    walk.scope = Scope::Embeddable {
                        group,
                        table,
                        embeddable: m.embeddable.clone(),
                        prefix: format!("{}{}", prefix, m.column_prefix),
                    };
                }
                AttributeDescriptor::ToOne(m) => {
                    let foreign_key: Vec<ColumnRef> = m
                        .join_columns
                        .iter()
                        .map(|c| ColumnRef::new(group, table, format!("{}{}", prefix, c)))
                        .collect();
                    let explicit_here = explicit.filter(|_| last);
                    let join_type = match explicit_here {
                        Some(e) => e.join_type,
                        None if m.optional => JoinType::Left,
                        None => JoinType::Inner,
                    };
                    let relative_path = walk.relative.join(".");
                    let request = JoinRequest {
                        parent: group,
                        relative_path: &relative_path,
                        display_path: &walk.display,
                        association: Association::ToOne {
                            mapping: m,
                            foreign_key: &foreign_key,
                        },
                        join_type,
                        origin: if explicit_here.is_some() {
                            JoinOrigin::Explicit
                        } else {
                            JoinOrigin::Implicit
                        },
                    };
                    let target = self.join(joins, request, explicit_here)?;
                    walk.steps.push(PathStep {
                        name: segment.to_string(),
                        kind: StepKind::ToOne,
                        type_name: m.target.clone(),
                    });
                    if explicit_here.is_some() {
                        walk.joined = Some((target, GroupView::Value));
                    }
                    self.enter_group(joins, &mut walk, target)?;
                }
                AttributeDescriptor::Collection(m) => {
                    let Some((owner_entity, offset)) = owner else {
                        return Err(format!(
                            "could not resolve property: {} of: {}",
                            segment, walk.display
                        ));
                    };
                    let owner_ids = identifier_columns(self.metamodel, owner_entity)
                        .map_err(|e| e.to_string())?
                        .into_iter()
                        .map(|c| ColumnRef::new(group, offset + c.table, c.column))
                        .collect();
                    let collection = CollectionRef {
                        owner: group,
                        owner_entity: owner_entity.name.clone(),
                        mapping: m.clone(),
                        owner_ids,
                        path: walk.display.clone(),
                    };
                    walk.steps.push(PathStep {
                        name: segment.to_string(),
                        kind: StepKind::ToMany,
                        type_name: element_type_name(&m.element),
                    });

                    let next = segments.get(i + 1).copied();
                    match next {
                        None if explicit.is_none() => {
                            return Ok(ResolvedPath {
                                steps: walk.steps,
                                target: PathTarget::Collection(collection),
                                joined: None,
                            });
                        }
                        None => {
                            self.join_elements(joins, &mut walk, &collection, explicit, GroupView::Value)?;
                        }
                        Some("elements") => {
                            i += 1;
                            let explicit_here = explicit.filter(|_| i + 1 == segments.len());
                            self.join_elements(joins, &mut walk, &collection, explicit_here, GroupView::Value)?;
                        }
                        Some("indices") => {
                            if clause != Clause::From {
                                return Err(format!(
                                    "illegal syntax near collection-valued path expression in {}: {}",
                                    clause, segment
                                ));
                            }
                            if m.index.is_none() {
                                return Err(format!("collection is not indexed: {}", walk.display));
                            }
                            i += 1;
                            let explicit_here = explicit.filter(|_| i + 1 == segments.len());
                            self.join_elements(joins, &mut walk, &collection, explicit_here, GroupView::Index)?;
                        }
                        Some("size") if i + 2 == segments.len() => {
                            walk.steps.push(PathStep {
                                name: "size".to_string(),
                                kind: StepKind::CollectionSize,
                                type_name: ValueType::Integer.to_string(),
                            });
                            return Ok(ResolvedPath {
                                steps: walk.steps,
                                target: PathTarget::Size(collection),
                                joined: None,
                            });
                        }
                        Some(_) => {
                            self.join_elements(joins, &mut walk, &collection, None, GroupView::Value)?;
                        }
                    }
                }
            }
            i += 1;
        }

        let target = self.target_of(walk.scope, walk.index_last)?;
        Ok(ResolvedPath {
            steps: walk.steps,
            target,
            joined: walk.joined,
        })
    }

    fn entity(&self, name: &str) -> Result<&'a EntityType, String> {
        self.metamodel
            .entity_type(name)
            .ok_or_else(|| format!("unknown entity: {}", name))
    }

    fn join(
        &self,
        joins: &mut JoinIndex,
        request: JoinRequest<'_>,
        explicit: Option<ExplicitJoin>,
    ) -> Result<GroupId, String> {
        let Some(explicit) = explicit else {
            return joins
                .resolve_or_create_join(self.metamodel, request)
                .map_err(|e| e.to_string());
        };
        let id = joins
            .create_join(self.metamodel, request)
            .map_err(|e| e.to_string())?;
        if explicit.reusable {
            joins.register_path(request.parent, request.relative_path, id);
        }
        Ok(id)
    }

    /// Join a collection's elements and continue from them.
    fn join_elements(
        &self,
        joins: &mut JoinIndex,
        walk: &mut Walk<'_>,
        collection: &CollectionRef,
        explicit: Option<ExplicitJoin>,
        view: GroupView,
    ) -> Result<(), String> {
        let relative_path = walk.relative.join(".");
        let request = JoinRequest {
            parent: collection.owner,
            relative_path: &relative_path,
            display_path: &collection.path,
            association: Association::Collection {
                mapping: &collection.mapping,
                owner_ids: &collection.owner_ids,
            },
            join_type: explicit.map(|e| e.join_type).unwrap_or(JoinType::Inner),
            origin: if explicit.is_some() {
                JoinOrigin::Explicit
            } else {
                JoinOrigin::Implicit
            },
        };
        let group = self.join(joins, request, explicit)?;
        if explicit.is_some() {
            walk.joined = Some((group, view));
        }

        match view {
            GroupView::Value => {
                walk.steps.push(PathStep {
                    name: "elements".to_string(),
                    kind: StepKind::CollectionElement,
                    type_name: element_type_name(&collection.mapping.element),
                });
                self.enter_group(joins, walk, group)
            }
            GroupView::Index => {
                let index = collection.mapping.index.as_ref().ok_or_else(|| {
                    format!("collection is not indexed: {}", collection.path)
                })?;
                walk.steps.push(PathStep {
                    name: "indices".to_string(),
                    kind: StepKind::CollectionIndex,
                    type_name: index.value_type.to_string(),
                });
                walk.scope = Scope::Value {
                    column: ColumnRef::new(group, 0, index.column.clone()),
                    value_type: index.value_type,
                };
                walk.relative.clear();
                walk.index_last = true;
                Ok(())
            }
        }
    }

    fn enter_group(&self, joins: &JoinIndex, walk: &mut Walk<'_>, group: GroupId) -> Result<(), String> {
        walk.scope = Scope::of_group(joins, group)
            .ok_or_else(|| format!("unknown table group for {}", walk.display))?;
        walk.relative.clear();
        walk.index_last = false;
        Ok(())
    }

    fn target_of(&self, scope: Scope, index: bool) -> Result<PathTarget, String> {
        Ok(match scope {
            Scope::Entity { group, entity, .. } => PathTarget::Entity { group, entity },
            Scope::Embeddable {
                group,
                table,
                embeddable,
                prefix,
            } => {
                let columns = embeddable_columns(self.metamodel, &embeddable, &prefix)
                    .map_err(|e| e.to_string())?
                    .into_iter()
                    .map(|(column, _)| ColumnRef::new(group, table, column))
                    .collect();
                PathTarget::Embeddable { columns, embeddable }
            }
            Scope::Value { column, value_type } if index => PathTarget::Index { column, value_type },
            Scope::Value { column, value_type } => PathTarget::Basic { column, value_type },
        })
    }
}

fn element_type_name(element: &CollectionElement) -> String {
    match element {
        CollectionElement::Entity { target, .. } => target.clone(),
        CollectionElement::Basic { value_type, .. } => value_type.to_string(),
        CollectionElement::Embeddable { embeddable, .. } => embeddable.clone(),
    }
}
