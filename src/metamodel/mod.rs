//! Domain metamodel: the read-only description of mapped entities.
//!
//! The translator only ever asks the metamodel questions; it never changes
//! it. [`Metamodel`] is the seam: anything that can answer "what is entity
//! `X`" and "what is attribute `a` of `X`" can drive a translation.
//! [`StaticMetamodel`] is the descriptor-table implementation, loadable
//! from TOML or JSON:
//!
//! ```toml
//! [[entity]]
//! name = "Person"
//! table = "person"
//!
//! [[entity.attribute]]
//! kind = "basic"
//! name = "id"
//! type = "long"
//!
//! [[entity.attribute]]
//! kind = "to_one"
//! name = "employer"
//! target = "Company"
//! join_columns = ["employer_id"]
//! ```
//!
//! # Example
//!
//! ```
//! use hqlt::metamodel::{AttributeDescriptor, EntityType, Metamodel, StaticMetamodel, ValueType};
//!
//! let metamodel = StaticMetamodel::new().with_entity(
//!     EntityType::new("Person", "person")
//!         .with_attribute(AttributeDescriptor::basic("id", "id", ValueType::Long))
//!         .with_attribute(AttributeDescriptor::basic("name", "name", ValueType::String)),
//! );
//! let person = metamodel.entity_type("Person").unwrap();
//! assert!(metamodel.entity_attribute(person, "name").is_some());
//! ```

mod descriptor;
pub mod table;
mod types;

pub use descriptor::*;
pub use types::ValueType;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating a descriptor table.
#[derive(Debug, Error)]
pub enum MetamodelError {
    #[error("failed to read metamodel file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse metamodel TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse metamodel JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate type name: {0}")]
    DuplicateType(String),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("invalid metamodel: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Either kind of type an attribute can be declared on.
#[derive(Debug, Clone, Copy)]
pub enum ManagedType<'a> {
    Entity(&'a EntityType),
    Embeddable(&'a EmbeddableType),
}

impl<'a> ManagedType<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            ManagedType::Entity(e) => &e.name,
            ManagedType::Embeddable(e) => &e.name,
        }
    }
}

/// An attribute together with the type that declares it.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRef<'a> {
    pub descriptor: &'a AttributeDescriptor,
    /// Name of the declaring entity or embeddable; differs from the queried
    /// type for inherited attributes.
    pub declaring_type: &'a str,
}

/// Read-only access to mapped types.
///
/// Implementors provide the three lookups; hierarchy navigation and
/// attribute resolution have default implementations built on them.
pub trait Metamodel: Send + Sync {
    /// Look up an entity by its full or simple name.
    fn entity_type(&self, name: &str) -> Option<&EntityType>;

    fn embeddable_type(&self, name: &str) -> Option<&EmbeddableType>;

    /// Every entity name, in declaration order.
    fn entity_names(&self) -> Vec<&str>;

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// The inheritance chain of `entity`, root first, `entity` last.
    fn hierarchy<'a>(&'a self, entity: &'a EntityType) -> Vec<&'a EntityType> {
        let limit = self.entity_names().len() + 1;
        let mut chain = vec![entity];
        let mut current = entity;
        while let Some(parent) = current.super_type.as_deref().and_then(|s| self.entity_type(s)) {
            if chain.len() > limit || chain.iter().any(|e| e.name == parent.name) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn root_entity<'a>(&'a self, entity: &'a EntityType) -> &'a EntityType {
        self.hierarchy(entity).first().copied().unwrap_or(entity)
    }

    /// Every entity that inherits from `entity`, directly or not.
    fn subtypes<'a>(&'a self, entity: &'a EntityType) -> Vec<&'a EntityType> {
        self.entity_names()
            .into_iter()
            .filter_map(|name| self.entity_type(name))
            .filter(|candidate| {
                candidate.name != entity.name
                    && self
                        .hierarchy(candidate)
                        .iter()
                        .any(|ancestor| ancestor.name == entity.name)
            })
            .collect()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Resolve `name` on an entity, searching super types from nearest to
    /// root.
    fn entity_attribute<'a>(&'a self, entity: &'a EntityType, name: &str) -> Option<AttributeRef<'a>> {
        self.hierarchy(entity).into_iter().rev().find_map(|ty| {
            ty.declared_attribute(name).map(|descriptor| AttributeRef {
                descriptor,
                declaring_type: &ty.name,
            })
        })
    }

    fn attribute<'a>(&'a self, owner: ManagedType<'a>, name: &str) -> Option<AttributeRef<'a>> {
        match owner {
            ManagedType::Entity(entity) => self.entity_attribute(entity, name),
            ManagedType::Embeddable(embeddable) => {
                embeddable.declared_attribute(name).map(|descriptor| AttributeRef {
                    descriptor,
                    declaring_type: &embeddable.name,
                })
            }
        }
    }

    /// The identifier attribute, declared on the hierarchy root.
    fn identifier<'a>(&'a self, entity: &'a EntityType) -> Option<AttributeRef<'a>> {
        let root = self.root_entity(entity);
        self.entity_attribute(root, &root.id)
    }

    /// Discriminator column of the hierarchy, if it has one.
    fn discriminator_column<'a>(&'a self, entity: &'a EntityType) -> Option<&'a str> {
        self.root_entity(entity).discriminator_column.as_deref()
    }

    fn inheritance<'a>(&'a self, entity: &'a EntityType) -> Option<InheritanceStrategy> {
        self.root_entity(entity).inheritance
    }
}

// ============================================================================
// Static descriptor table
// ============================================================================

/// On-disk layout of a descriptor table.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DescriptorTable {
    #[serde(default, rename = "entity")]
    entities: Vec<EntityType>,
    #[serde(default, rename = "embeddable")]
    embeddables: Vec<EmbeddableType>,
}

/// A metamodel backed by an in-memory descriptor table.
#[derive(Debug, Clone, Default)]
pub struct StaticMetamodel {
    entities: Vec<EntityType>,
    embeddables: Vec<EmbeddableType>,
    /// Full and unambiguous simple names to entity index.
    entity_index: HashMap<String, usize>,
}

impl StaticMetamodel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. A later entity with the same name replaces nothing:
    /// use [`StaticMetamodel::validate`] to catch duplicates.
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self.reindex();
        self
    }

    pub fn with_embeddable(mut self, embeddable: EmbeddableType) -> Self {
        self.embeddables.push(embeddable);
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, MetamodelError> {
        let table: DescriptorTable = toml::from_str(content)?;
        Self::from_table(table)
    }

    pub fn from_json_str(content: &str) -> Result<Self, MetamodelError> {
        let table: DescriptorTable = serde_json::from_str(content)?;
        Self::from_table(table)
    }

    /// Load a descriptor table; `.json` files are read as JSON, anything
    /// else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, MetamodelError> {
        let content = std::fs::read_to_string(path).map_err(|source| MetamodelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading metamodel");
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    fn from_table(table: DescriptorTable) -> Result<Self, MetamodelError> {
        let mut metamodel = Self {
            entities: table.entities,
            embeddables: table.embeddables,
            entity_index: HashMap::new(),
        };
        metamodel.reindex();
        metamodel.validate()?;
        Ok(metamodel)
    }

    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    pub fn embeddables(&self) -> &[EmbeddableType] {
        &self.embeddables
    }

    fn reindex(&mut self) {
        let mut index = HashMap::new();
        let mut simple_counts: HashMap<&str, usize> = HashMap::new();
        for entity in &self.entities {
            *simple_counts.entry(entity.simple_name()).or_default() += 1;
        }
        for (i, entity) in self.entities.iter().enumerate() {
            index.entry(entity.name.clone()).or_insert(i);
            if simple_counts.get(entity.simple_name()) == Some(&1) {
                index.entry(entity.simple_name().to_string()).or_insert(i);
            }
        }
        self.entity_index = index;
    }

    /// Check cross references between descriptors.
    pub fn validate(&self) -> Result<(), MetamodelError> {
        let mut problems = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for name in self
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.embeddables.iter().map(|e| e.name.as_str()))
        {
            if !seen.insert(name) {
                return Err(MetamodelError::DuplicateType(name.to_string()));
            }
        }

        for entity in &self.entities {
            let root = self.root_entity(entity);
            if let Some(parent) = &entity.super_type {
                if self.entity_type(parent).is_none() {
                    problems.push(format!("{}: unknown super type {}", entity.name, parent));
                }
                if entity.inheritance.is_some() {
                    problems.push(format!(
                        "{}: inheritance strategy must be declared on the hierarchy root",
                        entity.name
                    ));
                }
                if root.inheritance == Some(InheritanceStrategy::Joined) && entity.table.is_none() {
                    problems.push(format!("{}: joined subclass needs a table", entity.name));
                }
            } else {
                if entity.table.is_none() {
                    problems.push(format!("{}: root entity needs a table", entity.name));
                }
                match self.identifier(entity) {
                    Some(id) if matches!(id.descriptor.kind(), AttributeKind::Basic | AttributeKind::Embedded) => {}
                    Some(_) => problems.push(format!(
                        "{}: identifier {} must be basic or embedded",
                        entity.name, entity.id
                    )),
                    None => problems.push(format!(
                        "{}: identifier attribute {} not found",
                        entity.name, entity.id
                    )),
                }
            }
            for attribute in &entity.attributes {
                self.validate_attribute(&entity.name, attribute, true, &mut problems);
            }
        }

        for embeddable in &self.embeddables {
            for attribute in &embeddable.attributes {
                self.validate_attribute(&embeddable.name, attribute, false, &mut problems);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MetamodelError::Invalid(problems))
        }
    }

    fn validate_attribute(
        &self,
        owner: &str,
        attribute: &AttributeDescriptor,
        on_entity: bool,
        problems: &mut Vec<String>,
    ) {
        let name = attribute.name();
        match attribute {
            AttributeDescriptor::Basic(_) => {}
            AttributeDescriptor::Embedded(m) => {
                if self.embeddable_type(&m.embeddable).is_none() {
                    problems.push(format!("{}.{}: unknown embeddable {}", owner, name, m.embeddable));
                }
            }
            AttributeDescriptor::ToOne(m) => match self.entity_type(&m.target) {
                None => problems.push(format!("{}.{}: unknown target {}", owner, name, m.target)),
                Some(target) => {
                    let expected = table::identifier_columns(self, target).map(|c| c.len()).unwrap_or(0);
                    if expected != m.join_columns.len() {
                        problems.push(format!(
                            "{}.{}: expected {} join column(s), found {}",
                            owner,
                            name,
                            expected,
                            m.join_columns.len()
                        ));
                    }
                }
            },
            AttributeDescriptor::Collection(m) => {
                if !on_entity {
                    problems.push(format!(
                        "{}.{}: collections inside embeddables are not supported",
                        owner, name
                    ));
                }
                if m.key_columns.is_empty() {
                    problems.push(format!("{}.{}: collection needs key columns", owner, name));
                }
                match &m.element {
                    CollectionElement::Entity { target, columns } => {
                        if self.entity_type(target).is_none() {
                            problems.push(format!("{}.{}: unknown target {}", owner, name, target));
                        }
                        if m.table.is_some() && columns.is_empty() {
                            problems.push(format!(
                                "{}.{}: collection table needs element columns",
                                owner, name
                            ));
                        }
                    }
                    CollectionElement::Basic { .. } | CollectionElement::Embeddable { .. } => {
                        if m.table.is_none() {
                            problems.push(format!("{}.{}: element collection needs a table", owner, name));
                        }
                        if let CollectionElement::Embeddable { embeddable, .. } = &m.element {
                            if self.embeddable_type(embeddable).is_none() {
                                problems.push(format!(
                                    "{}.{}: unknown embeddable {}",
                                    owner, name, embeddable
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Metamodel for StaticMetamodel {
    fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_index.get(name).and_then(|&i| self.entities.get(i))
    }

    fn embeddable_type(&self, name: &str) -> Option<&EmbeddableType> {
        self.embeddables
            .iter()
            .find(|e| e.name == name || e.name.rsplit('.').next() == Some(name))
    }

    fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }
}
