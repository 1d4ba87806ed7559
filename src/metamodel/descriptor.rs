//! Descriptor types for entities, embeddables and their attributes.
//!
//! These are plain data: they deserialize from the TOML/JSON descriptor
//! table and are never mutated after loading.

use serde::{Deserialize, Serialize};

use super::types::ValueType;

fn default_id() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Entities
// ============================================================================

/// A mapped entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Entity name, possibly package-qualified (`com.acme.Person`).
    pub name: String,
    /// Table name. Single-table subclasses leave this empty.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Name of the identifier attribute (basic or embedded).
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    pub super_type: Option<String>,
    /// Declared on the hierarchy root only.
    #[serde(default)]
    pub inheritance: Option<InheritanceStrategy>,
    /// Declared on the hierarchy root only.
    #[serde(default)]
    pub discriminator_column: Option<String>,
    /// Defaults to the entity name.
    #[serde(default)]
    pub discriminator_value: Option<String>,
    /// Primary key columns of a joined subclass table; default is the
    /// root's identifier columns.
    #[serde(default)]
    pub key_columns: Vec<String>,
    /// Filters this entity participates in.
    #[serde(default, rename = "filter")]
    pub filters: Vec<FilterCondition>,
}

impl EntityType {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.into(),
            table: Some(table.into()),
            schema: None,
            id: default_id(),
            attributes: vec![],
            super_type: None,
            inheritance: None,
            discriminator_column: None,
            discriminator_value: None,
            key_columns: vec![],
            filters: vec![],
        }
    }

    /// A subclass mapped to its parent's table.
    pub fn subclass(name: &str, super_type: &str) -> Self {
        let mut entity = Self::new(name, "");
        entity.table = None;
        entity.super_type = Some(super_type.into());
        entity
    }

    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_inheritance(mut self, strategy: InheritanceStrategy) -> Self {
        self.inheritance = Some(strategy);
        self
    }

    pub fn with_discriminator(mut self, column: &str) -> Self {
        self.discriminator_column = Some(column.into());
        self
    }

    pub fn with_discriminator_value(mut self, value: &str) -> Self {
        self.discriminator_value = Some(value.into());
        self
    }

    pub fn with_filter(mut self, name: &str, condition: Option<&str>) -> Self {
        self.filters.push(FilterCondition {
            name: name.into(),
            condition: condition.map(str::to_string),
        });
        self
    }

    /// The name without its package qualifier.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Attribute declared directly on this type.
    pub fn declared_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Value written to the discriminator column for rows of this type.
    pub fn discriminator_value(&self) -> &str {
        self.discriminator_value.as_deref().unwrap_or(&self.name)
    }
}

/// Last dot-separated segment of a type name.
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceStrategy {
    SingleTable,
    Joined,
}

/// An entity's participation in a named filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub name: String,
    /// Overrides the filter's default condition for this entity.
    #[serde(default)]
    pub condition: Option<String>,
}

// ============================================================================
// Embeddables
// ============================================================================

/// A value type embedded into its owner's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddableType {
    pub name: String,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeDescriptor>,
}

impl EmbeddableType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            attributes: vec![],
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn declared_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name() == name)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Coarse classification of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Basic,
    Embedded,
    ToOne,
    Collection,
}

/// One mapped attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeDescriptor {
    Basic(BasicMapping),
    Embedded(EmbeddedMapping),
    ToOne(ToOneMapping),
    Collection(CollectionMapping),
}

impl AttributeDescriptor {
    pub fn basic(name: &str, column: &str, value_type: ValueType) -> Self {
        AttributeDescriptor::Basic(BasicMapping {
            name: name.into(),
            column: Some(column.into()),
            value_type,
        })
    }

    pub fn embedded(name: &str, embeddable: &str) -> Self {
        AttributeDescriptor::Embedded(EmbeddedMapping {
            name: name.into(),
            embeddable: embeddable.into(),
            column_prefix: String::new(),
        })
    }

    pub fn to_one(name: &str, target: &str, join_columns: &[&str], optional: bool) -> Self {
        AttributeDescriptor::ToOne(ToOneMapping {
            name: name.into(),
            target: target.into(),
            join_columns: join_columns.iter().map(|c| c.to_string()).collect(),
            optional,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            AttributeDescriptor::Basic(m) => &m.name,
            AttributeDescriptor::Embedded(m) => &m.name,
            AttributeDescriptor::ToOne(m) => &m.name,
            AttributeDescriptor::Collection(m) => &m.name,
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeDescriptor::Basic(_) => AttributeKind::Basic,
            AttributeDescriptor::Embedded(_) => AttributeKind::Embedded,
            AttributeDescriptor::ToOne(_) => AttributeKind::ToOne,
            AttributeDescriptor::Collection(_) => AttributeKind::Collection,
        }
    }

    /// Name of the entity or embeddable this attribute leads to.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            AttributeDescriptor::Basic(_) => None,
            AttributeDescriptor::Embedded(m) => Some(&m.embeddable),
            AttributeDescriptor::ToOne(m) => Some(&m.target),
            AttributeDescriptor::Collection(m) => match &m.element {
                CollectionElement::Entity { target, .. } => Some(target),
                CollectionElement::Embeddable { embeddable, .. } => Some(embeddable),
                CollectionElement::Basic { .. } => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicMapping {
    pub name: String,
    /// Defaults to the attribute name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
}

impl BasicMapping {
    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMapping {
    pub name: String,
    pub embeddable: String,
    /// Prepended to every column of the embeddable.
    #[serde(default)]
    pub column_prefix: String,
}

/// A many-to-one or owning one-to-one association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToOneMapping {
    pub name: String,
    pub target: String,
    /// Foreign key columns on the owner's table, in target identifier order.
    pub join_columns: Vec<String>,
    #[serde(default = "default_true")]
    pub optional: bool,
}

/// A plural attribute.
///
/// Without a `table`, the element must be an entity and `key_columns` live
/// on the element entity's table (one-to-many). With a `table`, the key
/// columns live on that collection table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMapping {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Columns referencing the owner's identifier.
    pub key_columns: Vec<String>,
    pub element: CollectionElement,
    #[serde(default)]
    pub index: Option<IndexMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionElement {
    /// Entity elements. `columns` reference the target identifier from the
    /// collection table and are empty for one-to-many mappings.
    Entity {
        target: String,
        #[serde(default)]
        columns: Vec<String>,
    },
    Basic {
        column: String,
        #[serde(default, rename = "type")]
        value_type: ValueType,
    },
    Embeddable {
        embeddable: String,
        #[serde(default)]
        column_prefix: String,
    },
}

/// The column holding a list position or map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    pub column: String,
    #[serde(default = "default_index_type", rename = "type")]
    pub value_type: ValueType,
}

fn default_index_type() -> ValueType {
    ValueType::Integer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_from_toml() {
        let attr: AttributeDescriptor = toml::from_str(
            r#"
            kind = "to_one"
            name = "customer"
            target = "Customer"
            join_columns = ["customer_id"]
            "#,
        )
        .unwrap();
        assert_eq!(attr.name(), "customer");
        assert_eq!(attr.kind(), AttributeKind::ToOne);
        assert_eq!(attr.target_type(), Some("Customer"));
        match attr {
            AttributeDescriptor::ToOne(m) => assert!(m.optional),
            other => panic!("expected to-one, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_from_toml() {
        let attr: AttributeDescriptor = toml::from_str(
            r#"
            kind = "collection"
            name = "nicknames"
            table = "person_nickname"
            key_columns = ["person_id"]
            element = { kind = "basic", column = "nickname" }
            index = { column = "position" }
            "#,
        )
        .unwrap();
        let AttributeDescriptor::Collection(m) = attr else {
            panic!("expected collection");
        };
        assert_eq!(m.table.as_deref(), Some("person_nickname"));
        assert_eq!(
            m.element,
            CollectionElement::Basic {
                column: "nickname".into(),
                value_type: ValueType::String
            }
        );
        assert_eq!(m.index.map(|i| i.value_type), Some(ValueType::Integer));
    }

    #[test]
    fn test_basic_column_defaults_to_name() {
        let attr: BasicMapping = toml::from_str(r#"name = "age""#).unwrap();
        assert_eq!(attr.column(), "age");
        assert_eq!(attr.value_type, ValueType::String);
    }

    #[test]
    fn test_entity_defaults() {
        let entity = EntityType::new("com.acme.Person", "person");
        assert_eq!(entity.simple_name(), "Person");
        assert_eq!(entity.id, "id");
        assert_eq!(entity.discriminator_value(), "com.acme.Person");
    }
}
