//! Table and column layout derived from entity descriptors.
//!
//! An entity occupies one table per joined hierarchy level, root first.
//! Columns are addressed by the index of the table they live on within
//! that list.

use super::{
    AttributeDescriptor, AttributeRef, EntityType, InheritanceStrategy, Metamodel, MetamodelError,
    ValueType,
};

/// One table of an entity's hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTable {
    pub name: String,
    pub schema: Option<String>,
    /// The hierarchy level that owns this table.
    pub declaring_type: String,
    /// Primary key columns; for subclass tables these reference the root
    /// table's identifier columns.
    pub key_columns: Vec<String>,
}

/// A column of an entity, with the index of the table it lives on.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedColumn {
    pub table: usize,
    pub column: String,
    pub value_type: ValueType,
}

/// Tables of `entity`, root table first.
pub fn entity_tables(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
) -> Result<Vec<EntityTable>, MetamodelError> {
    let hierarchy = metamodel.hierarchy(entity);
    let root = hierarchy.first().copied().unwrap_or(entity);
    let joined = root.inheritance == Some(InheritanceStrategy::Joined);
    let root_keys: Vec<String> = identifier_columns(metamodel, root)?
        .into_iter()
        .map(|c| c.column)
        .collect();

    let mut tables = Vec::new();
    for (level, ty) in hierarchy.iter().enumerate() {
        let Some(name) = &ty.table else { continue };
        if level > 0 && !joined {
            continue;
        }
        let key_columns = if level == 0 || ty.key_columns.is_empty() {
            root_keys.clone()
        } else {
            ty.key_columns.clone()
        };
        tables.push(EntityTable {
            name: name.clone(),
            schema: ty.schema.clone().or_else(|| root.schema.clone()),
            declaring_type: ty.name.clone(),
            key_columns,
        });
    }

    if tables.is_empty() {
        return Err(MetamodelError::Invalid(vec![format!(
            "{}: no table mapped in hierarchy",
            entity.name
        )]));
    }
    Ok(tables)
}

/// Index of the table holding attributes declared on `declaring_type`.
pub fn table_index(metamodel: &dyn Metamodel, entity: &EntityType, declaring_type: &str) -> usize {
    let hierarchy = metamodel.hierarchy(entity);
    let Some(level) = hierarchy.iter().position(|e| e.name == declaring_type) else {
        return 0;
    };
    let Ok(tables) = entity_tables(metamodel, entity) else {
        return 0;
    };
    tables
        .iter()
        .enumerate()
        .filter(|(_, table)| {
            hierarchy
                .iter()
                .position(|e| e.name == table.declaring_type)
                .is_some_and(|l| l <= level)
        })
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0)
}

/// Identifier columns, always on the root table.
pub fn identifier_columns(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
) -> Result<Vec<MappedColumn>, MetamodelError> {
    let root = metamodel.root_entity(entity);
    let id = metamodel
        .identifier(root)
        .ok_or_else(|| MetamodelError::UnknownType(format!("{}.{}", root.name, root.id)))?;
    Ok(descriptor_columns(metamodel, id.descriptor, "")?
        .into_iter()
        .map(|(column, value_type)| MappedColumn {
            table: 0,
            column,
            value_type,
        })
        .collect())
}

/// Columns of one attribute of `entity`; empty for collections.
pub fn attribute_columns(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
    attribute: AttributeRef<'_>,
) -> Result<Vec<MappedColumn>, MetamodelError> {
    let table = table_index(metamodel, entity, attribute.declaring_type);
    Ok(descriptor_columns(metamodel, attribute.descriptor, "")?
        .into_iter()
        .map(|(column, value_type)| MappedColumn {
            table,
            column,
            value_type,
        })
        .collect())
}

/// Columns an attribute maps to, with `prefix` prepended.
///
/// Embedded attributes flatten recursively; to-one associations yield
/// their foreign key columns typed like the target identifier.
pub fn descriptor_columns(
    metamodel: &dyn Metamodel,
    descriptor: &AttributeDescriptor,
    prefix: &str,
) -> Result<Vec<(String, ValueType)>, MetamodelError> {
    match descriptor {
        AttributeDescriptor::Basic(m) => Ok(vec![(format!("{}{}", prefix, m.column()), m.value_type)]),
        AttributeDescriptor::Embedded(m) => {
            let nested_prefix = format!("{}{}", prefix, m.column_prefix);
            embeddable_columns(metamodel, &m.embeddable, &nested_prefix)
        }
        AttributeDescriptor::ToOne(m) => {
            let target = metamodel
                .entity_type(&m.target)
                .ok_or_else(|| MetamodelError::UnknownType(m.target.clone()))?;
            let target_ids = identifier_columns(metamodel, target)?;
            Ok(m.join_columns
                .iter()
                .zip(target_ids)
                .map(|(column, id)| (format!("{}{}", prefix, column), id.value_type))
                .collect())
        }
        AttributeDescriptor::Collection(_) => Ok(vec![]),
    }
}

/// Every column of an embeddable, in declaration order.
pub fn embeddable_columns(
    metamodel: &dyn Metamodel,
    embeddable: &str,
    prefix: &str,
) -> Result<Vec<(String, ValueType)>, MetamodelError> {
    let ty = metamodel
        .embeddable_type(embeddable)
        .ok_or_else(|| MetamodelError::UnknownType(embeddable.to_string()))?;
    let mut columns = Vec::new();
    for attribute in &ty.attributes {
        columns.extend(descriptor_columns(metamodel, attribute, prefix)?);
    }
    Ok(columns)
}

/// Every column selected to rebuild an instance of `entity`: identifier
/// columns, the discriminator, then each level's attributes root first.
pub fn entity_columns(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
) -> Result<Vec<MappedColumn>, MetamodelError> {
    let root = metamodel.root_entity(entity);
    let mut columns = identifier_columns(metamodel, entity)?;

    if let Some(discriminator) = &root.discriminator_column {
        columns.push(MappedColumn {
            table: 0,
            column: discriminator.clone(),
            value_type: ValueType::String,
        });
    }

    for ty in metamodel.hierarchy(entity) {
        for descriptor in &ty.attributes {
            if ty.name == root.name && descriptor.name() == root.id {
                continue;
            }
            columns.extend(attribute_columns(
                metamodel,
                entity,
                AttributeRef {
                    descriptor,
                    declaring_type: &ty.name,
                },
            )?);
        }
    }
    Ok(columns)
}

/// Discriminator values selecting `entity` and all of its subtypes.
pub fn discriminator_values(metamodel: &dyn Metamodel, entity: &EntityType) -> Vec<String> {
    std::iter::once(entity)
        .chain(metamodel.subtypes(entity))
        .map(|e| e.discriminator_value().to_string())
        .collect()
}

/// The discriminator restriction a single-table subclass needs, as
/// (column, accepted values).
pub fn subclass_restriction(
    metamodel: &dyn Metamodel,
    entity: &EntityType,
) -> Option<(String, Vec<String>)> {
    let root = metamodel.root_entity(entity);
    if root.name == entity.name || root.inheritance != Some(InheritanceStrategy::SingleTable) {
        return None;
    }
    let column = root.discriminator_column.clone()?;
    Some((column, discriminator_values(metamodel, entity)))
}
