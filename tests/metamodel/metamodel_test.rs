#[path = "../support/mod.rs"]
mod support;

use std::path::Path;

use hqlt::metamodel::table::{entity_columns, entity_tables, subclass_restriction};
use hqlt::metamodel::{
    AttributeDescriptor, AttributeKind, EmbeddableType, EntityType, InheritanceStrategy, ManagedType, Metamodel,
    MetamodelError, StaticMetamodel, ValueType,
};
use hqlt::translator::{translate, QuerySource};
use hqlt::Dialect;
use support::compact;

#[test]
fn test_fixture_loads_from_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/model.toml");
    let metamodel = StaticMetamodel::from_file(&path).unwrap();

    assert_eq!(metamodel.entities().len(), 12);
    assert_eq!(metamodel.embeddables().len(), 2);
    assert!(metamodel.validate().is_ok());
}

#[test]
fn test_missing_file_is_io_error() {
    let result = StaticMetamodel::from_file(Path::new("does/not/exist.toml"));
    assert!(matches!(result, Err(MetamodelError::Io { .. })));
}

#[test]
fn test_attribute_kinds_and_targets() {
    let metamodel = support::metamodel();
    let person = metamodel.entity_type("Person").unwrap();

    let kinds: Vec<_> = ["id", "address", "employer", "nicknames", "pets"]
        .iter()
        .map(|name| metamodel.entity_attribute(person, name).unwrap().descriptor.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            AttributeKind::Basic,
            AttributeKind::Embedded,
            AttributeKind::ToOne,
            AttributeKind::Collection,
            AttributeKind::Collection,
        ]
    );

    let pets = metamodel.entity_attribute(person, "pets").unwrap();
    assert_eq!(pets.descriptor.target_type(), Some("Pet"));

    let address = metamodel.embeddable_type("Address").unwrap();
    let city = metamodel.attribute(ManagedType::Embeddable(address), "city").unwrap();
    assert_eq!(city.declaring_type, "Address");
}

#[test]
fn test_joined_hierarchy_tables() {
    let metamodel = support::metamodel();
    let employee = metamodel.entity_type("Employee").unwrap();

    assert_eq!(metamodel.inheritance(employee), Some(InheritanceStrategy::Joined));
    let tables: Vec<_> = entity_tables(&metamodel, employee)
        .unwrap()
        .into_iter()
        .map(|t| (t.name, t.key_columns))
        .collect();
    assert_eq!(
        tables,
        vec![
            ("person".to_string(), vec!["id".to_string()]),
            ("employee".to_string(), vec!["person_id".to_string()]),
        ]
    );
}

#[test]
fn test_single_table_hierarchy_columns() {
    let metamodel = support::metamodel();
    let dog = metamodel.entity_type("Dog").unwrap();

    let columns: Vec<_> = entity_columns(&metamodel, dog)
        .unwrap()
        .into_iter()
        .map(|c| c.column)
        .collect();
    assert_eq!(columns, vec!["id", "kind", "name", "owner_id", "breed"]);
    assert_eq!(
        subclass_restriction(&metamodel, dog),
        Some(("kind".to_string(), vec!["DOG".to_string()]))
    );
}

#[test]
fn test_composite_identifier_columns() {
    let metamodel = support::metamodel();
    let shipment = metamodel.entity_type("Shipment").unwrap();
    let columns: Vec<_> = entity_columns(&metamodel, shipment)
        .unwrap()
        .into_iter()
        .map(|c| (c.column, c.value_type))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("order_no".to_string(), ValueType::Long),
            ("seq".to_string(), ValueType::Integer),
            ("carrier".to_string(), ValueType::String),
        ]
    );
}

#[test]
fn test_json_descriptor_table() {
    let metamodel = StaticMetamodel::from_json_str(
        r#"{
            "embeddable": [
                {"name": "Money", "attribute": [
                    {"kind": "basic", "name": "amount", "type": "decimal"},
                    {"kind": "basic", "name": "currency"}
                ]}
            ],
            "entity": [
                {"name": "Invoice", "table": "invoice", "attribute": [
                    {"kind": "basic", "name": "id", "type": "long"},
                    {"kind": "embedded", "name": "total", "embeddable": "Money", "column_prefix": "total_"}
                ]}
            ]
        }"#,
    )
    .unwrap();

    let result = translate(
        &QuerySource::new("select i.total.amount from Invoice i"),
        &metamodel,
        compact(Dialect::Postgres),
    )
    .unwrap();
    assert_eq!(result.sql, "SELECT i1_0.total_amount AS col_0_0_ FROM invoice AS i1_0");
}

#[test]
fn test_builder_metamodel_drives_translation() {
    let metamodel = StaticMetamodel::new()
        .with_embeddable(
            EmbeddableType::new("Period")
                .with_attribute(AttributeDescriptor::basic("start", "starts_on", ValueType::Date))
                .with_attribute(AttributeDescriptor::basic("end", "ends_on", ValueType::Date)),
        )
        .with_entity(
            EntityType::new("Contract", "contract")
                .with_attribute(AttributeDescriptor::basic("id", "id", ValueType::Long))
                .with_attribute(AttributeDescriptor::embedded("term", "Period"))
                .with_attribute(AttributeDescriptor::to_one("party", "Party", &["party_id"], true)),
        )
        .with_entity(
            EntityType::new("Party", "party")
                .with_attribute(AttributeDescriptor::basic("id", "id", ValueType::Long))
                .with_attribute(AttributeDescriptor::basic("name", "name", ValueType::String)),
        );
    assert!(metamodel.validate().is_ok());

    let result = translate(
        &QuerySource::new("select c.term.start from Contract c where c.party.name = :n"),
        &metamodel,
        compact(Dialect::Postgres),
    )
    .unwrap();
    insta::assert_snapshot!(result.sql, @"SELECT c1_0.starts_on AS col_0_0_ FROM contract AS c1_0 LEFT JOIN party AS p1_0 ON c1_0.party_id = p1_0.id WHERE p1_0.name = ?");
}
