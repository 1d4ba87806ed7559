#[path = "../support/mod.rs"]
mod support;

use hqlt::metamodel::ValueType;
use hqlt::semantic::{ParameterDeclaration, ParameterKey, ParameterSource};
use hqlt::translator::{translate, QuerySource};
use hqlt::{Dialect, TranslationError};
use support::{assert_valid_sql, compact, metamodel, try_translate};

fn named(name: &str) -> ParameterKey {
    ParameterKey::Named(name.into())
}

#[test]
fn test_repeated_named_parameter_shares_slot() {
    let result = try_translate(
        "select p.name from Person p where p.name = :n or p.address.city = :n or p.age > :age",
        Dialect::Postgres,
    )
    .unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE p1_0.name = ? OR p1_0.city = ? OR p1_0.age > ?");
    assert_eq!(result.parameters.len(), 2);

    let n = result.binding(&named("n")).unwrap();
    assert_eq!(n.slot, 0);
    assert_eq!(n.positions, vec![1, 2]);
    assert_eq!(n.value_type, Some(ValueType::String));

    let age = result.binding(&named("age")).unwrap();
    assert_eq!(age.positions, vec![3]);
    assert_eq!(age.value_type, Some(ValueType::Integer));
}

#[test]
fn test_parameter_compared_to_composite_identifier_spans_every_column() {
    let result = try_translate("select s.carrier from Shipment s where s.id = :k", Dialect::Postgres).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT s1_0.carrier AS col_0_0_ FROM shipment AS s1_0 WHERE (s1_0.order_no, s1_0.seq) = (?, ?)");
    assert_eq!(result.binding(&named("k")).unwrap().positions, vec![1, 2]);
    assert_valid_sql(&result.sql);

    let reversed = try_translate("select s.carrier from Shipment s where :k = s.id and s.carrier = :c", Dialect::Postgres)
        .unwrap();
    insta::assert_snapshot!(reversed.sql, @"SELECT s1_0.carrier AS col_0_0_ FROM shipment AS s1_0 WHERE (?, ?) = (s1_0.order_no, s1_0.seq) AND s1_0.carrier = ?");
    assert_eq!(reversed.binding(&named("k")).unwrap().positions, vec![1, 2]);
    assert_eq!(reversed.binding(&named("c")).unwrap().positions, vec![3]);
}

#[test]
fn test_row_limit_parameters_numbered_after_where() {
    let query = "select p.name from Person p where p.age > :min order by p.name limit :max offset :skip";

    let postgres = try_translate(query, Dialect::Postgres).unwrap();
    insta::assert_snapshot!(postgres.sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE p1_0.age > ? ORDER BY p1_0.name LIMIT ? OFFSET ?");
    assert_eq!(postgres.binding(&named("min")).unwrap().positions, vec![1]);
    assert_eq!(postgres.binding(&named("max")).unwrap().positions, vec![2]);
    assert_eq!(postgres.binding(&named("skip")).unwrap().positions, vec![3]);
    assert_eq!(
        postgres.binding(&named("max")).unwrap().value_type,
        Some(ValueType::Integer)
    );

    // OFFSET ... FETCH NEXT puts the offset first
    let oracle = try_translate(query, Dialect::Oracle).unwrap();
    assert_eq!(oracle.binding(&named("min")).unwrap().positions, vec![1]);
    assert_eq!(oracle.binding(&named("skip")).unwrap().positions, vec![2]);
    assert_eq!(oracle.binding(&named("max")).unwrap().positions, vec![3]);
}

#[test]
fn test_positional_parameters_keep_their_labels() {
    let result = try_translate(
        "select p.name from Person p where p.age between ?2 and ?1",
        Dialect::Postgres,
    )
    .unwrap();
    insta::assert_snapshot!(result.sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE p1_0.age BETWEEN ? AND ?");
    assert_eq!(result.parameters[0].source, ParameterSource::Positional { position: 2 });
    assert_eq!(result.parameters[0].positions, vec![1]);
    assert_eq!(result.parameters[1].source, ParameterSource::Positional { position: 1 });
    assert_eq!(result.parameters[1].positions, vec![2]);
}

#[test]
fn test_collection_parameter_renders_one_placeholder() {
    let result = try_translate("select p.name from Person p where p.id not in :ids", Dialect::Postgres).unwrap();
    insta::assert_snapshot!(result.sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE p1_0.id NOT IN (?)");
    assert_eq!(result.parameters[0].positions, vec![1]);
    assert_valid_sql(&result.sql);
}

#[test]
fn test_declared_type_overrides_inference() {
    let source = QuerySource::new("select p.name from Person p where p.name = :n")
        .with_parameter(ParameterDeclaration::typed(named("n"), ValueType::Long));
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();
    assert_eq!(result.parameters[0].value_type, Some(ValueType::Long));
}

#[test]
fn test_undeclared_parameter_rejected_when_declarations_given() {
    let source = QuerySource::new("select p.name from Person p where p.name = :n and p.age = :age")
        .with_parameter(ParameterDeclaration::new(named("n")));
    let err = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap_err();
    assert_eq!(err, TranslationError::Semantic(vec!["parameter not declared: :age".into()]));
}

#[test]
fn test_strict_mode_rejects_mixed_styles() {
    let source = QuerySource::new("select p.name from Person p where p.name = :n and p.age = ?1");
    let lenient = translate(&source, &metamodel(), compact(Dialect::Postgres));
    assert!(lenient.is_ok());

    let err = translate(&source, &metamodel(), compact(Dialect::Postgres).strict(true)).unwrap_err();
    assert_eq!(err.messages(), vec!["cannot mix positional and named parameters"]);
}

#[test]
fn test_result_serializes_bindings() {
    let result = try_translate("select p.name from Person p where p.name = :n", Dialect::Postgres).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

    assert_eq!(json["dialect"], "postgres");
    assert_eq!(json["parameters"][0]["source"]["kind"], "named");
    assert_eq!(json["parameters"][0]["source"]["name"], "n");
    assert_eq!(json["parameters"][0]["positions"], serde_json::json!([1]));
    assert_eq!(json["shape"]["items"][0]["columns"], serde_json::json!(["col_0_0_"]));
}
