#[path = "../support/mod.rs"]
mod support;

use hqlt::config::Settings;
use hqlt::filter::FilterDefinition;
use hqlt::metamodel::ValueType;
use hqlt::semantic::{ParameterKey, ParameterSource};
use hqlt::translator::{translate, QuerySource};
use hqlt::{Dialect, TranslationError};
use support::{assert_valid_sql, compact, metamodel};

fn tenant() -> FilterDefinition {
    FilterDefinition::new("tenant").with_parameter("tenant", ValueType::String)
}

fn filter_source() -> ParameterSource {
    ParameterSource::Filter {
        filter: "tenant".into(),
        parameter: "tenant".into(),
    }
}

#[test]
fn test_root_filter_precedes_user_predicate() {
    let source = QuerySource::new("select o.code from Order o where o.total > :min").with_filter(tenant());
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT o1_0.code AS col_0_0_ FROM orders AS o1_0 WHERE (o1_0.tenant_code = ?) AND o1_0.total > ?");

    let filter = result.parameters.iter().find(|b| b.source == filter_source()).unwrap();
    assert_eq!(filter.positions, vec![1]);
    assert_eq!(filter.value_type, Some(ValueType::String));
    assert_eq!(
        result.binding(&ParameterKey::Named("min".into())).unwrap().positions,
        vec![2]
    );
    assert_valid_sql(&result.sql);
}

#[test]
fn test_joined_entity_filter_goes_to_on_condition() {
    let source = QuerySource::new("select o.code from Customer c join c.orders o").with_filter(tenant());
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT o1_0.code AS col_0_0_ FROM customer AS c1_0 INNER JOIN orders AS o1_0 ON c1_0.id = o1_0.customer_id AND (o1_0.tenant_code = ?)");
    assert_valid_sql(&result.sql);
}

#[test]
fn test_entity_without_condition_warns() {
    let source = QuerySource::new("select p.name from Person p").with_filter(tenant());
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();

    assert_eq!(result.sql, "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0");
    assert!(result.parameters.is_empty());
    assert_eq!(
        result.warnings,
        vec!["filter tenant has no condition for entity com.acme.Person"]
    );
}

#[test]
fn test_default_condition_reaches_subclasses() {
    let filter = tenant().with_condition("{alias}.tenant = :tenant");
    let source = QuerySource::new("select e.name from Employee e").with_filter(filter);
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT e1_0.name AS col_0_0_ FROM person AS e1_0 INNER JOIN employee AS e1_1 ON e1_0.id = e1_1.person_id WHERE e1_0.tenant = ?");
    assert!(result.warnings.is_empty());
}

#[test]
fn test_entities_outside_filter_untouched() {
    let source = QuerySource::new("select c.name from Company c").with_filter(tenant());
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();
    assert_eq!(result.sql, "SELECT c1_0.name AS col_0_0_ FROM company AS c1_0");
}

#[test]
fn test_undefined_filter_parameter_fails_translation() {
    let source = QuerySource::new("select o.code from Order o").with_filter(FilterDefinition::new("tenant"));
    let err = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap_err();
    assert_eq!(
        err,
        TranslationError::Semantic(vec!["filter tenant references undefined parameter: tenant".into()])
    );
}

#[test]
fn test_filter_from_settings() {
    let settings = Settings::from_toml_str(
        r#"
[[filter]]
name = "tenant"

[[filter.parameter]]
name = "tenant"
type = "string"
"#,
    )
    .unwrap();
    let filter = settings.filter("tenant").cloned().unwrap();
    assert_eq!(filter, tenant());

    let source = QuerySource::new("select o.code from Order o").with_filter(filter);
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();
    assert_eq!(
        result.sql,
        "SELECT o1_0.code AS col_0_0_ FROM orders AS o1_0 WHERE o1_0.tenant_code = ?"
    );
}
