#[path = "../support/mod.rs"]
mod support;

use hqlt::error::RecognitionError;
use hqlt::semantic::{ParameterDeclaration, ParameterKey};
use hqlt::translator::{translate, QuerySource};
use hqlt::{hql, Dialect, TranslationError};
use support::{compact, metamodel, try_translate};

#[test]
fn test_semantic_errors_are_aggregated() {
    let err = try_translate(
        "from Person p where p.nope = 1 and q.name = 'x' order by p.age + 1",
        Dialect::Postgres,
    )
    .unwrap_err();

    assert_eq!(
        err,
        TranslationError::Semantic(vec![
            "could not resolve property: nope of: com.acme.Person".into(),
            "could not resolve identifier: q".into(),
            "order by expression must be a simple path or a select alias: p.age + 1".into(),
        ])
    );
    assert_eq!(
        err.to_string(),
        "could not resolve property: nope of: com.acme.Person\n\
         could not resolve identifier: q\n\
         order by expression must be a simple path or a select alias: p.age + 1"
    );
}

#[test]
fn test_grammar_error_carries_position() {
    let err = try_translate("from Person p where", Dialect::Postgres).unwrap_err();
    match err {
        TranslationError::Syntax { position, message } => {
            assert_eq!(position.line, 1);
            assert!(position.offset >= 14, "offset {}", position.offset);
            assert!(!message.is_empty());
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[test]
fn test_syntax_errors_stop_before_binding() {
    // `Nothing` is unmapped, but the grammar error is all that is reported
    let err = try_translate("from Nothing n where (n.a = )", Dialect::Postgres).unwrap_err();
    assert!(matches!(err, TranslationError::Syntax { .. }), "{:?}", err);
}

#[test]
fn test_order_by_restriction() {
    let err = try_translate("select p.name from Person p order by p.age + p.id", Dialect::Postgres).unwrap_err();
    assert_eq!(
        err.messages(),
        vec!["order by expression must be a simple path or a select alias: p.age + p.id"]
    );

    assert!(try_translate("select p.name from Person p order by p.name", Dialect::Postgres).is_ok());
    assert!(try_translate("select p.age as a from Person p order by a", Dialect::Postgres).is_ok());
}

#[test]
fn test_unmapped_entity() {
    let err = try_translate("from Nothing n", Dialect::Postgres).unwrap_err();
    assert_eq!(err, TranslationError::Semantic(vec!["Nothing is not mapped".into()]));
}

#[test]
fn test_collection_valued_comparison() {
    let err = try_translate("from Order o where o.lines = 1", Dialect::Postgres).unwrap_err();
    assert_eq!(
        err.messages(),
        vec!["cannot compare collection-valued path expression: o.lines"]
    );
}

#[test]
fn test_indices_outside_from_clause() {
    let err = try_translate("select p.nicknames.indices from Person p", Dialect::Postgres).unwrap_err();
    assert!(matches!(err, TranslationError::Semantic(_)), "{:?}", err);
}

#[test]
fn test_warnings_do_not_fail_translation() {
    let source = QuerySource::new("select p.name from Person p where p.id = :id")
        .with_parameter(ParameterDeclaration::new(ParameterKey::Named("id".into())))
        .with_parameter(ParameterDeclaration::new(ParameterKey::Named("unused".into())));
    let result = translate(&source, &metamodel(), compact(Dialect::Postgres)).unwrap();
    assert_eq!(result.warnings, vec!["declared parameter is never used: :unused"]);
}

#[test]
fn test_join_cycle_is_reported_as_semantic() {
    let err = try_translate("from Order o join o.lines l with l.product.name = 'x'", Dialect::Postgres)
        .unwrap_err();
    match err {
        TranslationError::Semantic(messages) => {
            assert_eq!(messages.len(), 1);
            assert!(messages[0].starts_with("cycle in join dependencies involving "));
        }
        other => panic!("expected semantic error, got {:?}", other),
    }
}

#[test]
fn test_composite_distinct_count_needs_tuple_support() {
    let err = try_translate("select count(distinct s) from Shipment s", Dialect::Oracle).unwrap_err();
    assert_eq!(
        err,
        TranslationError::Semantic(vec![
            "count(distinct) over a composite value is not supported by the oracle dialect".into()
        ])
    );
}

#[test]
fn test_recognition_error_renders_over_query_text() {
    let text = "from Person p where";
    let parsed = hql::parse(text);
    let diagnostic = &parsed.diagnostics[0];
    let error = RecognitionError::new(text, diagnostic.span.clone(), diagnostic.message.clone());
    let rendered = error.render("query", text);
    assert!(rendered.contains("from Person p where"));
    assert!(rendered.contains(&diagnostic.message));
}
