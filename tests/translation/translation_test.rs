#[path = "../support/mod.rs"]
mod support;

use hqlt::planner::ResultMapping;
use hqlt::semantic::ParameterSource;
use hqlt::Dialect;
use support::{assert_valid_sql, sql, try_translate};

#[test]
fn test_root_entity_ordered_by_attribute() {
    support::init_tracing();
    let result = try_translate("from Person p order by p.name", Dialect::Postgres).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT p1_0.id AS col_0_0_, p1_0.name AS col_0_1_, p1_0.age AS col_0_2_, p1_0.street AS col_0_3_, p1_0.city AS col_0_4_, p1_0.employer_id AS col_0_5_ FROM person AS p1_0 ORDER BY p1_0.name");
    assert!(result.query.joins.is_empty());
    assert!(result.parameters.is_empty());
    assert_eq!(result.shape.items.len(), 1);
    assert_eq!(
        result.shape.items[0].mapping,
        ResultMapping::Entity {
            entity: "com.acme.Person".into()
        }
    );
    assert_valid_sql(&result.sql);
}

#[test]
fn test_implicit_join_for_to_one_navigation() {
    let result = try_translate("from Order o where o.customer.id = ?1", Dialect::Postgres).unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT o1_0.id AS col_0_0_, o1_0.code AS col_0_1_, o1_0.total AS col_0_2_, o1_0.customer_id AS col_0_3_ FROM orders AS o1_0 INNER JOIN customer AS c1_0 ON o1_0.customer_id = c1_0.id WHERE c1_0.id = ?");
    assert_eq!(result.query.joins.len(), 1);
    assert_eq!(result.parameters.len(), 1);
    assert_eq!(result.parameters[0].source, ParameterSource::Positional { position: 1 });
    assert_eq!(result.parameters[0].positions, vec![1]);
    assert_valid_sql(&result.sql);
}

#[test]
fn test_count_distinct_over_composite_identifier() {
    let postgres = sql("select count(distinct s) from Shipment s", Dialect::Postgres);
    insta::assert_snapshot!(postgres, @"SELECT COUNT(DISTINCT (s1_0.order_no, s1_0.seq)) AS col_0_0_ FROM shipment AS s1_0");
    assert_valid_sql(&postgres);

    let mysql = sql("select count(distinct s) from Shipment s", Dialect::MySql);
    insta::assert_snapshot!(mysql, @"SELECT COUNT(DISTINCT s1_0.order_no, s1_0.seq) AS col_0_0_ FROM shipment AS s1_0");
}

#[test]
fn test_path_repeated_across_clauses_joins_once() {
    let result = try_translate(
        "select o.customer.name from Order o where o.customer.name like 'A%' order by o.customer.name",
        Dialect::Postgres,
    )
    .unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT c1_0.name AS col_0_0_ FROM orders AS o1_0 INNER JOIN customer AS c1_0 ON o1_0.customer_id = c1_0.id WHERE c1_0.name LIKE 'A%' ORDER BY c1_0.name");
    assert_eq!(result.query.joins.len(), 1);
}

#[test]
fn test_type_of_joins_from_different_roots_are_distinct() {
    let result = try_translate(
        "select x.name from Person a join a.pets x, Person b join b.pets y where type(x) = type(y)",
        Dialect::Postgres,
    )
    .unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT p2_0.name AS col_0_0_ FROM person AS p1_0 INNER JOIN pet AS p2_0 ON p1_0.id = p2_0.owner_id CROSS JOIN person AS p3_0 INNER JOIN pet AS p4_0 ON p3_0.id = p4_0.owner_id WHERE p2_0.kind = p4_0.kind");
    assert_valid_sql(&result.sql);
}

#[test]
fn test_collection_join_defaults_to_elements() {
    let plain = sql("select l.quantity from Order o join o.lines l", Dialect::Postgres);
    let function = sql("select l.quantity from Order o join elements(o.lines) l", Dialect::Postgres);
    let dotted = sql("select l.quantity from Order o join o.lines.elements l", Dialect::Postgres);

    insta::assert_snapshot!(plain, @"SELECT l1_0.quantity AS col_0_0_ FROM orders AS o1_0 INNER JOIN order_line AS l1_0 ON o1_0.id = l1_0.order_id");
    assert_eq!(plain, function);
    assert_eq!(plain, dotted);
}

#[test]
fn test_translation_is_deterministic() {
    let query = "select c.name, count(o) from Customer c left join c.orders o where o.total > :min group by c.name";
    let first = try_translate(query, Dialect::DuckDb).unwrap();
    let second = try_translate(query, Dialect::DuckDb).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.shape, second.shape);
    assert_eq!(first.parameters, second.parameters);
}

#[test]
fn test_joined_subclass_reads_both_tables() {
    let sql = sql("select e.name, e.salary from Employee e", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT e1_0.name AS col_0_0_, e1_1.salary AS col_1_0_ FROM person AS e1_0 INNER JOIN employee AS e1_1 ON e1_0.id = e1_1.person_id");
    assert_valid_sql(&sql);
}

#[test]
fn test_single_table_subclass_is_restricted() {
    let sql = sql("select c.name from Cat c where c.lives > 3", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT c1_0.name AS col_0_0_ FROM pet AS c1_0 WHERE c1_0.kind = 'CAT' AND c1_0.lives > 3");
}

#[test]
fn test_many_to_many_join() {
    let sql = sql("select p.code from Order o left join o.promotions p", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT p1_1.code AS col_0_0_ FROM orders AS o1_0 LEFT JOIN order_promotion AS p1_0 ON o1_0.id = p1_0.order_id LEFT JOIN promotion AS p1_1 ON p1_0.promotion_id = p1_1.id");
    assert_valid_sql(&sql);
}

#[test]
fn test_size_becomes_correlated_count() {
    let sql = sql("select o.code from Order o where size(o.lines) > 2", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT o1_0.code AS col_0_0_ FROM orders AS o1_0 WHERE (SELECT COUNT(*) FROM order_line AS l1_0 WHERE l1_0.order_id = o1_0.id) > 2");
    assert_valid_sql(&sql);
}

#[test]
fn test_is_empty_becomes_not_exists() {
    let sql = sql("select p.name from Person p where p.nicknames is empty", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE NOT EXISTS (SELECT 1 FROM person_nickname AS n1_0 WHERE n1_0.person_id = p1_0.id)");
    assert_valid_sql(&sql);
}

#[test]
fn test_order_by_select_alias() {
    let sql = sql("select p.name as n from Person p order by n desc", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 ORDER BY p1_0.name DESC");
}

#[test]
fn test_order_by_alias_of_computed_item_uses_column_alias() {
    let result = try_translate(
        "select p.age + :bump as x, p.name from Person p order by x desc, p.name",
        Dialect::Postgres,
    )
    .unwrap();
    insta::assert_snapshot!(result.sql, @"SELECT p1_0.age + ? AS col_0_0_, p1_0.name AS col_1_0_ FROM person AS p1_0 ORDER BY col_0_0_ DESC, p1_0.name");
    assert_eq!(result.parameters[0].positions, vec![1]);
    assert_valid_sql(&result.sql);
}

#[test]
fn test_nulls_ordering_per_dialect() {
    let query = "select p.name from Person p order by p.age desc nulls last";
    insta::assert_snapshot!(sql(query, Dialect::Postgres), @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 ORDER BY p1_0.age DESC NULLS LAST");
    insta::assert_snapshot!(sql(query, Dialect::MySql), @"SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 ORDER BY CASE WHEN p1_0.age IS NULL THEN 1 ELSE 0 END, p1_0.age DESC");
}

#[test]
fn test_multiple_roots_cross_join() {
    let sql = sql("select p.name, c.name from Person p, Company c", Dialect::Postgres);
    insta::assert_snapshot!(sql, @"SELECT p1_0.name AS col_0_0_, c1_0.name AS col_1_0_ FROM person AS p1_0 CROSS JOIN company AS c1_0");
    assert_valid_sql(&sql);
}

#[test]
fn test_fetch_join_shape() {
    let result = try_translate("select o from Order o join fetch o.customer c", Dialect::Postgres).unwrap();
    assert_eq!(result.shape.items.len(), 2);
    assert_eq!(result.shape.column_count(), 8);
    assert_eq!(
        result.shape.items[1].mapping,
        ResultMapping::Fetch {
            target: "Customer".into(),
            owner: 0,
            attribute: "customer".into(),
        }
    );
    assert_valid_sql(&result.sql);
}

#[test]
fn test_formatted_output_is_multiline() {
    let result = hqlt::translate(
        &hqlt::QuerySource::new("select p.name from Person p"),
        &support::metamodel(),
        hqlt::TranslationOptions::default(),
    )
    .unwrap();
    assert_eq!(result.dialect, Dialect::DuckDb);
    assert!(result.sql.contains('\n'));
    assert_eq!(result.sql.split_whitespace().collect::<Vec<_>>().join(" "), "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0");
}
