//! SQL AST producer: bound query to [`Query`].
//!
//! Production runs in three steps over the translation context:
//!
//! 1. **Join order** - table groups are sorted with `petgraph` so every join
//!    follows the groups it depends on ([`JoinBuilder::join_order`])
//! 2. **Clauses** - select items, predicates and sort keys are converted by
//!    the [`ExprConverter`]; enabled filters contribute predicate fragments
//! 3. **Assembly** - FROM, joins and the converted clauses become one
//!    [`Query`] plus the [`ResultShape`] describing its columns
//!
//! Bind placeholders carry slot numbers; JDBC positions are only assigned
//! once the statement is rendered.

pub mod expr_converter;
pub mod join_builder;
pub mod select;

pub use expr_converter::ExprConverter;
pub use join_builder::{FromClause, JoinBuilder};
pub use select::{ResultItem, ResultMapping, ResultShape};

use std::collections::HashMap;

use thiserror::Error;

use crate::filter::{entity_filter_predicate, FilterDefinition};
use crate::hql::{NullPrecedence, SortDirection};
use crate::metamodel::{Metamodel, MetamodelError};
use crate::semantic::{BoundExpr, BoundQuery, BoundSort, GroupId, TranslationContext};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{lit_int, Expr, ExprExt};
use crate::sql::query::{NullsOrder, OrderByExpr, Query, SortDir};

/// Errors that can occur while producing SQL.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A `with` condition reads a group that itself depends on the joined
    /// group.
    #[error("cycle in join dependencies involving {0}")]
    JoinCycle(String),

    /// The query needs SQL the target dialect cannot express.
    #[error("{feature} is not supported by the {dialect} dialect")]
    Unsupported {
        feature: &'static str,
        dialect: &'static str,
    },

    #[error("metamodel inconsistency: {0}")]
    Metamodel(#[from] MetamodelError),

    #[error("{0}")]
    Internal(String),
}

impl PlanError {
    /// Whether the error is the query's fault rather than the translator's.
    pub fn is_semantic(&self) -> bool {
        matches!(self, PlanError::JoinCycle(_) | PlanError::Unsupported { .. })
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

/// A produced statement and the layout of its result rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedQuery {
    pub query: Query,
    pub shape: ResultShape,
}

/// Main entry point for SQL production.
pub struct SqlPlanner<'a> {
    metamodel: &'a dyn Metamodel,
    dialect: Dialect,
    filters: &'a [FilterDefinition],
}

impl<'a> SqlPlanner<'a> {
    pub fn new(metamodel: &'a dyn Metamodel, dialect: Dialect) -> Self {
        Self {
            metamodel,
            dialect,
            filters: &[],
        }
    }

    /// Enable filters for every entity table of the query.
    pub fn with_filters(mut self, filters: &'a [FilterDefinition]) -> Self {
        self.filters = filters;
        self
    }

    /// Produce the SQL AST for a bound query.
    ///
    /// Filter problems are reported to the context's error handler; the
    /// returned error covers join cycles and internal inconsistencies.
    pub fn plan(&self, bound: &BoundQuery, ctx: &mut TranslationContext) -> PlanResult<ProducedQuery> {
        let order = JoinBuilder::new(&ctx.joins).join_order()?;
        let filters = self.filter_predicates(ctx);

        let with_conditions: Vec<(GroupId, BoundExpr)> = ctx
            .joins
            .groups()
            .iter()
            .filter_map(|g| {
                let condition = g.join.as_ref()?.condition.clone()?;
                Some((g.id, condition))
            })
            .collect();

        let TranslationContext {
            joins, parameters, ..
        } = ctx;
        let mut converter = ExprConverter::new(self.metamodel, self.dialect, joins, &bound.select);

        let (select, shape) = select::build_select(&mut converter, bound, parameters)?;

        let mut conditions = HashMap::new();
        for (group, condition) in &with_conditions {
            conditions.insert(*group, converter.convert(condition)?);
        }

        let where_clause = bound
            .where_clause
            .as_ref()
            .map(|w| converter.convert(w))
            .transpose()?;

        let mut group_by = Vec::new();
        for expr in &bound.group_by {
            match expr {
                BoundExpr::Entity { group, entity } => {
                    group_by.extend(converter.entity_columns(*group, entity)?)
                }
                other => group_by.extend(converter.expand(other)?),
            }
        }

        let having = bound.having.as_ref().map(|h| converter.convert(h)).transpose()?;

        let mut order_by = Vec::new();
        for sort in &bound.order_by {
            order_by.extend(self.sort_keys(&mut converter, sort)?);
        }

        let limit = bound.limit.as_ref().map(|l| converter.convert(l)).transpose()?;
        let offset = bound.offset.as_ref().map(|o| converter.convert(o)).transpose()?;
        drop(converter);

        let from = JoinBuilder::new(joins).build(&order, &conditions, &filters)?;

        let mut query = Query::new()
            .select(select)
            .with_joins(from.joins)
            .order_by(order_by)
            .group_by(group_by);
        if bound.distinct {
            query = query.distinct();
        }
        if let Some(table) = from.from {
            query = query.from(table);
        }

        let mut predicates = from.root_predicates;
        predicates.extend(where_clause);
        if let Some(predicate) = Expr::conjunction(predicates) {
            query = query.filter(predicate);
        }
        if let Some(having) = having {
            query = query.having(having);
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }

        tracing::debug!(
            columns = shape.column_count(),
            joins = query.joins.len(),
            dialect = %self.dialect,
            "produced sql ast"
        );
        Ok(ProducedQuery { query, shape })
    }

    /// Filter predicates for every entity group, keyed by group.
    fn filter_predicates(&self, ctx: &mut TranslationContext) -> HashMap<GroupId, Expr> {
        let mut predicates = HashMap::new();
        if self.filters.is_empty() {
            return predicates;
        }
        for group in ctx.joins.groups() {
            let Some(entity) = group.entity_name().and_then(|e| self.metamodel.entity_type(e)) else {
                continue;
            };
            if let Some(predicate) = entity_filter_predicate(
                self.metamodel,
                self.filters,
                entity,
                group.entity_alias(),
                &mut ctx.parameters,
                &mut ctx.errors,
            ) {
                predicates.insert(group.id, predicate);
            }
        }
        predicates
    }

    /// Sort keys for one order-by item.
    ///
    /// Entities sort by identifier and embeddables by every column. Where
    /// the dialect lacks NULLS FIRST/LAST, a CASE key ahead of each column
    /// puts the nulls in place.
    fn sort_keys(&self, converter: &mut ExprConverter<'_>, sort: &BoundSort) -> PlanResult<Vec<OrderByExpr>> {
        let dir = sort.direction.map(|d| match d {
            SortDirection::Asc => SortDir::Asc,
            SortDirection::Desc => SortDir::Desc,
        });
        let nulls = sort.nulls.map(|n| match n {
            NullPrecedence::First => NullsOrder::First,
            NullPrecedence::Last => NullsOrder::Last,
        });

        // A select alias is not usable inside the CASE sort key
        let emulate_nulls = nulls.is_some() && !self.dialect.supports_nulls_ordering();
        let columns = if emulate_nulls {
            converter.expand(&sort.expr)?
        } else {
            converter.sort_columns(&sort.expr)?
        };

        let mut keys = Vec::new();
        for column in columns {
            match nulls {
                Some(nulls) if !self.dialect.supports_nulls_ordering() => {
                    let (null_rank, other_rank) = match nulls {
                        NullsOrder::First => (0, 1),
                        NullsOrder::Last => (1, 0),
                    };
                    keys.push(OrderByExpr::new(Expr::Case {
                        operand: None,
                        when_clauses: vec![(column.clone().is_null(), lit_int(null_rank))],
                        else_clause: Some(Box::new(lit_int(other_rank))),
                    }));
                    keys.push(OrderByExpr {
                        expr: column,
                        dir,
                        nulls: None,
                    });
                }
                _ => keys.push(OrderByExpr {
                    expr: column,
                    dir,
                    nulls,
                }),
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hql;
    use crate::metamodel::fixtures;
    use crate::semantic::Binder;

    fn produce(query: &str, dialect: Dialect, filters: &[FilterDefinition]) -> (ProducedQuery, TranslationContext) {
        let metamodel = fixtures::sample();
        let statement = hql::parse(query).statement.unwrap();
        let mut ctx = TranslationContext::new();
        let bound = Binder::new(&metamodel, query, &mut ctx).bind(&statement);
        assert!(!ctx.errors.has_errors(), "{:?}", ctx.errors.errors());
        let produced = SqlPlanner::new(&metamodel, dialect)
            .with_filters(filters)
            .plan(&bound, &mut ctx)
            .unwrap();
        (produced, ctx)
    }

    fn sql(query: &str, dialect: Dialect) -> String {
        let (produced, _) = produce(query, dialect, &[]);
        produced.query.to_tokens_for_dialect(dialect).serialize_compact(dialect)
    }

    #[test]
    fn test_order_by_single_table() {
        assert_eq!(
            sql("select p.name from Person p order by p.name", Dialect::Postgres),
            "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 ORDER BY p1_0.name"
        );
    }

    #[test]
    fn test_implicit_join_condition() {
        assert_eq!(
            sql("select o.code from Order o where o.customer.id = ?1", Dialect::Postgres),
            "SELECT o1_0.code AS col_0_0_ FROM orders AS o1_0 \
             INNER JOIN customer AS c1_0 ON o1_0.customer_id = c1_0.id \
             WHERE c1_0.id = ?"
        );
    }

    #[test]
    fn test_restriction_precedes_user_where() {
        assert_eq!(
            sql("select c.name from Cat c where c.lives > 3 or c.name = 'Tom'", Dialect::Postgres),
            "SELECT c1_0.name AS col_0_0_ FROM pet AS c1_0 \
             WHERE c1_0.kind = 'CAT' AND (c1_0.lives > 3 OR c1_0.name = 'Tom')"
        );
    }

    #[test]
    fn test_order_by_computed_result_variable() {
        assert_eq!(
            sql("select p.age + 1 as x from Person p order by x", Dialect::Postgres),
            "SELECT p1_0.age + 1 AS col_0_0_ FROM person AS p1_0 ORDER BY col_0_0_"
        );
        assert_eq!(
            sql("select p.age + 1 as x from Person p order by x nulls first", Dialect::TSql),
            "SELECT p1_0.age + 1 AS col_0_0_ FROM person AS p1_0 \
             ORDER BY CASE WHEN p1_0.age + 1 IS NULL THEN 0 ELSE 1 END, p1_0.age + 1"
        );
    }

    #[test]
    fn test_nulls_ordering_emulated_without_support() {
        assert_eq!(
            sql("select p.name from Person p order by p.age desc nulls last", Dialect::MySql),
            "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 \
             ORDER BY CASE WHEN p1_0.age IS NULL THEN 1 ELSE 0 END, p1_0.age DESC"
        );
        assert_eq!(
            sql("select p.name from Person p order by p.age desc nulls last", Dialect::Postgres),
            "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 ORDER BY p1_0.age DESC NULLS LAST"
        );
    }

    #[test]
    fn test_order_by_entity_uses_identifier() {
        assert_eq!(
            sql("select c.name from Order o join o.customer c order by c", Dialect::DuckDb),
            "SELECT c1_0.name AS col_0_0_ FROM orders AS o1_0 \
             INNER JOIN customer AS c1_0 ON o1_0.customer_id = c1_0.id ORDER BY c1_0.id"
        );
    }

    #[test]
    fn test_group_by_entity_expands_columns() {
        let (produced, _) = produce(
            "select c, count(o) from Order o join o.customer c group by c",
            Dialect::Postgres,
            &[],
        );
        assert_eq!(produced.query.group_by.len(), 4);
    }

    #[test]
    fn test_filter_lands_in_join_condition() {
        let tenant = FilterDefinition::new("tenant").with_parameter("tenant", crate::metamodel::ValueType::String);
        let (produced, ctx) = produce(
            "select o.code from Customer c join c.orders o",
            Dialect::Postgres,
            std::slice::from_ref(&tenant),
        );
        let dialect = Dialect::Postgres;
        assert_eq!(
            produced.query.to_tokens_for_dialect(dialect).serialize_compact(dialect),
            "SELECT o1_0.code AS col_0_0_ FROM customer AS c1_0 \
             INNER JOIN orders AS o1_0 ON c1_0.id = o1_0.customer_id AND (o1_0.tenant_code = ?)"
        );
        assert_eq!(ctx.parameters.len(), 1);
    }

    #[test]
    fn test_limit_and_offset_literals() {
        assert_eq!(
            sql("select p.name from Person p limit 10 offset 20", Dialect::Postgres),
            "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_cross_join_for_second_root() {
        assert_eq!(
            sql("select p.name, c.name from Person p, Company c", Dialect::Postgres),
            "SELECT p1_0.name AS col_0_0_, c1_0.name AS col_1_0_ \
             FROM person AS p1_0 CROSS JOIN company AS c1_0"
        );
    }
}
