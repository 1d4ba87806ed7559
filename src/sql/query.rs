//! SELECT statement AST.
//!
//! The producer assembles a [`Query`] with the builder methods and renders
//! it once per dialect. Rendering goes through [`TokenStream`] so that the
//! placeholder order can be read back before serializing.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A select-list column with its result alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space().push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

/// A mapped table with the alias the query gave it.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(alias) = &self.alias {
            ts.space();
            // Oracle rejects AS before a table alias
            if dialect.supports_table_alias_as() {
                ts.push(Token::As).space();
            }
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

/// Join flavours the translator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    /// Additional from-clause root.
    Cross,
}

impl JoinType {
    fn keyword(self) -> Token {
        match self {
            JoinType::Inner => Token::Inner,
            JoinType::Left => Token::Left,
            JoinType::Cross => Token::Cross,
        }
    }
}

/// One JOIN clause. Cross joins carry no `on` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    pub(crate) fn tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(self.join_type.keyword()).space().push(Token::Join).space();
        ts.append(&self.table.tokens(dialect));
        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }
        ts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    /// NULLS FIRST/LAST is dropped for dialects without it; the producer
    /// adds a CASE sort key ahead of this one instead.
    fn tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        match self.dir {
            Some(SortDir::Asc) => {
                ts.space().push(Token::Asc);
            }
            Some(SortDir::Desc) => {
                ts.space().push(Token::Desc);
            }
            None => {}
        }
        match self.nulls {
            Some(NullsOrder::First) if dialect.supports_nulls_ordering() => {
                ts.space().push(Token::NullsFirst);
            }
            Some(NullsOrder::Last) if dialect.supports_nulls_ordering() => {
                ts.space().push(Token::NullsLast);
            }
            _ => {}
        }
        ts
    }
}

/// Row limit and offset. Each side is a literal or a placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl LimitOffset {
    fn tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(
            self.limit.as_ref().map(|e| e.to_tokens_for_dialect(dialect)),
            self.offset.as_ref().map(|e| e.to_tokens_for_dialect(dialect)),
        )
    }
}

/// A SELECT statement.
///
/// Additional from-clause roots are carried as CROSS joins so that every
/// join can reference any group emitted before it.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until rendered with to_sql() or to_tokens_for_dialect()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn with_joins(mut self, joins: Vec<Join>) -> Self {
        self.joins = joins;
        self
    }

    /// AND a condition onto the WHERE clause.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = match self.where_clause.take() {
            Some(existing) => Expr::conjunction(vec![existing, condition]),
            None => Some(condition),
        };
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, keys: Vec<OrderByExpr>) -> Self {
        self.order_by = keys;
        self
    }

    pub fn limit(mut self, limit: Expr) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: Expr) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).offset = Some(offset);
        self
    }

    /// Render the statement for `dialect`.
    ///
    /// The select list is laid out one column per line; everything else
    /// starts each clause on a new line.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1).append(&item.tokens(dialect));
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space().append(&from.tokens(dialect));
        }
        for join in &self.joins {
            ts.newline().append(&join.tokens(dialect));
        }

        if let Some(predicate) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&predicate.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            ts.comma_list(self.group_by.iter().map(|e| e.to_tokens_for_dialect(dialect)));
        }
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            ts.comma_list(self.order_by.iter().map(|key| key.tokens(dialect)));
        } else if self.limit_offset.is_some() && dialect.requires_order_by_for_offset() {
            // OFFSET/FETCH needs an ORDER BY; the query asked for no order
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        if let Some(rows) = &self.limit_offset {
            ts.newline().append(&rows.tokens(dialect));
        }

        ts
    }

    /// Multi-line SQL for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Renders with the default dialect; use [`Query::to_sql`] otherwise.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql(Dialect::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{count_star, lit_int, table_col, ExprExt};

    fn person() -> TableRef {
        TableRef::new("person").with_alias("p1_0")
    }

    fn compact(query: &Query, dialect: Dialect) -> String {
        query.to_tokens_for_dialect(dialect).serialize_compact(dialect)
    }

    #[test]
    fn test_select_list_layout() {
        let query = Query::new()
            .select(vec![
                SelectExpr::new(table_col("p1_0", "id")).with_alias("col_0_0_"),
                SelectExpr::new(table_col("p1_0", "name")).with_alias("col_0_1_"),
            ])
            .from(person());

        assert_eq!(
            query.to_sql(Dialect::DuckDb),
            "SELECT\n  p1_0.id AS col_0_0_,\n  p1_0.name AS col_0_1_\nFROM person AS p1_0"
        );
        assert_eq!(query.to_string(), query.to_sql(Dialect::DuckDb));
    }

    #[test]
    fn test_oracle_table_alias_without_as() {
        let query = Query::new().select(vec![table_col("p1_0", "id")]).from(person());
        assert_eq!(compact(&query, Dialect::Oracle), "SELECT p1_0.id FROM person p1_0");
    }

    #[test]
    fn test_filter_combines_with_and() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .from(person())
            .filter(table_col("p1_0", "age").eq(lit_int(18)))
            .filter(table_col("p1_0", "active").eq(true));

        assert!(query
            .to_sql(Dialect::Postgres)
            .contains("WHERE p1_0.age = 18 AND p1_0.active = true"));
    }

    #[test]
    fn test_joins_render_in_order() {
        let query = Query::new()
            .select(vec![table_col("c1_0", "name")])
            .from(TableRef::new("orders").with_alias("o1_0"))
            .with_joins(vec![
                Join {
                    join_type: JoinType::Inner,
                    table: TableRef::new("customer").with_alias("c1_0"),
                    on: Some(table_col("c1_0", "id").eq(table_col("o1_0", "customer_id"))),
                },
                Join {
                    join_type: JoinType::Cross,
                    table: person(),
                    on: None,
                },
            ]);

        assert_eq!(
            compact(&query, Dialect::DuckDb),
            "SELECT c1_0.name FROM orders AS o1_0 INNER JOIN customer AS c1_0 ON c1_0.id = o1_0.customer_id CROSS JOIN person AS p1_0"
        );
    }

    #[test]
    fn test_group_by_and_having() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "city"), count_star()])
            .from(person())
            .group_by(vec![table_col("p1_0", "city"), table_col("p1_0", "street")])
            .having(count_star().eq(lit_int(2)));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("GROUP BY p1_0.city, p1_0.street"));
        assert!(sql.contains("HAVING COUNT(*) = 2"));
    }

    #[test]
    fn test_nulls_precedence_skipped_where_unsupported() {
        let key = OrderByExpr {
            expr: table_col("p1_0", "name"),
            dir: Some(SortDir::Desc),
            nulls: Some(NullsOrder::Last),
        };
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .from(person())
            .order_by(vec![key]);

        assert!(query.to_sql(Dialect::Postgres).ends_with("ORDER BY p1_0.name DESC NULLS LAST"));
        assert!(query.to_sql(Dialect::MySql).ends_with("ORDER BY p1_0.name DESC"));
    }

    #[test]
    fn test_limit_offset_duckdb() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .from(person())
            .limit(lit_int(10))
            .offset(Expr::Parameter(0));

        assert!(query.to_sql(Dialect::DuckDb).ends_with("LIMIT 10 OFFSET ?"));
    }

    #[test]
    fn test_tsql_limit_without_order_by() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .from(person())
            .limit(lit_int(10));

        let sql = query.to_sql(Dialect::TSql);
        assert!(sql.contains("ORDER BY (SELECT NULL)"));
        assert!(sql.ends_with("OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"));
    }

    #[test]
    fn test_offset_fetch_placeholder_order() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .from(person())
            .limit(Expr::Parameter(0))
            .offset(Expr::Parameter(1));

        assert_eq!(query.to_tokens_for_dialect(Dialect::Oracle).placeholders(), vec![1, 0]);
        assert_eq!(query.to_tokens_for_dialect(Dialect::DuckDb).placeholders(), vec![0, 1]);
    }

    #[test]
    fn test_distinct() {
        let query = Query::new()
            .select(vec![table_col("p1_0", "name")])
            .distinct()
            .from(person());
        assert!(query.to_sql(Dialect::DuckDb).starts_with("SELECT DISTINCT\n"));
    }

    #[test]
    fn test_scalar_subquery_in_filter() {
        let sub = Query::new()
            .select(vec![count_star()])
            .from(TableRef::new("person_nicknames").with_alias("n1_0"))
            .filter(table_col("n1_0", "person_id").eq(table_col("p1_0", "id")));
        let query = Query::new()
            .select(vec![table_col("p1_0", "id")])
            .from(person())
            .filter(Expr::Subquery(Box::new(sub)).eq(lit_int(2)));

        assert_eq!(
            compact(&query, Dialect::DuckDb),
            "SELECT p1_0.id FROM person AS p1_0 WHERE (SELECT COUNT(*) FROM person_nicknames AS n1_0 WHERE n1_0.person_id = p1_0.id) = 2"
        );
    }
}
