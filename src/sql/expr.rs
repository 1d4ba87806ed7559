//! Expression AST for produced SQL.
//!
//! Leaves are literals, bind placeholders and (table alias, column) pairs.
//! Every variant must be handled in `to_tokens_for_dialect()`; the compiler
//! enforces this.

use super::dialect::{Dialect, SqlDialect};
use super::query::Query;
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Bind placeholder for a parameter slot.
    Parameter(usize),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<Query>),

    /// [NOT] EXISTS (SELECT ...)
    Exists { subquery: Box<Query>, negated: bool },

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// expr [NOT] LIKE pattern [ESCAPE escape]
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
    },

    /// Row value: (a, b, ...)
    Tuple(Vec<Expr>),

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Predicate text supplied by a filter definition, with its
    /// parameters already turned into placeholders.
    Fragment(Vec<FragmentPart>),
}

/// One piece of a filter fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPart {
    Sql(String),
    Parameter(usize),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl Expr {
    /// Render this expression for `dialect`.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::Parameter(slot) => {
                ts.push(Token::Placeholder(*slot));
            }

            Expr::BinaryOp { left, op, right } => {
                // Dialects without a || operator get CONCAT(left, right)
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into()));
                    ts.lparen();
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.comma().space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                    ts.rparen();
                } else {
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(binary_op_to_token(*op));
                    ts.space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
            }

            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => {
                    ts.push(Token::Not).space();
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                }
                UnaryOperator::Minus => {
                    ts.push(Token::Minus);
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                }
            },

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                ts.comma_list(args.iter().map(|arg| arg.to_tokens_for_dialect(dialect)))
                    .rparen();
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens_for_dialect(dialect));
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Exists { subquery, negated } => {
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Exists).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // "x IN ()" is invalid SQL: it is FALSE, and "x NOT IN ()" is TRUE
                if values.is_empty() {
                    ts.push(Token::LitBool(*negated));
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    ts.comma_list(values.iter().map(|v| v.to_tokens_for_dialect(dialect)))
                        .rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::Like)
                    .space()
                    .append(&pattern.to_tokens_for_dialect(dialect));
                if let Some(escape) = escape {
                    ts.space()
                        .push(Token::Escape)
                        .space()
                        .append(&escape.to_tokens_for_dialect(dialect));
                }
            }

            Expr::Tuple(items) => {
                ts.lparen()
                    .comma_list(items.iter().map(|item| item.to_tokens_for_dialect(dialect)))
                    .rparen();
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Fragment(parts) => {
                for part in parts {
                    ts.push(match part {
                        FragmentPart::Sql(sql) => Token::Raw(sql.clone()),
                        FragmentPart::Parameter(slot) => Token::Placeholder(*slot),
                    });
                }
            }
        }

        ts
    }

    /// Join predicates with AND, parenthesizing OR chains and fragments.
    ///
    /// Returns `None` for an empty list; a single predicate is returned
    /// unchanged.
    pub fn conjunction(predicates: Vec<Expr>) -> Option<Expr> {
        let single = predicates.len() == 1;
        predicates
            .into_iter()
            .map(|p| {
                let loose = matches!(
                    p,
                    Expr::BinaryOp {
                        op: BinaryOperator::Or,
                        ..
                    } | Expr::Fragment(_)
                );
                if !single && loose {
                    Expr::Paren(Box::new(p))
                } else {
                    p
                }
            })
            .reduce(|acc, p| acc.and(p))
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
    }
}

/// Column reference qualified by a table alias.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// String literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![Expr::Star { table: None }],
        distinct: false,
    }
}

/// Fluent helpers for combining expressions.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self.into_expr()),
        }
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr, dialect: Dialect) -> String {
        expr.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    #[test]
    fn test_table_column() {
        assert_eq!(render(&table_col("p1_0", "name"), Dialect::DuckDb), "p1_0.name");
    }

    #[test]
    fn test_binary_op_with_parameter() {
        let expr = table_col("c1_0", "id").eq(Expr::Parameter(0));
        assert_eq!(render(&expr, Dialect::Postgres), "c1_0.id = ?");
    }

    #[test]
    fn test_conjunction_parenthesizes_or() {
        let or = table_col("p1_0", "a").eq(1).or(table_col("p1_0", "b").eq(2));
        let and = Expr::conjunction(vec![or, table_col("p1_0", "c").eq(3)]).unwrap();
        assert_eq!(
            render(&and, Dialect::DuckDb),
            "(p1_0.a = 1 OR p1_0.b = 2) AND p1_0.c = 3"
        );
    }

    #[test]
    fn test_conjunction_single_and_empty() {
        assert!(Expr::conjunction(vec![]).is_none());
        let single = Expr::conjunction(vec![table_col("a", "b").is_null()]).unwrap();
        assert_eq!(render(&single, Dialect::DuckDb), "a.b IS NULL");
    }

    #[test]
    fn test_count_distinct_tuple() {
        let expr = Expr::Function {
            name: "count".into(),
            args: vec![table_col("o1_0", "a"), table_col("o1_0", "b")],
            distinct: true,
        };
        assert_eq!(
            render(&expr, Dialect::MySql),
            "COUNT(DISTINCT o1_0.a, o1_0.b)"
        );
    }

    #[test]
    fn test_like_with_escape() {
        let expr = Expr::Like {
            expr: Box::new(table_col("p1_0", "name")),
            pattern: Box::new(lit_str("a!%%")),
            escape: Some(Box::new(lit_str("!"))),
            negated: true,
        };
        assert_eq!(
            render(&expr, Dialect::DuckDb),
            "p1_0.name NOT LIKE 'a!%%' ESCAPE '!'"
        );
    }

    #[test]
    fn test_in_list_empty() {
        let expr = table_col("p1_0", "id").in_list(vec![]);
        assert_eq!(render(&expr, Dialect::DuckDb), "false");
        assert_eq!(render(&expr, Dialect::TSql), "0");
    }

    #[test]
    fn test_tuple() {
        let expr = Expr::Tuple(vec![table_col("a", "x"), table_col("a", "y")]);
        assert_eq!(render(&expr, Dialect::DuckDb), "(a.x, a.y)");
    }

    #[test]
    fn test_concat_mysql_function() {
        let expr = table_col("p1_0", "first").binary(BinaryOperator::Concat, table_col("p1_0", "last"));
        assert_eq!(render(&expr, Dialect::DuckDb), "p1_0.first || p1_0.last");
        assert_eq!(
            render(&expr, Dialect::MySql),
            "CONCAT(p1_0.first, p1_0.last)"
        );
    }

    #[test]
    fn test_fragment_placeholders() {
        let expr = Expr::Fragment(vec![
            FragmentPart::Sql("p1_0.tenant = ".into()),
            FragmentPart::Parameter(3),
        ]);
        let ts = expr.to_tokens_for_dialect(Dialect::DuckDb);
        assert_eq!(ts.placeholders(), vec![3]);
        assert_eq!(ts.serialize(Dialect::DuckDb), "p1_0.tenant = ?");
    }

    #[test]
    fn test_unary_minus_and_not() {
        let neg = Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: Box::new(lit_int(5)),
        };
        assert_eq!(render(&neg, Dialect::DuckDb), "-5");
        let not = Expr::Paren(Box::new(table_col("a", "b").is_null())).not();
        assert_eq!(render(&not, Dialect::DuckDb), "NOT (a.b IS NULL)");
    }
}
