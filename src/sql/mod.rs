//! SQL generation module.
//!
//! The translator produces a dialect-neutral SQL AST and renders it here:
//!
//! - [`query`] - SELECT statement AST
//! - [`expr`] - Expression AST
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use expr::{BinaryOperator, Expr, ExprExt, FragmentPart, Literal, UnaryOperator};
pub use query::{Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
