//! PostgreSQL dialect.
//!
//! PostgreSQL is close to ANSI SQL. It also accepts row values inside
//! `count((a, b))` and `count(distinct (a, b))`, but not the comma form
//! `count(distinct a, b)`.

use super::helpers;
use super::SqlDialect;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn supports_tuple_counts(&self) -> bool {
        true
    }
}
