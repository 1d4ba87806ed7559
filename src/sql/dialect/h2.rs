//! H2 dialect.

use super::helpers;
use super::SqlDialect;

/// H2 database dialect.
#[derive(Debug, Clone, Copy)]
pub struct H2;

impl SqlDialect for H2 {
    fn name(&self) -> &'static str {
        "h2"
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

    fn supports_tuple_distinct_counts(&self) -> bool {
        true
    }
}
