//! Oracle dialect (12c and later).
//!
//! Oracle differences:
//! - No `AS` before table aliases
//! - No boolean literals (1/0)
//! - `OFFSET m ROWS FETCH NEXT n ROWS ONLY` pagination

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;

/// Oracle dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_limit_offset(
        &self,
        limit: Option<TokenStream>,
        offset: Option<TokenStream>,
    ) -> TokenStream {
        helpers::emit_offset_fetch(limit, offset, false)
    }

    fn supports_table_alias_as(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_oracle(name)
    }
}
