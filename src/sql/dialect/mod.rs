//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (ANSI/PG/DuckDB/Oracle/H2), `` ` `` (MySQL), `[]` (T-SQL)
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH
//! - Boolean literals: true/false vs 1/0
//! - String concatenation: `||` vs `+` vs CONCAT()
//! - Capability flags the translator consults while producing SQL
//!   (tuple counts, NULLS ordering)
//!
//! # Usage
//!
//! ```
//! use hqlt::sql::{Dialect, SqlDialect};
//!
//! let dialect: Dialect = "postgres".parse().unwrap();
//! assert_eq!(dialect.render_identifier("user"), "\"user\"");
//! assert_eq!(dialect.render_identifier("person"), "person");
//! ```
//!
//! # Capabilities
//!
//! | Feature | DuckDB | PostgreSQL | MySQL | T-SQL | Oracle | H2 |
//! |---------|--------|------------|-------|-------|--------|----|
//! | NULLS FIRST/LAST | ✓ | ✓ | ❌ | ❌ | ✓ | ✓ |
//! | `count((a, b))` | ❌ | ✓ | ❌ | ❌ | ❌ | ✓ |
//! | `count(distinct a, b)` | ❌ | ❌ | ✓ | ❌ | ❌ | ✓ |
//! | `AS` before table alias | ✓ | ✓ | ✓ | ✓ | ❌ | ✓ |
//!
//! Without NULLS ordering the producer emulates it with a CASE sort key.
//! A composite distinct count needs one of the two tuple count forms.

mod duckdb;
pub mod helpers;
mod h2;
mod mysql;
mod oracle;
mod postgres;
mod tsql;

pub use duckdb::DuckDb;
pub use h2::H2;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use tsql::TSql;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL/DuckDB: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - T-SQL: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Render an identifier, quoting it only when it is reserved or not a
    /// plain name.
    fn render_identifier(&self, ident: &str) -> String {
        if helpers::needs_quoting(ident) {
            self.quote_identifier(ident)
        } else {
            ident.to_string()
        }
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    /// Override for Unicode prefix (T-SQL N'...').
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - PostgreSQL/DuckDB/H2: `true`/`false`
    /// - MySQL/T-SQL/Oracle: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    ///
    /// - PostgreSQL/DuckDB/MySQL/H2: `LIMIT n OFFSET m` (default)
    /// - T-SQL/Oracle: `OFFSET m ROWS FETCH NEXT n ROWS ONLY` (override)
    fn emit_limit_offset(
        &self,
        limit: Option<TokenStream>,
        offset: Option<TokenStream>,
    ) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Whether this dialect requires ORDER BY for OFFSET/LIMIT.
    ///
    /// T-SQL requires ORDER BY when using OFFSET FETCH.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    ///
    /// - ANSI/PostgreSQL/DuckDB/Oracle/H2: `||`
    /// - T-SQL: `+`
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the concat operator at all.
    ///
    /// MySQL uses `||` as logical OR by default, so CONCAT() is emitted.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // FROM Clause
    // =========================================================================

    /// Whether `AS` may precede a table alias.
    ///
    /// Oracle only accepts `AS` for column aliases.
    fn supports_table_alias_as(&self) -> bool {
        true
    }

    // =========================================================================
    // Tuple Counts
    // =========================================================================

    /// Whether `count((a, b))` counts rows with a non-null row value.
    fn supports_tuple_counts(&self) -> bool {
        false
    }

    /// Whether `count(distinct a, b)` is accepted.
    ///
    /// Without it, a composite distinct count falls back to the row value
    /// `count(distinct (a, b))` when [`supports_tuple_counts`] holds.
    ///
    /// [`supports_tuple_counts`]: SqlDialect::supports_tuple_counts
    fn supports_tuple_distinct_counts(&self) -> bool {
        false
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// SQL spelling of a query function, when it is not the query name
    /// itself. Matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
    TSql,
    Oracle,
    H2,
}

impl Dialect {
    /// Every supported dialect, in declaration order.
    pub const ALL: [Dialect; 6] = [
        Dialect::DuckDb,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::TSql,
        Dialect::Oracle,
        Dialect::H2,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::TSql => &TSql,
            Dialect::Oracle => &Oracle,
            Dialect::H2 => &H2,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn render_identifier(&self, ident: &str) -> String {
        self.dialect().render_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn emit_limit_offset(
        &self,
        limit: Option<TokenStream>,
        offset: Option<TokenStream>,
    ) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn supports_table_alias_as(&self) -> bool {
        self.dialect().supports_table_alias_as()
    }

    fn supports_tuple_counts(&self) -> bool {
        self.dialect().supports_tuple_counts()
    }

    fn supports_tuple_distinct_counts(&self) -> bool {
        self.dialect().supports_tuple_distinct_counts()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error for a dialect name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown SQL dialect: {0}")]
pub struct UnknownDialect(pub String);

impl std::str::FromStr for Dialect {
    type Err = UnknownDialect;

    /// Parse a dialect name, accepting common aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckdb" => Ok(Dialect::DuckDb),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            "oracle" => Ok(Dialect::Oracle),
            "h2" => Ok(Dialect::H2),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}
