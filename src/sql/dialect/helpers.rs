//! Building blocks the dialect implementations share.

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Words that cannot appear unquoted as a table, column or alias name in at
/// least one supported dialect.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "create", "cross",
    "current", "default", "delete", "desc", "distinct", "else", "end", "exists", "false", "fetch",
    "for", "from", "full", "group", "having", "in", "index", "inner", "insert", "intersect",
    "into", "is", "join", "key", "left", "like", "limit", "not", "null", "number", "of", "offset",
    "on", "or", "order", "outer", "primary", "right", "rows", "select", "set", "table",
    "then", "to", "true", "union", "update", "user", "using", "value", "values", "when", "where",
    "with",
];

/// Whether an identifier must be quoted to be read back verbatim.
///
/// Plain lowercase-safe names (`[A-Za-z_][A-Za-z0-9_]*`) that are not
/// reserved render bare.
pub fn needs_quoting(ident: &str) -> bool {
    let mut chars = ident.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return true;
    }
    let lower = ident.to_ascii_lowercase();
    RESERVED_WORDS.binary_search(&lower.as_str()).is_ok()
}

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, Oracle, H2
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL (SQL Server, Azure Synapse)
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
/// Used by: All dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
/// Used by: T-SQL for non-ASCII strings
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, DuckDB, H2
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: T-SQL, MySQL, Oracle
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... (standard SQL).
/// Used by: Postgres, DuckDB, MySQL, H2
pub fn emit_limit_offset_standard(
    limit: Option<TokenStream>,
    offset: Option<TokenStream>,
) -> TokenStream {
    let mut ts = TokenStream::new();
    let has_limit = limit.is_some();

    if let Some(lim) = limit {
        ts.push(Token::Limit).space().append(&lim);
    }

    if let Some(off) = offset {
        if has_limit {
            ts.space();
        }
        ts.push(Token::Offset).space().append(&off);
    }

    ts
}

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY.
///
/// With `always_offset`, a missing offset renders as `OFFSET 0 ROWS`
/// (T-SQL cannot FETCH without OFFSET); otherwise it is omitted (Oracle).
pub fn emit_offset_fetch(
    limit: Option<TokenStream>,
    offset: Option<TokenStream>,
    always_offset: bool,
) -> TokenStream {
    let mut ts = TokenStream::new();

    let offset = match offset {
        Some(off) => Some(off),
        None if always_offset => {
            let mut zero = TokenStream::new();
            zero.push(Token::LitInt(0));
            Some(zero)
        }
        None => None,
    };

    let has_offset = offset.is_some();
    if let Some(off) = offset {
        ts.push(Token::Offset)
            .space()
            .append(&off)
            .space()
            .push(Token::Rows);
    }

    if let Some(lim) = limit {
        if has_offset {
            ts.space();
        }
        ts.push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .append(&lim)
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Query functions passed through by name whose spelling differs in T-SQL.
/// Argument order is the same on both sides.
pub fn remap_function_tsql(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "length" => Some("LEN"),
        "locate" => Some("CHARINDEX"),
        "substr" => Some("SUBSTRING"),
        "ceil" => Some("CEILING"),
        _ => None,
    }
}

/// Query function spellings Oracle does not accept.
pub fn remap_function_oracle(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "substring" => Some("SUBSTR"),
        "ceiling" => Some("CEIL"),
        _ => None,
    }
}

/// `length` counts characters, which MySQL spells `CHAR_LENGTH`.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "length" => Some("CHAR_LENGTH"),
        "substr" => Some("SUBSTRING"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words_sorted() {
        let mut sorted = RESERVED_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED_WORDS);
    }

    #[test]
    fn test_needs_quoting() {
        assert!(!needs_quoting("person"));
        assert!(!needs_quoting("p1_0"));
        assert!(!needs_quoting("_hidden"));
        assert!(needs_quoting("order"));
        assert!(needs_quoting("Order"));
        assert!(needs_quoting("1abc"));
        assert!(needs_quoting("first name"));
        assert!(needs_quoting(""));
    }

    #[test]
    fn test_remap_keeps_standard_names() {
        assert_eq!(remap_function_tsql("Length"), Some("LEN"));
        assert_eq!(remap_function_tsql("upper"), None);
        assert_eq!(remap_function_oracle("substring"), Some("SUBSTR"));
        assert_eq!(remap_function_mysql("locate"), None);
    }

    #[test]
    fn test_offset_fetch_without_offset() {
        let mut lim = TokenStream::new();
        lim.push(Token::LitInt(5));
        let oracle = emit_offset_fetch(Some(lim.clone()), None, false);
        assert_eq!(
            oracle.serialize(crate::sql::Dialect::Oracle),
            "FETCH NEXT 5 ROWS ONLY"
        );
        let tsql = emit_offset_fetch(Some(lim), None, true);
        assert_eq!(
            tsql.serialize(crate::sql::Dialect::TSql),
            "OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }
}
