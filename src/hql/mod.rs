//! Object query language front end.
//!
//! This module provides the lexer, parser and syntax tree for HQL/JPQL-style
//! queries. The grammar covers:
//!
//! - **Select**: `select [distinct] expr [[as] alias], ...` (optional)
//! - **From**: entity roots with aliases, explicit `[left|inner] join [fetch]`
//!   declarations, `elements(...)` / `indices(...)` qualifiers and `with`
//!   conditions
//! - **Where / Group By / Having / Order By**: predicates over dotted paths,
//!   parameters (`:name`, `?1`), literals, functions and `case` expressions
//! - **Limit / Offset**: integer literals or parameters
//!
//! # Example
//!
//! ```
//! use hqlt::hql;
//!
//! let result = hql::parse("from Person p where p.name = :name order by p.age");
//! assert!(result.is_ok());
//! let statement = result.statement.unwrap();
//! assert_eq!(statement.from.roots[0].entity.value, "Person");
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::*;
pub use span::{Position, Span, Spanned};

/// Result of parsing a query.
#[derive(Debug)]
pub struct ParseResult {
    /// The parsed statement, if the parser produced one.
    pub statement: Option<SelectStatement>,
    /// Syntax errors from lexing and parsing, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    /// Returns true if parsing succeeded without errors.
    pub fn is_ok(&self) -> bool {
        self.statement.is_some() && self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// A syntax error with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {:?})", self.message, self.span)
    }
}

/// Parse a query string.
///
/// Lexing recovers from unknown characters and parsing recovers inside
/// parentheses, so a single call may report several diagnostics.
pub fn parse(source: &str) -> ParseResult {
    use chumsky::error::Rich;
    use chumsky::input::Input;
    use chumsky::span::SimpleSpan;
    use chumsky::span::Span as _;
    use chumsky::Parser as _;

    // Step 1: Lexical analysis
    let (tokens, lex_errs) = lexer::lexer().parse(source).into_output_errors();

    let mut diagnostics: Vec<Diagnostic> = lex_errs
        .into_iter()
        .map(|e: Rich<'_, char>| {
            let span = e.span();
            Diagnostic::new(span.start()..span.end(), e.to_string())
        })
        .collect();

    let mut tokens: Vec<(lexer::Token<'_>, SimpleSpan)> = match tokens {
        Some(t) => t,
        None => {
            return ParseResult {
                statement: None,
                diagnostics,
            };
        }
    };

    lexer::identify_soft_keywords(source, &mut tokens);

    // Step 2: Parsing
    let len = source.len();
    let eoi: SimpleSpan = (len..len).into();
    let token_stream = tokens.as_slice().map(
        eoi,
        |(tok, span): &(lexer::Token<'_>, SimpleSpan)| (tok, span),
    );

    let (statement, parse_errs) = parser::parser().parse(token_stream).into_output_errors();

    diagnostics.extend(
        parse_errs
            .into_iter()
            .map(|e: Rich<'_, lexer::Token<'_>, SimpleSpan>| {
                let span = e.span();
                Diagnostic::new(span.start()..span.end(), e.to_string())
            }),
    );
    diagnostics.sort_by_key(|d| d.span.start);

    ParseResult {
        statement,
        diagnostics,
    }
}
