//! Shared helpers for the integration tests.

#![allow(dead_code)]

use hqlt::metamodel::StaticMetamodel;
use hqlt::translator::{translate, QuerySource, TranslationOptions, TranslationResult};
use hqlt::{Dialect, TranslationError};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::sync::Arc;

pub const MODEL_TOML: &str = include_str!("../fixtures/model.toml");

/// The descriptor table every integration test translates against.
pub fn metamodel() -> StaticMetamodel {
    StaticMetamodel::from_toml_str(MODEL_TOML).expect("fixture metamodel should load")
}

/// Single-line output for `dialect`.
pub fn compact(dialect: Dialect) -> TranslationOptions {
    TranslationOptions::default()
        .with_dialect(dialect)
        .with_format_sql(false)
}

pub fn try_translate(query: &str, dialect: Dialect) -> Result<Arc<TranslationResult>, TranslationError> {
    translate(&QuerySource::new(query), &metamodel(), compact(dialect))
}

/// Translate and return the SQL, failing the test on any error.
pub fn sql(query: &str, dialect: Dialect) -> String {
    match try_translate(query, dialect) {
        Ok(result) => result.sql.clone(),
        Err(e) => panic!("translation of `{}` failed: {}", query, e),
    }
}

/// Assert that `sql` parses as a single SQL statement.
pub fn assert_valid_sql(sql: &str) {
    match Parser::parse_sql(&GenericDialect {}, sql) {
        Ok(statements) => assert_eq!(statements.len(), 1, "expected one statement: {}", sql),
        Err(e) => panic!("generated SQL does not parse: {}\n{}", e, sql),
    }
}

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
