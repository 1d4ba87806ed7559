//! # hqlt
//!
//! Translates HQL/JPQL-style object queries into multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Query text + options                     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [hql: lexer, parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Syntax tree                           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic: binder, path resolver, join index]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Bound query + table groups (per metamodel)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner + filters]
//! ┌─────────────────────────────────────────────────────────┐
//! │              SQL AST + result shape                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql: dialect rendering]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQL text + parameter positions (Arc result)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stage reports into the [`error::ErrorHandler`]; the
//! [`translator::QueryTranslator`] stops after the first stage that leaves
//! errors behind.

pub mod config;
pub mod error;
pub mod filter;
pub mod hql;
pub mod metamodel;
pub mod planner;
pub mod semantic;
pub mod sql;
pub mod translator;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Settings, SettingsError};
    pub use crate::error::TranslationError;
    pub use crate::filter::FilterDefinition;
    pub use crate::metamodel::{
        AttributeDescriptor, EmbeddableType, EntityType, Metamodel, MetamodelError,
        StaticMetamodel, ValueType,
    };
    pub use crate::planner::{ResultItem, ResultMapping, ResultShape};
    pub use crate::semantic::{ParameterDeclaration, ParameterKey, ParameterSource};
    pub use crate::sql::{Dialect, SqlDialect};
    pub use crate::translator::{
        translate, ParameterBinding, QuerySource, QueryTranslator, TranslationOptions,
        TranslationResult,
    };
}

pub use error::TranslationError;
pub use sql::Dialect;
pub use translator::{translate, QuerySource, QueryTranslator, TranslationOptions, TranslationResult};
