//! Semantic layer: resolving a parsed query against the metamodel.
//!
//! Binding runs in one pass over the syntax tree:
//!
//! 1. **From** - roots and explicit joins become table groups in the
//!    [`JoinIndex`]; aliases are registered
//! 2. **Paths** - every dotted path is walked by the [`PathResolver`],
//!    joining associations on first use and reusing the group afterwards
//! 3. **Leaves** - identifiers, parameters and literals become
//!    [`BoundExpr`] leaves
//!
//! The result is a [`BoundQuery`] plus the mutable [`TranslationContext`]
//! the producer keeps working with.

pub mod binder;
pub mod bound;
pub mod join_index;
pub mod path;

pub use binder::Binder;
pub use bound::{
    BoundExpr, BoundQuery, BoundSelectItem, BoundSort, ParameterDeclaration, ParameterKey,
    ParameterRegistry, ParameterSlot, ParameterSource,
};
pub use join_index::{ColumnRef, GroupId, GroupKind, JoinIndex, TableGroup};
pub use path::{Clause, CollectionRef, PathResolver, PathTarget, ResolvedPath};

use crate::error::ErrorHandler;

/// Mutable state shared by the binder and the producer for one
/// translation.
#[derive(Debug, Default)]
pub struct TranslationContext {
    pub errors: ErrorHandler,
    pub joins: JoinIndex,
    pub parameters: ParameterRegistry,
}

impl TranslationContext {
    pub fn new() -> Self {
        Self::default()
    }
}
