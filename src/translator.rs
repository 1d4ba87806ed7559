//! End-to-end translation from query text to SQL.
//!
//! ```text
//! Query text → Parse → Bind → Produce SQL AST → Render
//! ```
//!
//! Every stage reports into the translation's error handler; the pipeline
//! stops after the first stage that leaves errors behind and converts them
//! into one [`TranslationError`].
//!
//! # Example
//!
//! ```
//! use hqlt::metamodel::{AttributeDescriptor, EntityType, StaticMetamodel, ValueType};
//! use hqlt::sql::Dialect;
//! use hqlt::translator::{QuerySource, QueryTranslator, TranslationOptions};
//!
//! let metamodel = StaticMetamodel::new().with_entity(
//!     EntityType::new("Person", "person")
//!         .with_attribute(AttributeDescriptor::basic("id", "id", ValueType::Long))
//!         .with_attribute(AttributeDescriptor::basic("name", "name", ValueType::String)),
//! );
//!
//! let options = TranslationOptions::default()
//!     .with_dialect(Dialect::Postgres)
//!     .with_format_sql(false);
//! let translator = QueryTranslator::new(&metamodel, options);
//! let result = translator
//!     .translate(&QuerySource::new("select p.name from Person p where p.id = :id"))
//!     .unwrap();
//!
//! assert_eq!(
//!     result.sql,
//!     "SELECT p1_0.name AS col_0_0_ FROM person AS p1_0 WHERE p1_0.id = ?"
//! );
//! assert_eq!(result.parameters[0].positions, vec![1]);
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::error::{RecognitionError, TranslationError};
use crate::filter::FilterDefinition;
use crate::hql;
use crate::metamodel::{Metamodel, ValueType};
use crate::planner::{ResultShape, SqlPlanner};
use crate::semantic::{Binder, ParameterDeclaration, ParameterKey, ParameterSource, TranslationContext};
use crate::sql::query::Query;
use crate::sql::Dialect;

// ============================================================================
// Inputs
// ============================================================================

/// One translation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySource {
    pub text: String,
    /// Identifies the query in logs and cache keys.
    pub id: Option<String>,
    /// When non-empty, every parameter the query uses must be declared.
    pub parameters: Vec<ParameterDeclaration>,
    /// Filters enabled for this execution.
    pub filters: Vec<FilterDefinition>,
}

impl QuerySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parameter(mut self, declaration: ParameterDeclaration) -> Self {
        self.parameters.push(declaration);
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Options for translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,
    /// Reject HQL extensions JPQL forbids (mixed parameter styles).
    pub strict_jpql_compliance: bool,
    /// Multi-line SQL when true, a single line otherwise.
    pub format_sql: bool,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            strict_jpql_compliance: false,
            format_sql: true,
        }
    }
}

impl TranslationOptions {
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_jpql_compliance = strict;
        self
    }

    pub fn with_format_sql(mut self, format_sql: bool) -> Self {
        self.format_sql = format_sql;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Pipeline progress, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationPhase {
    Unparsed,
    Parsed,
    Bound,
    SqlProduced,
    Rendered,
    Failed,
}

/// A bind slot and every JDBC position it is rendered at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterBinding {
    pub slot: usize,
    pub source: ParameterSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// 1-based positions in the rendered SQL.
    pub positions: Vec<usize>,
}

/// Output of a successful translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sql: String,
    pub dialect: Dialect,
    /// Bind slots in slot order.
    pub parameters: Vec<ParameterBinding>,
    pub shape: ResultShape,
    pub warnings: Vec<String>,
    /// The SQL AST the text was rendered from.
    #[serde(skip)]
    pub query: Query,
}

impl TranslationResult {
    /// The binding for a named or positional query parameter.
    pub fn binding(&self, key: &ParameterKey) -> Option<&ParameterBinding> {
        self.parameters
            .iter()
            .find(|b| b.source.key().as_ref() == Some(key))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Translator
// ============================================================================

/// Translates queries against one metamodel with fixed options.
///
/// Holds no per-query state, so one instance can serve many threads.
pub struct QueryTranslator<'a> {
    metamodel: &'a dyn Metamodel,
    options: TranslationOptions,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(metamodel: &'a dyn Metamodel, options: TranslationOptions) -> Self {
        Self { metamodel, options }
    }

    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    /// Translate one query.
    #[tracing::instrument(name = "translate", skip_all, fields(query_id = ?source.id, dialect = %self.options.dialect))]
    pub fn translate(&self, source: &QuerySource) -> Result<Arc<TranslationResult>, TranslationError> {
        let text = source.text.as_str();
        let mut ctx = TranslationContext::new();
        let mut phase = TranslationPhase::Unparsed;

        // Step 1: Parse
        let parsed = hql::parse(text);
        for diagnostic in parsed.diagnostics {
            ctx.errors
                .report_recognition_error(RecognitionError::new(text, diagnostic.span, diagnostic.message));
        }
        halt_on_errors(&ctx, &mut phase)?;
        let statement = parsed
            .statement
            .ok_or_else(|| TranslationError::Internal("parser produced no statement".into()))?;
        advance(&mut phase, TranslationPhase::Parsed);

        // Step 2: Bind
        let bound = Binder::new(self.metamodel, text, &mut ctx)
            .with_declared_parameters(&source.parameters)
            .strict(self.options.strict_jpql_compliance)
            .bind(&statement);
        halt_on_errors(&ctx, &mut phase)?;
        advance(&mut phase, TranslationPhase::Bound);

        // Step 3: Produce the SQL AST
        let planner = SqlPlanner::new(self.metamodel, self.options.dialect).with_filters(&source.filters);
        let produced = match planner.plan(&bound, &mut ctx) {
            Ok(produced) => produced,
            Err(e) if e.is_semantic() => {
                ctx.errors.report_error(e.to_string());
                halt_on_errors(&ctx, &mut phase)?;
                return Err(TranslationError::Internal(e.to_string()));
            }
            Err(e) => {
                advance(&mut phase, TranslationPhase::Failed);
                return Err(TranslationError::Internal(e.to_string()));
            }
        };
        halt_on_errors(&ctx, &mut phase)?;
        advance(&mut phase, TranslationPhase::SqlProduced);

        // Step 4: Render and number the placeholders
        let dialect = self.options.dialect;
        let tokens = produced.query.to_tokens_for_dialect(dialect);
        let sql = if self.options.format_sql {
            tokens.serialize(dialect)
        } else {
            tokens.serialize_compact(dialect)
        };

        let mut parameters: Vec<ParameterBinding> = ctx
            .parameters
            .slots()
            .iter()
            .enumerate()
            .map(|(slot, s)| ParameterBinding {
                slot,
                source: s.source.clone(),
                value_type: s.value_type,
                positions: vec![],
            })
            .collect();
        for (index, slot) in tokens.placeholders().into_iter().enumerate() {
            match parameters.get_mut(slot) {
                Some(binding) => binding.positions.push(index + 1),
                None => {
                    return Err(TranslationError::Internal(format!(
                        "placeholder for unknown slot {}",
                        slot
                    )))
                }
            }
        }
        advance(&mut phase, TranslationPhase::Rendered);

        Ok(Arc::new(TranslationResult {
            id: source.id.clone(),
            sql,
            dialect,
            parameters,
            shape: produced.shape,
            warnings: ctx.errors.take_warnings(),
            query: produced.query,
        }))
    }
}

/// Translate one query with a throwaway translator.
pub fn translate(
    source: &QuerySource,
    metamodel: &dyn Metamodel,
    options: TranslationOptions,
) -> Result<Arc<TranslationResult>, TranslationError> {
    QueryTranslator::new(metamodel, options).translate(source)
}

fn advance(phase: &mut TranslationPhase, next: TranslationPhase) {
    tracing::debug!(from = ?*phase, to = ?next, "translation phase");
    *phase = next;
}

/// Stop the pipeline once any stage has reported an error.
fn halt_on_errors(ctx: &TranslationContext, phase: &mut TranslationPhase) -> Result<(), TranslationError> {
    if ctx.errors.has_errors() {
        tracing::debug!(phase = ?*phase, errors = ctx.errors.error_count(), "translation halted");
        *phase = TranslationPhase::Failed;
    }
    ctx.errors.throw_if_errors()
}
