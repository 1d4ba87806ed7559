//! Diagnostics collected during a translation.
//!
//! Every stage reports into one [`ErrorHandler`]. Syntax (recognition)
//! errors carry a source position; semantic errors are plain messages.
//! [`ErrorHandler::throw_if_errors`] decides the final outcome:
//!
//! - no errors: success, whatever the warnings
//! - at least one recognition error: [`TranslationError::Syntax`] built from
//!   the first recognition error reported
//! - otherwise: [`TranslationError::Semantic`] with every message in report
//!   order

use serde::Serialize;
use thiserror::Error;

use crate::hql::{Position, Span};

/// The error returned by a failed translation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    /// The query text does not match the grammar.
    #[error("syntax error at {position}: {message}")]
    Syntax { position: Position, message: String },

    /// The query parsed but could not be bound or produced.
    #[error("{}", .0.join("\n"))]
    Semantic(Vec<String>),

    /// An invariant was violated after a stage that should have prevented it.
    #[error("internal translator error: {0}")]
    Internal(String),
}

impl TranslationError {
    /// Messages carried by this error, one per reported problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            TranslationError::Syntax { message, .. } => vec![message.clone()],
            TranslationError::Semantic(messages) => messages.clone(),
            TranslationError::Internal(message) => vec![message.clone()],
        }
    }
}

/// A grammar violation at a known location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionError {
    pub span: Span,
    pub position: Position,
    pub message: String,
}

impl RecognitionError {
    /// Build an error for `span`, locating its line and column in `source`.
    pub fn new(source: &str, span: Span, message: impl Into<String>) -> Self {
        Self {
            position: Position::locate(source, span.start),
            span,
            message: message.into(),
        }
    }

    /// Render this error over the query text with `ariadne`.
    ///
    /// Output is uncolored so it can be logged or stored.
    pub fn render(&self, source_name: &str, source: &str) -> String {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let span = self.span.start.min(source.len())..self.span.end.min(source.len());
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, (source_name, span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(&self.message)
            .with_label(Label::new((source_name, span)).with_message(&self.message))
            .finish()
            .write((source_name, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => format!("error at {}: {}", self.position, self.message),
        }
    }
}

/// One entry in the error list.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportedError {
    Recognition(RecognitionError),
    Message(String),
}

impl ReportedError {
    pub fn message(&self) -> &str {
        match self {
            ReportedError::Recognition(e) => &e.message,
            ReportedError::Message(m) => m,
        }
    }
}

/// Accumulates errors and warnings for one translation.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    errors: Vec<ReportedError>,
    warnings: Vec<String>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_recognition_error(&mut self, error: RecognitionError) {
        tracing::debug!(position = %error.position, message = %error.message, "syntax error");
        self.errors.push(ReportedError::Recognition(error));
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "semantic error");
        self.errors.push(ReportedError::Message(message));
    }

    pub fn report_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "translation warning");
        self.warnings.push(message);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ReportedError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Hand the collected warnings to the caller.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Convert the collected errors into the translation outcome.
    pub fn throw_if_errors(&self) -> Result<(), TranslationError> {
        if self.errors.is_empty() {
            return Ok(());
        }

        let first_recognition = self.errors.iter().find_map(|e| match e {
            ReportedError::Recognition(r) => Some(r),
            ReportedError::Message(_) => None,
        });

        match first_recognition {
            Some(r) => Err(TranslationError::Syntax {
                position: r.position,
                message: r.message.clone(),
            }),
            None => Err(TranslationError::Semantic(
                self.errors.iter().map(|e| e.message().to_string()).collect(),
            )),
        }
    }
}
