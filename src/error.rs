//! Error taxonomy.
//!
//! Each component has its own error enum; [`EvaluationError`] wraps them with
//! the location of the element being evaluated when the failure happened.
//! Semantic condition failures (a relational operator over non-numeric text)
//! are not errors at all: the condition is simply false.

use crate::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or unsupported expression syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("unbalanced '{opener}' at offset {position} in \"{expression}\"")]
    Unbalanced { opener: &'static str, position: usize, expression: String },

    #[error("malformed expression \"{expression}\": {reason}")]
    Malformed { expression: String, reason: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("invalid arguments to '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("invalid condition \"{condition}\": {reason}")]
    InvalidCondition { condition: String, reason: String },

    #[error("expansion of \"{expression}\" exceeded the nesting limit")]
    RecursionLimit { expression: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobError {
    #[error("invalid wildcard pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("circular import: {}", format_chain(.chain))]
    Cycle { chain: Vec<PathBuf> },

    #[error("imported project \"{}\" was not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("imported project \"{}\" is invalid: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },

    #[error("import has an empty Project attribute")]
    EmptyProject,
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> ")
}

/// Failure to read or parse a project document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("\"{}\" is not well-formed XML: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("{location}: {reason}")]
    Structure { location: Location, reason: String },

    #[error("project \"{}\" is not available", .path.display())]
    NotFound { path: PathBuf },
}

/// Fatal failure of an evaluation run. No snapshot is published.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{location}: {source}")]
    Expression {
        location: Location,
        #[source]
        source: ExpressionError,
    },

    #[error("{location}: {source}")]
    Glob {
        location: Location,
        #[source]
        source: GlobError,
    },

    #[error("{location}: {source}")]
    Import {
        location: Location,
        #[source]
        source: ImportError,
    },
}

impl EvaluationError {
    pub fn location(&self) -> &Location {
        match self {
            EvaluationError::Expression { location, .. }
            | EvaluationError::Glob { location, .. }
            | EvaluationError::Import { location, .. } => location,
        }
    }

    pub(crate) fn expression(location: &Location) -> impl FnOnce(ExpressionError) -> EvaluationError + '_ {
        move |source| EvaluationError::Expression { location: location.clone(), source }
    }

    pub(crate) fn glob(location: &Location) -> impl FnOnce(GlobError) -> EvaluationError + '_ {
        move |source| EvaluationError::Glob { location: location.clone(), source }
    }

    pub(crate) fn import(location: &Location, source: ImportError) -> EvaluationError {
        EvaluationError::Import { location: location.clone(), source }
    }
}
