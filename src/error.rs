//! Error types for quoting and for loading catalog, model and config files

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external scoring collaborator produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    Frequency,
    Severity,
    Uncertainty,
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScorerKind::Frequency => "frequency",
            ScorerKind::Severity => "severity",
            ScorerKind::Uncertainty => "uncertainty",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the quote pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    /// A required profile field is missing or out of range.
    #[error("invalid profile field `{field}`: {reason}")]
    InvalidProfile { field: &'static str, reason: String },

    /// No catalog route covers the business type. Recovered by the default template.
    #[error("no template matches business type `{business_type}`")]
    NoMatchingTemplate { business_type: String },

    /// A scoring collaborator failed or returned an unusable value.
    #[error("{scorer} scorer unavailable: {reason}")]
    ScoringUnavailable { scorer: ScorerKind, reason: String },
}

impl QuoteError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        QuoteError::InvalidProfile { field, reason: reason.into() }
    }

    pub(crate) fn scoring(scorer: ScorerKind, reason: impl Into<String>) -> Self {
        QuoteError::ScoringUnavailable { scorer, reason: reason.into() }
    }
}

/// Failure reported by a scoring collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model produced a non-finite value for `{0}`")]
    NonFinite(&'static str),
}

/// Errors raised while loading catalogs, coefficients, configs or profile batches
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// File parsed but its content breaks an invariant.
    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },
}

impl LoadError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        LoadError::Invalid { what, reason: reason.into() }
    }

    /// The file to load does not exist, as opposed to existing and being unreadable or malformed
    pub fn is_not_found(&self) -> bool {
        match self {
            LoadError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            LoadError::Csv(e) => matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound),
            LoadError::Json(_) | LoadError::Invalid { .. } => false,
        }
    }
}
