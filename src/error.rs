//! Error taxonomy, issue aggregation, and the error-formatting boundary.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors at schema-construction time.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("duplicate field \"{name}\" in object schema")]
    DuplicateField { name: String },

    #[error("field \"{name}\" cannot be both required and forbidden")]
    RequiredForbidden { name: String },

    #[error("invalid pattern: {source}")]
    InvalidPattern {
        #[source]
        source: regex::Error,
    },
}

/// Classification of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingRequiredField,
    TypeMismatch,
    /// Length, range, pattern, or enumeration violation.
    ConstraintViolation,
    ForbiddenFieldPresent,
    CustomValidationFailed,
    MutualExclusionViolated,
    AtLeastOneRequired,
    AsyncValidationFailed,
}

/// One step of a path into the validated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Render segments as a JSON-Pointer style path, `/items/0/name`.
/// An empty path renders as `/`.
pub fn path_to_string(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in path {
        out.push('/');
        match segment {
            PathSegment::Key(key) => out.push_str(key),
            PathSegment::Index(i) => out.push_str(&i.to_string()),
        }
    }
    out
}

/// Single validation issue with path context.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    /// Ordered field/index segments from the root to the offending value.
    pub path: Vec<PathSegment>,
    /// Human-readable error message.
    pub message: String,
    pub kind: ErrorKind,
    /// Localization key of the field, if one was attached to its spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_key: Option<String>,
}

impl ValidationIssue {
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>, kind: ErrorKind) -> Self {
        ValidationIssue {
            path,
            message: message.into(),
            kind,
            translation_key: None,
        }
    }

    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.message)
    }
}

/// Aggregate of every issue found in a single validation pass.
///
/// Callers must not assume only the first issue is meaningful: sibling
/// fields are checked exhaustively, so the list covers the whole input.
#[derive(Debug, Clone, Error)]
#[error("validation failed with {} issue(s)", issues.len())]
pub struct AggregateError {
    pub issues: Vec<ValidationIssue>,
}

impl AggregateError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        debug_assert!(!issues.is_empty());
        AggregateError { issues }
    }
}

/// Errors from the typed projection surface ([`crate::validator::validate_as`]).
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Validation(#[from] AggregateError),

    #[error("validated value does not fit the target type: {source}")]
    Projection {
        #[source]
        source: serde_json::Error,
    },
}

/// Maps a field's translation key to a display string.
pub type TranslationMap = HashMap<String, String>;

/// Display form of an aggregate error, ready for a response boundary.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedError {
    pub message: String,
    pub details: Vec<FormattedIssue>,
}

/// Display form of a single issue.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedIssue {
    pub path: String,
    pub message: String,
    pub kind: ErrorKind,
}

/// Format an aggregate for display.
///
/// When `translations` is given, an issue whose field carries a
/// translation key uses the registered display string; fields without a
/// registered key fall back to the engine's default message. Localization
/// never changes validation outcome, only this rendering.
pub fn format_error(
    error: &AggregateError,
    translations: Option<&TranslationMap>,
) -> FormattedError {
    let details = error
        .issues
        .iter()
        .map(|issue| {
            let message = issue
                .translation_key
                .as_ref()
                .and_then(|key| translations.and_then(|map| map.get(key)))
                .cloned()
                .unwrap_or_else(|| issue.message.clone());
            FormattedIssue {
                path: issue.path_string(),
                message,
                kind: issue.kind,
            }
        })
        .collect();

    FormattedError {
        message: error.to_string(),
        details,
    }
}
