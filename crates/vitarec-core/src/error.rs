use std::path::PathBuf;

use thiserror::Error;

/// Why a single raw value was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Invalid {
    #[error("a value is required")]
    Empty,

    #[error("expected a number, got {0:?}")]
    NotNumeric(String),

    #[error("expected a finite number, got {0:?}")]
    NotFinite(String),

    #[error("{value} is outside the allowed range {}", describe_bounds(.min, .max))]
    OutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("expected one of {allowed:?}, got {value:?}")]
    UnknownToken { value: String, allowed: Vec<String> },

    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    #[error("expected a single value, got {0}")]
    MultipleValues(usize),
}

/// User input that cannot be encoded. Recoverable: the request is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: Invalid,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: Invalid) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Encoded columns disagree with what the model was fit on.
///
/// A configuration defect, never a user input problem.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", describe_mismatch(.expected, .actual))]
pub struct SchemaMismatch {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

impl SchemaMismatch {
    /// Compare two column lists, returning a mismatch unless they are identical.
    pub fn check(expected: &[String], actual: &[String]) -> Result<(), Self> {
        if expected == actual {
            return Ok(());
        }
        Err(Self {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }

    /// First position at which the two column lists differ.
    pub fn first_difference(&self) -> usize {
        first_difference(&self.expected, &self.actual)
    }
}

/// Invalid schema or encoder configuration, detected at load time.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema has no fields")]
    Empty,

    #[error("field name must not be empty")]
    EmptyName,

    #[error("duplicate field `{0}`")]
    DuplicateField(String),

    #[error("duplicate feature column `{0}`")]
    DuplicateColumn(String),

    #[error("field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("field `{field}`: default is not valid: {reason}")]
    InvalidDefault { field: String, reason: Invalid },

    #[error("field `{0}` uses ordinal encoding but no category encoder was provided for it")]
    MissingCategoryEncoder(String),

    #[error("duplicate class {0:?} in label encoder")]
    DuplicateClass(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A field resolved to a value its precomputed column slot cannot hold.
    #[error("field `{0}` does not fit its encoded column layout")]
    SlotMismatch(String),
}

fn describe_bounds(min: &Option<f64>, max: &Option<f64>) -> String {
    match (*min, *max) {
        (Some(lo), Some(hi)) => format!("{lo}..={hi}"),
        (Some(lo), None) => format!("{lo}.."),
        (None, Some(hi)) => format!("..={hi}"),
        (None, None) => "..".to_string(),
    }
}

fn first_difference(expected: &[String], actual: &[String]) -> usize {
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .unwrap_or_else(|| expected.len().min(actual.len()))
}

fn describe_mismatch(expected: &[String], actual: &[String]) -> String {
    let position = first_difference(expected, actual);
    let want = expected.get(position).map_or("<none>", String::as_str);
    let got = actual.get(position).map_or("<none>", String::as_str);
    format!(
        "feature columns disagree with model input at position {position}: \
         expected `{want}`, got `{got}` ({} columns, model expects {})",
        actual.len(),
        expected.len()
    )
}
