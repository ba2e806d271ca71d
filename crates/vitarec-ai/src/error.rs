use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use vitarec_core::{EncodeError, SchemaMismatch, ValidationError};

/// Message shown when no model is available.
pub const MODEL_NOT_LOADED: &str = "Model not loaded";

/// Message shown for every failure the user cannot fix.
pub const GENERIC_FAILURE: &str = "Error processing your request";

/// The classifier call itself failed.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("model produced no `{0}` output")]
    MissingOutput(String),

    #[error("model produced an empty prediction")]
    EmptyOutput,

    #[error("model produced a non-finite {0}")]
    NonFinite(&'static str),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("inference runtime error: {0}")]
    Runtime(String),
}

/// The model artifact could not be loaded, even after retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model unavailable at {} after {attempts} attempt(s): {reason}", .dir.display())]
pub struct ModelUnavailable {
    pub dir: PathBuf,
    pub attempts: u32,
    pub reason: String,
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SchemaMismatch,
    ModelUnavailable,
    Prediction,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("model returned class code {0}, which the target encoder does not know")]
    UnknownClass(i64),

    #[error("model returned {actual} probabilities for {expected} classes")]
    ProbabilityShape { expected: usize, actual: usize },
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::Inference(_) | Self::UnknownClass(_) | Self::ProbabilityShape { .. } => {
                ErrorKind::Prediction
            }
        }
    }

    /// Text safe to show the person who submitted the form.
    ///
    /// Validation failures name the field; everything else is generic.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::ModelUnavailable(_) => MODEL_NOT_LOADED.to_string(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<EncodeError> for PredictionError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Validation(e) => Self::Validation(e),
            EncodeError::SchemaMismatch(e) => Self::SchemaMismatch(e),
            EncodeError::Arrow(e) => Self::Inference(InferenceError::Arrow(e)),
            e @ EncodeError::SlotMismatch(_) => {
                Self::Inference(InferenceError::Runtime(e.to_string()))
            }
        }
    }
}
