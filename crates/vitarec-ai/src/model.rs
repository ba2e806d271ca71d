//! The classifier seam: anything that maps one encoded record to a label.

use std::fmt;

use serde::{Deserialize, Serialize};
use vitarec_core::EncodedRecord;

use crate::error::InferenceError;

/// A label as the model emits it: an integer class code (decoded through
/// the artifact's target encoder) or a ready-to-show string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Code(i64),
    Text(String),
}

impl fmt::Display for RawLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for RawLabel {
    fn from(code: i64) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for RawLabel {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A loaded, immutable classification model.
///
/// Implementations take exactly one row in and give one label out. They are
/// shared across threads, so any interior state needs its own locking.
pub trait Classifier: Send + Sync {
    /// Column names the model was fit on, in input order.
    fn feature_names(&self) -> &[String];

    /// Raw labels in the model's probability output order.
    fn classes(&self) -> &[RawLabel];

    fn predict(&self, record: &EncodedRecord) -> Result<RawLabel, InferenceError>;

    /// Per-class probabilities in [`Classifier::classes`] order, for models
    /// that expose them.
    fn predict_proba(&self, record: &EncodedRecord) -> Result<Option<Vec<f32>>, InferenceError> {
        let _ = record;
        Ok(None)
    }
}

/// Row values of `record`, checked against the model's input width.
pub(crate) fn input_row(
    record: &EncodedRecord,
    expected: usize,
) -> Result<Vec<f32>, InferenceError> {
    let values = record.values();
    if values.len() != expected {
        return Err(InferenceError::FeatureCount {
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_from_codes_or_text() {
        let labels: Vec<RawLabel> = serde_json::from_str(r#"[0, "Vitamin D", 2]"#).unwrap();
        assert_eq!(
            labels,
            vec![
                RawLabel::Code(0),
                RawLabel::Text("Vitamin D".into()),
                RawLabel::Code(2)
            ]
        );
        assert_eq!(labels[1].to_string(), "Vitamin D");
        assert_eq!(labels[2].to_string(), "2");
    }
}
