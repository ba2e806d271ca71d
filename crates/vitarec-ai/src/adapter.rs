//! Turns model output into a user-facing recommendation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use vitarec_core::{EncodedRecord, LabelEncoder, RawInput};

use crate::error::{InferenceError, PredictionError};
use crate::model::{Classifier, RawLabel};

/// One class's share of the probability mass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f32,
    /// `probability` as a percentage with one decimal place, e.g. `"42.0%"`.
    pub percent: String,
}

impl ClassProbability {
    pub fn new(label: String, probability: f32) -> Self {
        Self {
            percent: format_percent(probability),
            label,
            probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// The recommended vitamin.
    pub label: String,
    /// Per-class confidences in the model's class order; `None` when the
    /// model does not expose probabilities.
    pub probabilities: Option<Vec<ClassProbability>>,
    /// The request as submitted, for echoing back to the form.
    pub input: RawInput,
    pub predicted_at: DateTime<Utc>,
}

impl PredictionResult {
    /// The highest-probability entry, if probabilities are present.
    pub fn top(&self) -> Option<&ClassProbability> {
        self.probabilities.as_ref()?.iter().fold(None, |best, p| match best {
            Some(b) if b.probability >= p.probability => Some(b),
            _ => Some(p),
        })
    }
}

/// Run `model` on one encoded record and decode its answer.
///
/// The record's columns must match `model.feature_names()` exactly.
pub fn predict(
    record: &EncodedRecord,
    model: &dyn Classifier,
    target_encoder: Option<&LabelEncoder>,
    input: &RawInput,
) -> Result<PredictionResult, PredictionError> {
    record.ensure_columns(model.feature_names())?;

    let raw = model.predict(record)?;
    let label = decode(&raw, target_encoder)?;

    let probabilities = match model.predict_proba(record)? {
        Some(p) => {
            let classes = model.classes();
            if p.len() != classes.len() {
                return Err(PredictionError::ProbabilityShape {
                    expected: classes.len(),
                    actual: p.len(),
                });
            }
            if p.iter().any(|v| !v.is_finite()) {
                return Err(InferenceError::NonFinite("probability").into());
            }
            let entries = classes
                .iter()
                .zip(p)
                .map(|(class, prob)| Ok(ClassProbability::new(decode(class, target_encoder)?, prob)))
                .collect::<Result<Vec<_>, PredictionError>>()?;
            Some(entries)
        }
        None => None,
    };

    debug!(
        raw = %raw,
        label = %label,
        with_probabilities = probabilities.is_some(),
        "prediction decoded"
    );
    Ok(PredictionResult {
        label,
        probabilities,
        input: input.clone(),
        predicted_at: Utc::now(),
    })
}

/// Map a raw label to display text.
///
/// Codes go through the target encoder when there is one; text labels are
/// already readable.
pub fn decode(raw: &RawLabel, target_encoder: Option<&LabelEncoder>) -> Result<String, PredictionError> {
    match (raw, target_encoder) {
        (RawLabel::Code(code), Some(encoder)) => encoder
            .inverse_transform(*code)
            .map(str::to_string)
            .ok_or(PredictionError::UnknownClass(*code)),
        (RawLabel::Code(code), None) => Ok(code.to_string()),
        (RawLabel::Text(text), _) => Ok(text.clone()),
    }
}

fn format_percent(probability: f32) -> String {
    format!("{:.1}%", probability * 100.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vitarec_core::{FeatureEncoder, vitamin};

    use super::*;
    use crate::error::{ErrorKind, InferenceError};

    /// Always answers `label`, with optional fixed probabilities.
    struct Stub {
        feature_names: Vec<String>,
        classes: Vec<RawLabel>,
        label: RawLabel,
        proba: Option<Vec<f32>>,
    }

    impl Stub {
        fn new(label: RawLabel, proba: Option<Vec<f32>>) -> Self {
            Self {
                feature_names: vitamin::FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                classes: vec![RawLabel::Code(0), RawLabel::Code(1), RawLabel::Code(2)],
                label,
                proba,
            }
        }
    }

    impl Classifier for Stub {
        fn feature_names(&self) -> &[String] {
            &self.feature_names
        }

        fn classes(&self) -> &[RawLabel] {
            &self.classes
        }

        fn predict(&self, _record: &EncodedRecord) -> Result<RawLabel, InferenceError> {
            Ok(self.label.clone())
        }

        fn predict_proba(&self, _record: &EncodedRecord) -> Result<Option<Vec<f32>>, InferenceError> {
            Ok(self.proba.clone())
        }
    }

    fn target() -> LabelEncoder {
        LabelEncoder::fit(["Calcium", "Vitamin B12", "Vitamin D"])
    }

    fn encoded(input: &RawInput) -> EncodedRecord {
        FeatureEncoder::one_hot(Arc::new(vitamin::schema()))
            .unwrap()
            .encode(input)
            .unwrap()
    }

    #[test]
    fn decodes_code_through_target_encoder() {
        let input = RawInput::from_pairs([("age", "30"), ("gender", "female")]);
        let model = Stub::new(RawLabel::Code(2), Some(vec![0.1, 0.2, 0.7]));
        let result = predict(&encoded(&input), &model, Some(&target()), &input).unwrap();

        assert_eq!(result.label, "Vitamin D");
        assert_eq!(result.input, input);
        let probs = result.probabilities.as_ref().unwrap();
        let labels: Vec<&str> = probs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Calcium", "Vitamin B12", "Vitamin D"]);
        assert_eq!(probs[2].percent, "70.0%");
        assert_eq!(result.top().unwrap().label, result.label);
    }

    #[test]
    fn round_trips_every_class_code() {
        let input = RawInput::new();
        let record = encoded(&input);
        let target = target();
        for class in target.classes() {
            let code = target.transform(class).unwrap();
            let model = Stub::new(RawLabel::Code(code), None);
            let result = predict(&record, &model, Some(&target), &input).unwrap();
            assert_eq!(&result.label, class);
        }
    }

    #[test]
    fn model_without_proba_gives_none() {
        let input = RawInput::new();
        let model = Stub::new(RawLabel::Code(0), None);
        let result = predict(&encoded(&input), &model, Some(&target()), &input).unwrap();
        assert_eq!(result.label, "Calcium");
        assert!(result.probabilities.is_none());
        assert!(result.top().is_none());
    }

    #[test]
    fn text_labels_and_bare_codes() {
        let input = RawInput::new();
        let record = encoded(&input);

        let text = Stub::new(RawLabel::Text("Iron".into()), None);
        assert_eq!(predict(&record, &text, None, &input).unwrap().label, "Iron");

        let code = Stub::new(RawLabel::Code(1), None);
        assert_eq!(predict(&record, &code, None, &input).unwrap().label, "1");
    }

    #[test]
    fn unknown_code_is_an_error() {
        let input = RawInput::new();
        let model = Stub::new(RawLabel::Code(7), None);
        let err = predict(&encoded(&input), &model, Some(&target()), &input).unwrap_err();
        assert!(matches!(err, PredictionError::UnknownClass(7)));
        assert_eq!(err.kind(), ErrorKind::Prediction);
    }

    #[test]
    fn probability_count_must_match_classes() {
        let input = RawInput::new();
        let model = Stub::new(RawLabel::Code(0), Some(vec![0.5, 0.5]));
        let err = predict(&encoded(&input), &model, Some(&target()), &input).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::ProbabilityShape {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn non_finite_probabilities_are_rejected() {
        let input = RawInput::new();
        let model = Stub::new(RawLabel::Code(2), Some(vec![f32::NAN, f32::NAN, f32::NAN]));
        let err = predict(&encoded(&input), &model, Some(&target()), &input).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Inference(InferenceError::NonFinite("probability"))
        ));
        assert_eq!(err.kind(), ErrorKind::Prediction);
        assert_eq!(err.user_message(), crate::error::GENERIC_FAILURE);
    }

    #[test]
    fn column_mismatch_is_caught_before_inference() {
        let input = RawInput::new();
        let mut model = Stub::new(RawLabel::Code(0), None);
        model.feature_names.swap(0, 1);
        let err = predict(&encoded(&input), &model, Some(&target()), &input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn percent_has_one_decimal() {
        assert_eq!(format_percent(0.42), "42.0%");
        assert_eq!(format_percent(1.0), "100.0%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(0.12345), "12.3%");
    }

    #[test]
    fn result_serializes_for_json_output() {
        let input = RawInput::from_pairs([("age", "41")]);
        let model = Stub::new(RawLabel::Code(1), Some(vec![0.25, 0.5, 0.25]));
        let result = predict(&encoded(&input), &model, Some(&target()), &input).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["label"], "Vitamin B12");
        assert_eq!(json["input"]["age"], "41");
        assert_eq!(json["probabilities"][1]["percent"], "50.0%");
        assert!(json["predicted_at"].is_string());
    }
}
