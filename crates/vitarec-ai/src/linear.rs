//! Pure-Rust multinomial logistic regression.
//!
//! Evaluates a fitted linear model exported as plain coefficients, the
//! shape a scikit-learn `LogisticRegression` takes: one coefficient row per
//! class (or a single row for a two-class model) plus one intercept per row.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use vitarec_core::EncodedRecord;

use crate::error::InferenceError;
use crate::model::{Classifier, RawLabel, input_row};

/// Contents of a `linear` model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub coefficients: Vec<Vec<f32>>,
    pub intercepts: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct LinearClassifier {
    feature_names: Vec<String>,
    classes: Vec<RawLabel>,
    weights: LinearWeights,
}

impl LinearClassifier {
    /// Check the weight shapes against the feature and class lists.
    pub fn new(
        feature_names: Vec<String>,
        classes: Vec<RawLabel>,
        weights: LinearWeights,
    ) -> anyhow::Result<Self> {
        let rows = weights.coefficients.len();
        anyhow::ensure!(classes.len() >= 2, "a classifier needs at least two classes");
        anyhow::ensure!(
            rows == classes.len() || (rows == 1 && classes.len() == 2),
            "{rows} coefficient rows for {} classes",
            classes.len()
        );
        anyhow::ensure!(
            weights.intercepts.len() == rows,
            "{} intercepts for {rows} coefficient rows",
            weights.intercepts.len()
        );
        for (i, row) in weights.coefficients.iter().enumerate() {
            anyhow::ensure!(
                row.len() == feature_names.len(),
                "coefficient row {i} has {} values, expected {}",
                row.len(),
                feature_names.len()
            );
        }
        anyhow::ensure!(
            weights
                .coefficients
                .iter()
                .flatten()
                .chain(&weights.intercepts)
                .all(|w| w.is_finite()),
            "weights must be finite"
        );

        Ok(Self {
            feature_names,
            classes,
            weights,
        })
    }

    /// Load weights from a JSON file.
    pub async fn load(
        path: &Path,
        feature_names: Vec<String>,
        classes: Vec<RawLabel>,
    ) -> anyhow::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let weights: LinearWeights =
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        let model = Self::new(feature_names, classes, weights)?;
        info!(
            features = model.feature_names.len(),
            classes = model.classes.len(),
            model = %path.display(),
            "loaded linear classifier"
        );
        Ok(model)
    }

    /// One score per coefficient row, accumulated in f64 so that large
    /// but finite inputs cannot overflow.
    fn decision_function(&self, x: &[f32]) -> Vec<f64> {
        self.weights
            .coefficients
            .iter()
            .zip(&self.weights.intercepts)
            .map(|(row, &b)| {
                row.iter()
                    .zip(x)
                    .map(|(&w, &v)| f64::from(w) * f64::from(v))
                    .sum::<f64>()
                    + f64::from(b)
            })
            .collect()
    }

    fn probabilities(&self, x: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let scores = self.decision_function(x);
        if scores.iter().any(|z| !z.is_finite()) {
            return Err(InferenceError::NonFinite("decision score"));
        }
        let p = if let &[z] = scores.as_slice() {
            let p = sigmoid(z);
            vec![1.0 - p, p]
        } else {
            softmax(&scores)
        };
        let p: Vec<f32> = p.into_iter().map(|v| v as f32).collect();
        if p.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite("probability"));
        }
        Ok(p)
    }
}

impl Classifier for LinearClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classes(&self) -> &[RawLabel] {
        &self.classes
    }

    fn predict(&self, record: &EncodedRecord) -> Result<RawLabel, InferenceError> {
        let x = input_row(record, self.feature_names.len())?;
        let best = argmax(&self.probabilities(&x)?).ok_or(InferenceError::EmptyOutput)?;
        Ok(self.classes[best].clone())
    }

    fn predict_proba(&self, record: &EncodedRecord) -> Result<Option<Vec<f32>>, InferenceError> {
        let x = input_row(record, self.feature_names.len())?;
        self.probabilities(&x).map(Some)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.iter().map(|&e| e / sum).collect()
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
