//! ONNX Runtime classifier for exported tree ensembles and other sklearn models.
//!
//! The graph takes one `[1, n_features]` float tensor and emits an `i64`
//! label tensor, plus an optional `[1, n_classes]` float probability tensor
//! (the layout skl2onnx produces with `zipmap` disabled).

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;
use vitarec_core::EncodedRecord;

use crate::error::InferenceError;
use crate::manifest::OnnxIo;
use crate::model::{Classifier, RawLabel, input_row};

pub struct OnnxClassifier {
    session: Mutex<Session>,
    io: OnnxIo,
    feature_names: Vec<String>,
    classes: Vec<RawLabel>,
}

impl OnnxClassifier {
    pub fn load(
        path: &Path,
        io: OnnxIo,
        feature_names: Vec<String>,
        classes: Vec<RawLabel>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(path.exists(), "{} not found", path.display());
        anyhow::ensure!(
            classes.iter().all(|c| matches!(c, RawLabel::Code(_))),
            "onnx classifiers emit integer labels, got text classes"
        );

        let session = Session::builder()?.commit_from_file(path)?;

        let inputs: Vec<&str> = session.inputs().iter().map(|i| i.name()).collect();
        anyhow::ensure!(
            inputs.contains(&io.input.as_str()),
            "model has no input `{}` (inputs: {inputs:?})",
            io.input
        );

        info!(
            features = feature_names.len(),
            classes = classes.len(),
            model = %path.display(),
            "loaded ONNX classifier"
        );
        Ok(Self {
            session: Mutex::new(session),
            io,
            feature_names,
            classes,
        })
    }

    /// Run the graph once, returning the label code and, when requested and
    /// available, the probability row.
    fn run(
        &self,
        record: &EncodedRecord,
        with_proba: bool,
    ) -> Result<(i64, Option<Vec<f32>>), InferenceError> {
        let row = input_row(record, self.feature_names.len())?;
        let shape = [1i64, row.len() as i64];
        let tensor = Tensor::from_array((shape, row.into_boxed_slice())).map_err(runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Runtime("ONNX session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.io.input.as_str() => tensor])
            .map_err(runtime)?;

        let label_value = outputs
            .get(self.io.label_output.as_str())
            .ok_or_else(|| InferenceError::MissingOutput(self.io.label_output.clone()))?;
        let (_, labels) = label_value.try_extract_tensor::<i64>().map_err(runtime)?;
        let label = labels.first().copied().ok_or(InferenceError::EmptyOutput)?;

        let proba = match (&self.io.probability_output, with_proba) {
            (Some(name), true) => {
                let value = outputs
                    .get(name.as_str())
                    .ok_or_else(|| InferenceError::MissingOutput(name.clone()))?;
                let (_, data) = value.try_extract_tensor::<f32>().map_err(runtime)?;
                Some(data.to_vec())
            }
            _ => None,
        };
        Ok((label, proba))
    }
}

fn runtime(err: ort::Error) -> InferenceError {
    InferenceError::Runtime(err.to_string())
}

impl Classifier for OnnxClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classes(&self) -> &[RawLabel] {
        &self.classes
    }

    fn predict(&self, record: &EncodedRecord) -> Result<RawLabel, InferenceError> {
        let (label, _) = self.run(record, false)?;
        Ok(RawLabel::Code(label))
    }

    fn predict_proba(&self, record: &EncodedRecord) -> Result<Option<Vec<f32>>, InferenceError> {
        if self.io.probability_output.is_none() {
            return Ok(None);
        }
        let (_, proba) = self.run(record, true)?;
        Ok(proba)
    }
}
