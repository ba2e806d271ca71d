//! Model artifact manifest.
//!
//! An artifact directory holds `manifest.json`, the model file it names,
//! and optionally `schema.json`. The manifest carries everything needed to
//! line the encoder up with the model: input column names, class labels,
//! and the fitted target and category encoders.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vitarec_core::{FeatureSchema, LabelEncoder, vitamin};

use crate::linear::LinearClassifier;
use crate::model::{Classifier, RawLabel};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SCHEMA_FILE: &str = "schema.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Coefficients and intercepts in JSON, evaluated in-process.
    Linear,
    /// An ONNX graph run through ONNX Runtime.
    Onnx,
}

impl ModelFormat {
    pub fn default_file(self) -> &'static str {
        match self {
            Self::Linear => "model.json",
            Self::Onnx => "model.onnx",
        }
    }
}

/// Tensor names of an ONNX classifier graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnnxIo {
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_label_output")]
    pub label_output: String,
    #[serde(default)]
    pub probability_output: Option<String>,
}

fn default_input() -> String {
    "float_input".to_string()
}

fn default_label_output() -> String {
    "output_label".to_string()
}

impl Default for OnnxIo {
    fn default() -> Self {
        Self {
            input: default_input(),
            label_output: default_label_output(),
            probability_output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub format: ModelFormat,
    /// Model file relative to the artifact directory. Defaults per format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
    pub feature_names: Vec<String>,
    pub classes: Vec<RawLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_encoder: Option<LabelEncoder>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub category_encoders: HashMap<String, LabelEncoder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onnx: Option<OnnxIo>,
}

impl ModelManifest {
    /// Read and check `manifest.json` in `dir`.
    pub async fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        anyhow::ensure!(path.exists(), "{MANIFEST_FILE} not found in {dir:?}");
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let manifest: Self =
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        manifest.validate()?;
        debug!(
            format = ?manifest.format,
            features = manifest.feature_names.len(),
            classes = manifest.classes.len(),
            "read model manifest"
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.feature_names.is_empty(), "manifest lists no features");
        let mut seen = HashSet::new();
        for name in &self.feature_names {
            anyhow::ensure!(seen.insert(name), "duplicate feature {name:?} in manifest");
        }
        anyhow::ensure!(!self.classes.is_empty(), "manifest lists no classes");
        let distinct: HashSet<_> = self.classes.iter().collect();
        anyhow::ensure!(
            distinct.len() == self.classes.len(),
            "duplicate class in manifest"
        );
        if self.format == ModelFormat::Onnx {
            anyhow::ensure!(
                self.classes.iter().all(|c| matches!(c, RawLabel::Code(_))),
                "onnx models emit integer labels, so manifest classes must be integer codes"
            );
        }
        Ok(())
    }

    pub fn model_path(&self, dir: &Path) -> PathBuf {
        dir.join(
            self.model_file
                .as_deref()
                .unwrap_or(self.format.default_file()),
        )
    }

    /// Load the classifier this manifest describes.
    pub async fn load_classifier(&self, dir: &Path) -> anyhow::Result<Arc<dyn Classifier>> {
        let path = self.model_path(dir);
        anyhow::ensure!(path.exists(), "model file {} not found", path.display());
        match self.format {
            ModelFormat::Linear => {
                let model =
                    LinearClassifier::load(&path, self.feature_names.clone(), self.classes.clone())
                        .await?;
                Ok(Arc::new(model))
            }
            ModelFormat::Onnx => self.load_onnx(&path),
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path) -> anyhow::Result<Arc<dyn Classifier>> {
        let model = crate::onnx::OnnxClassifier::load(
            path,
            self.onnx.clone().unwrap_or_default(),
            self.feature_names.clone(),
            self.classes.clone(),
        )?;
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path) -> anyhow::Result<Arc<dyn Classifier>> {
        anyhow::bail!(
            "{} is an ONNX model but this build has no ONNX Runtime support (enable the `onnx` feature)",
            path.display()
        )
    }
}

/// The artifact's `schema.json`, or the built-in vitamin schema when absent.
pub async fn load_schema(dir: &Path) -> anyhow::Result<FeatureSchema> {
    let path = dir.join(SCHEMA_FILE);
    if !path.exists() {
        debug!(dir = %dir.display(), "no schema.json, using the built-in vitamin schema");
        return Ok(vitamin::schema());
    }
    let json = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    FeatureSchema::from_json_str(&json).with_context(|| format!("loading {}", path.display()))
}
