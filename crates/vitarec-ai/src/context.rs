//! Loaded model state and the degraded-mode wrapper around it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use vitarec_core::{FeatureEncoder, LabelEncoder, RawInput};

use crate::adapter::{self, PredictionResult};
use crate::error::{ModelUnavailable, PredictionError};
use crate::manifest::{self, ModelManifest};
use crate::model::{Classifier, RawLabel};

/// How hard to try when loading a model artifact at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Everything needed to serve predictions, loaded once and then read-only.
///
/// Construction cross-checks the pieces so a mismatched artifact fails at
/// startup rather than on the first request.
pub struct PredictionContext {
    model: Arc<dyn Classifier>,
    target_encoder: Option<LabelEncoder>,
    encoder: FeatureEncoder,
}

impl PredictionContext {
    pub fn new(
        model: Arc<dyn Classifier>,
        target_encoder: Option<LabelEncoder>,
        encoder: FeatureEncoder,
    ) -> anyhow::Result<Self> {
        encoder.check_against(model.feature_names())?;

        if let Some(target) = &target_encoder {
            for class in model.classes() {
                match class {
                    RawLabel::Code(code) => anyhow::ensure!(
                        target.inverse_transform(*code).is_some(),
                        "model class {code} is outside the target encoder ({} classes)",
                        target.len()
                    ),
                    RawLabel::Text(text) => {
                        warn!(class = %text, "text class label ignores the target encoder")
                    }
                }
            }
        }

        Ok(Self {
            model,
            target_encoder,
            encoder,
        })
    }

    /// Load an artifact directory: manifest, schema, encoders, model.
    pub async fn load(dir: &Path) -> anyhow::Result<Self> {
        let manifest = ModelManifest::load(dir).await?;
        let schema = manifest::load_schema(dir).await?;
        let encoder = FeatureEncoder::new(Arc::new(schema), &manifest.category_encoders)?;
        let model = manifest.load_classifier(dir).await?;
        let context = Self::new(model, manifest.target_encoder, encoder)?;
        info!(
            dir = %dir.display(),
            features = context.encoder.feature_names().len(),
            classes = context.model.classes().len(),
            "prediction context ready"
        );
        Ok(context)
    }

    /// [`load`](Self::load), retried with a fixed delay between attempts.
    pub async fn load_with_retry(
        dir: &Path,
        options: LoadOptions,
    ) -> Result<Self, ModelUnavailable> {
        let attempts = options.attempts.max(1);
        let mut reason = String::new();
        for attempt in 1..=attempts {
            match Self::load(dir).await {
                Ok(context) => return Ok(context),
                Err(e) => {
                    reason = format!("{e:#}");
                    warn!(attempt, attempts, error = %reason, "failed to load model");
                    if attempt < attempts {
                        tokio::time::sleep(options.delay).await;
                    }
                }
            }
        }
        Err(ModelUnavailable {
            dir: dir.to_path_buf(),
            attempts,
            reason,
        })
    }

    /// Encode one request and run it through the model.
    pub fn predict(&self, raw: &RawInput) -> Result<PredictionResult, PredictionError> {
        let record = self.encoder.encode(raw)?;
        adapter::predict(
            &record,
            self.model.as_ref(),
            self.target_encoder.as_ref(),
            raw,
        )
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn target_encoder(&self) -> Option<&LabelEncoder> {
        self.target_encoder.as_ref()
    }
}

/// Readiness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Health {
    Ready { features: usize, classes: usize },
    Degraded { reason: String },
}

impl Health {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// A prediction service that keeps running without a model.
///
/// Startup never fails; if the artifact cannot be loaded every request is
/// answered with [`PredictionError::ModelUnavailable`].
pub struct Recommender {
    state: Result<PredictionContext, ModelUnavailable>,
}

impl Recommender {
    pub async fn start(dir: &Path, options: LoadOptions) -> Self {
        let state = PredictionContext::load_with_retry(dir, options).await;
        if let Err(e) = &state {
            warn!(error = %e, "starting without a model");
        }
        Self { state }
    }

    pub fn with_context(context: PredictionContext) -> Self {
        Self { state: Ok(context) }
    }

    pub fn degraded(err: ModelUnavailable) -> Self {
        Self { state: Err(err) }
    }

    pub fn context(&self) -> Option<&PredictionContext> {
        self.state.as_ref().ok()
    }

    pub fn recommend(&self, raw: &RawInput) -> Result<PredictionResult, PredictionError> {
        match &self.state {
            Ok(context) => context.predict(raw),
            Err(e) => Err(PredictionError::ModelUnavailable(e.clone())),
        }
    }

    pub fn health(&self) -> Health {
        match &self.state {
            Ok(context) => Health::Ready {
                features: context.encoder.feature_names().len(),
                classes: context.model.classes().len(),
            },
            Err(e) => Health::Degraded {
                reason: e.to_string(),
            },
        }
    }
}
