//! Inference layer: model artifacts, classifiers, and the prediction adapter.
//!
//! A model artifact directory is loaded once into a [`PredictionContext`],
//! which owns the classifier, the target encoder and the feature encoder.
//! [`Recommender`] wraps it with an explicit degraded state for callers that
//! must keep serving when the artifact is missing.

pub mod adapter;
pub mod context;
pub mod error;
pub mod linear;
pub mod manifest;
pub mod model;
#[cfg(feature = "onnx")]
mod onnx;

pub use adapter::{ClassProbability, PredictionResult, predict};
pub use context::{Health, LoadOptions, PredictionContext, Recommender};
pub use error::{ErrorKind, InferenceError, ModelUnavailable, PredictionError};
pub use linear::{LinearClassifier, LinearWeights};
pub use manifest::{ModelFormat, ModelManifest, OnnxIo};
pub use model::{Classifier, RawLabel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
