//! Nearest-centroid move classifier.
//!
//! Features are standardized with the model's scaler, then compared to one
//! centroid per label. Confidence is the softmax of negative distances.

use crate::classifier::{ClassificationError, Classifier, MoveLabel, Prediction};
use crate::core::features::{extract_features, FEATURE_LEN};
use crate::core::windowing::Window;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading or validating a model file.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("model was trained on windows of {model} samples, detector uses {configured}")]
    WindowMismatch { model: usize, configured: usize },
}

/// Standardization parameters: `(x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// On-disk model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidModel {
    /// Window size the model was trained on
    pub window_size: usize,
    /// One label per centroid
    pub labels: Vec<MoveLabel>,
    pub scaler: Scaler,
    /// Centroids in standardized feature space
    pub centroids: Vec<Vec<f64>>,
    /// Softmax temperature; lower values give sharper confidences
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_temperature() -> f64 {
    1.0
}

impl CentroidModel {
    /// Check that every vector matches the feature layout.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.window_size == 0 {
            return Err(ModelError::Invalid("window_size must be positive".into()));
        }
        if self.labels.is_empty() {
            return Err(ModelError::Invalid("model has no labels".into()));
        }
        if self.labels.len() != self.centroids.len() {
            return Err(ModelError::Invalid(format!(
                "{} labels but {} centroids",
                self.labels.len(),
                self.centroids.len()
            )));
        }
        if self.scaler.mean.len() != FEATURE_LEN || self.scaler.scale.len() != FEATURE_LEN {
            return Err(ModelError::Invalid(format!(
                "scaler must have {FEATURE_LEN} entries"
            )));
        }
        if self.scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ModelError::Invalid("scaler has a zero or non-finite scale".into()));
        }
        if let Some((i, c)) = self
            .centroids
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != FEATURE_LEN)
        {
            return Err(ModelError::Invalid(format!(
                "centroid {i} has {} values, expected {FEATURE_LEN}",
                c.len()
            )));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(ModelError::Invalid("temperature must be positive".into()));
        }
        Ok(())
    }
}

/// Classifier backed by a [`CentroidModel`].
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    model: CentroidModel,
}

impl CentroidClassifier {
    pub fn new(model: CentroidModel) -> Result<Self, ModelError> {
        model.validate()?;
        Ok(Self { model })
    }

    /// Load a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let model: CentroidModel = serde_json::from_str(&content)?;
        Self::new(model)
    }

    pub fn model(&self) -> &CentroidModel {
        &self.model
    }

    /// Check that the model can classify windows of `window_size` samples.
    ///
    /// A mismatch would make every window fail classification, so it is
    /// rejected before the detector starts.
    pub fn ensure_window_size(&self, window_size: usize) -> Result<(), ModelError> {
        if self.model.window_size != window_size {
            return Err(ModelError::WindowMismatch {
                model: self.model.window_size,
                configured: window_size,
            });
        }
        Ok(())
    }

    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(&self.model.scaler.mean)
            .zip(&self.model.scaler.scale)
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }
}

impl Classifier for CentroidClassifier {
    fn classify(&self, window: &Window) -> Result<Prediction, ClassificationError> {
        if window.len() != self.model.window_size {
            return Err(ClassificationError::WindowSize {
                expected: self.model.window_size,
                found: window.len(),
            });
        }

        let x = self.standardize(&extract_features(window));

        let scores: Vec<f64> = self
            .model
            .centroids
            .iter()
            .map(|c| -euclidean(&x, c) / self.model.temperature)
            .collect();
        let probabilities = softmax(&scores).ok_or(ClassificationError::NonFinite)?;

        let (best, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        Ok(Prediction::new(self.model.labels[best], confidence))
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Numerically stable softmax, `None` if any score is not finite.
fn softmax(scores: &[f64]) -> Option<Vec<f64>> {
    if scores.is_empty() || scores.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    Some(exps.into_iter().map(|e| e / total).collect())
}
