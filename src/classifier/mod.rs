//! Move classification capability.
//!
//! The detector only depends on the [`Classifier`] trait; the bundled
//! [`CentroidClassifier`] is one implementation backed by a JSON model.

pub mod centroid;

pub use centroid::{CentroidClassifier, CentroidModel, ModelError};

use crate::core::windowing::Window;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Dance moves the model can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveLabel {
    Sidestep,
    Number7,
    Chicken,
    Wipers,
    Turnclap,
    Numbersix,
    Salute,
    Mermaid,
    Swing,
    Cowboy,
    /// Ends the dancer's session on the collector side
    Logout,
}

impl MoveLabel {
    /// Every label, in model index order.
    pub const ALL: [MoveLabel; 11] = [
        MoveLabel::Sidestep,
        MoveLabel::Number7,
        MoveLabel::Chicken,
        MoveLabel::Wipers,
        MoveLabel::Turnclap,
        MoveLabel::Numbersix,
        MoveLabel::Salute,
        MoveLabel::Mermaid,
        MoveLabel::Swing,
        MoveLabel::Cowboy,
        MoveLabel::Logout,
    ];

    /// Name used on the wire and in model files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveLabel::Sidestep => "sidestep",
            MoveLabel::Number7 => "number7",
            MoveLabel::Chicken => "chicken",
            MoveLabel::Wipers => "wipers",
            MoveLabel::Turnclap => "turnclap",
            MoveLabel::Numbersix => "numbersix",
            MoveLabel::Salute => "salute",
            MoveLabel::Mermaid => "mermaid",
            MoveLabel::Swing => "swing",
            MoveLabel::Cowboy => "cowboy",
            MoveLabel::Logout => "logout",
        }
    }

    pub fn is_logout(&self) -> bool {
        *self == MoveLabel::Logout
    }
}

impl fmt::Display for MoveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognized move name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown move label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for MoveLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoveLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Classifier output for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: MoveLabel,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: MoveLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }
}

/// Failure to classify a window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassificationError {
    #[error("window has {found} samples, expected {expected}")]
    WindowSize { expected: usize, found: usize },

    #[error("model produced a non-finite score")]
    NonFinite,

    #[error("classifier failure: {0}")]
    Other(String),
}

/// Maps a window to a move prediction.
///
/// Implementations must be deterministic: identical windows yield
/// identical predictions for a fixed model.
pub trait Classifier {
    fn classify(&self, window: &Window) -> Result<Prediction, ClassificationError>;
}

impl<T: Classifier + ?Sized> Classifier for Box<T> {
    fn classify(&self, window: &Window) -> Result<Prediction, ClassificationError> {
        (**self).classify(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip_names() {
        for label in MoveLabel::ALL {
            assert_eq!(label.as_str().parse::<MoveLabel>().unwrap(), label);
            assert_eq!(label.to_string(), label.as_str());
        }
    }

    #[test]
    fn test_unknown_label() {
        let err = "moonwalk".parse::<MoveLabel>().unwrap_err();
        assert_eq!(err, UnknownLabel("moonwalk".to_string()));
        // Names are case sensitive on the wire
        assert!("Logout".parse::<MoveLabel>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&MoveLabel::Number7).unwrap();
        assert_eq!(json, "\"number7\"");
        let label: MoveLabel = serde_json::from_str("\"logout\"").unwrap();
        assert!(label.is_logout());
    }
}
