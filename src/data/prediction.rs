use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::ClassSet;

/// Sentinel label reported when the top probability falls below the
/// configured confidence threshold.
pub const UNCERTAIN_LABEL: &str = "Uncertain / Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictedLabel {
    Class(String),
    Uncertain,
}

impl PredictedLabel {
    pub fn text(&self) -> &str {
        match self {
            PredictedLabel::Class(name) => name,
            PredictedLabel::Uncertain => UNCERTAIN_LABEL,
        }
    }
}

impl fmt::Display for PredictedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Outcome of one confidence-gated forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDecision {
    /// Argmax position in the probability vector.
    pub class_index: usize,
    /// Maximum entry of the probability vector.
    pub confidence: f32,
    pub label: PredictedLabel,
}

impl PredictionDecision {
    /// Applies the labeling policy. The classifier is known to be
    /// overconfident on out-of-distribution inputs, so anything below the
    /// threshold is reported as uncertain rather than as the argmax class.
    pub fn from_probabilities(
        probs: &[f32],
        class_set: &ClassSet,
        confidence_threshold: f32,
    ) -> Option<Self> {
        let (class_index, &confidence) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;

        let label = if confidence < confidence_threshold {
            PredictedLabel::Uncertain
        } else {
            PredictedLabel::Class(class_set.name(class_index)?.to_string())
        };

        Some(Self {
            class_index,
            confidence,
            label,
        })
    }

    pub fn is_healthy(&self, class_set: &ClassSet) -> bool {
        self.label.text() == class_set.healthy_name()
    }
}
