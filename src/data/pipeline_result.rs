use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotPlausible,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::NotPlausible => {
                "The uploaded image does not look like a chest X-ray."
            }
        }
    }
}

/// Classification result with an optional rendered explanation.
///
/// `heatmap` is a base64-encoded overlay image. It is present only when
/// the label is not the healthy class and saliency generation succeeded;
/// its absence is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainedResult {
    pub prediction: String,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub heatmap: Option<String>,
}

/// Final contract of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Rejected { reason: RejectReason, message: String },
    Explained(ExplainedResult),
}

impl PipelineResult {
    pub fn rejected(reason: RejectReason) -> Self {
        PipelineResult::Rejected {
            reason,
            message: reason.message().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explained_result_serializes_transport_fields() {
        let result = PipelineResult::Explained(ExplainedResult {
            prediction: "BACTERIAL".to_string(),
            confidence: 0.91,
            probabilities: vec![0.04, 0.91, 0.05],
            heatmap: None,
        });
        let json = result.to_json().unwrap();
        for field in ["\"status\"", "\"prediction\"", "\"confidence\"", "\"probabilities\"", "\"heatmap\""] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
        assert!(json.contains("\"heatmap\":null"));
    }

    #[test]
    fn rejected_result_carries_reason_and_message() {
        let json = PipelineResult::rejected(RejectReason::NotPlausible)
            .to_json()
            .unwrap();
        assert!(json.contains("\"status\":\"rejected\""));
        assert!(json.contains("\"reason\":\"not_plausible\""));
        assert!(json.contains("does not look like a chest X-ray"));
    }
}
