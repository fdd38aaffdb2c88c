use std::sync::Arc;

use anyhow::anyhow;
use ndarray::Array4;
use parking_lot::Mutex;

use crate::data::{ClassSet, PipelineError, PredictionDecision, SaliencyError};
use crate::inference_runners::classifier::{DifferentiableClassifier, LayerTrace};

/// Wraps the frozen classifier with the confidence-gated labeling policy.
///
/// The classifier is process-wide read-only state, loaded once by the
/// composition root and injected here. Forward and backward passes are
/// serialized through one mutex because the numerical runtime keeps
/// per-call graph state; pure transforms before and after this engine run
/// unguarded.
pub struct InferenceEngine {
    classifier: Arc<dyn DifferentiableClassifier>,
    class_set: ClassSet,
    confidence_threshold: f32,
    gate: Mutex<()>,
}

impl InferenceEngine {
    pub fn new(
        classifier: Arc<dyn DifferentiableClassifier>,
        class_set: ClassSet,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            classifier,
            class_set,
            confidence_threshold,
            gate: Mutex::new(()),
        }
    }

    pub fn class_set(&self) -> &ClassSet {
        &self.class_set
    }

    /// One forward pass plus the labeling policy.
    pub fn predict(
        &self,
        tensor: &Array4<f32>,
    ) -> Result<(Vec<f32>, PredictionDecision), PipelineError> {
        let probs = {
            let _guard = self.gate.lock();
            self.classifier
                .forward(tensor)
                .map_err(PipelineError::Inference)?
        };

        if probs.len() != self.class_set.len() {
            return Err(PipelineError::Inference(anyhow!(
                "classifier returned {} probabilities for {} classes",
                probs.len(),
                self.class_set.len()
            )));
        }

        let decision =
            PredictionDecision::from_probabilities(&probs, &self.class_set, self.confidence_threshold)
                .ok_or_else(|| PipelineError::Inference(anyhow!("empty probability vector")))?;

        log::debug!(
            "prediction: {} (confidence {:.3}, argmax {})",
            decision.label,
            decision.confidence,
            decision.class_index
        );

        Ok((probs, decision))
    }

    /// Differentiable forward pass, behind the same gate as `predict`.
    pub fn trace_layer(
        &self,
        tensor: &Array4<f32>,
        layer: &str,
        target_class: usize,
    ) -> Result<LayerTrace, SaliencyError> {
        let _guard = self.gate.lock();
        self.classifier.trace_layer(tensor, layer, target_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    struct FixedClassifier {
        probs: Vec<f32>,
    }

    impl DifferentiableClassifier for FixedClassifier {
        fn class_count(&self) -> usize {
            self.probs.len()
        }

        fn forward(&self, _input: &Array4<f32>) -> anyhow::Result<Vec<f32>> {
            Ok(self.probs.clone())
        }

        fn trace_layer(
            &self,
            _input: &Array4<f32>,
            _layer: &str,
            _target_class: usize,
        ) -> Result<LayerTrace, SaliencyError> {
            Ok(LayerTrace {
                activations: Array3::zeros((2, 2, 1)),
                gradients: Array3::zeros((2, 2, 1)),
            })
        }
    }

    fn engine_with(probs: Vec<f32>) -> InferenceEngine {
        InferenceEngine::new(
            Arc::new(FixedClassifier { probs }),
            ClassSet::default(),
            0.6,
        )
    }

    #[test]
    fn probability_vector_matches_class_set() {
        let engine = engine_with(vec![0.9, 0.05, 0.05]);
        let tensor = Array4::zeros((1, 150, 150, 3));
        let (probs, decision) = engine.predict(&tensor).unwrap();
        assert_eq!(probs.len(), engine.class_set().len());
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(decision.class_index, 0);
    }

    #[test]
    fn wrong_cardinality_is_a_system_fault() {
        let engine = engine_with(vec![0.5, 0.5]);
        let tensor = Array4::zeros((1, 150, 150, 3));
        let err = engine.predict(&tensor).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }
}
