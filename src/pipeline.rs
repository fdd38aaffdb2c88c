use std::sync::Arc;

use ndarray::{Array2, Array3, Array4};

use crate::data::{
    ExplainedResult, PipelineConfig, PipelineError, PipelineResult, PredictionDecision,
    RejectReason,
};
use crate::image_ops::{ImagePreprocessor, PlausibilityFilter};
use crate::inference_runners::{DifferentiableClassifier, InferenceEngine, SaliencyMapGenerator};
use crate::render::HeatmapRenderer;

/// Orchestrates one request: plausibility filtering, preprocessing,
/// confidence-gated inference and, for non-healthy labels, a best-effort
/// heatmap.
pub struct ExplainedPipeline {
    filter: PlausibilityFilter,
    preprocessor: ImagePreprocessor,
    engine: Arc<InferenceEngine>,
    saliency: SaliencyMapGenerator,
    renderer: HeatmapRenderer,
}

impl ExplainedPipeline {
    pub fn new(config: &PipelineConfig, classifier: Arc<dyn DifferentiableClassifier>) -> Self {
        let engine = Arc::new(InferenceEngine::new(
            classifier,
            config.class_set.clone(),
            config.confidence_threshold,
        ));
        Self {
            filter: PlausibilityFilter::from_config(config),
            preprocessor: ImagePreprocessor::from_config(config),
            engine: engine.clone(),
            saliency: SaliencyMapGenerator::new(engine, &config.attribution_layer),
            renderer: HeatmapRenderer::from_config(config),
        }
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Runs the full request. Decode and inference failures abort the
    /// invocation; saliency failures only cost the heatmap.
    pub fn run(&self, raw_bytes: &[u8]) -> Result<PipelineResult, PipelineError> {
        if !self.filter.is_plausible(raw_bytes)? {
            log::info!("input rejected by plausibility filter, skipping inference");
            return Ok(PipelineResult::rejected(RejectReason::NotPlausible));
        }

        let (tensor, original) = self.preprocessor.preprocess(raw_bytes)?;
        let (probabilities, decision) = self.engine.predict(&tensor)?;

        // The healthy class needs no explanation; everything else gets a
        // best-effort attempt, the uncertain sentinel included.
        let heatmap = if decision.is_healthy(self.engine.class_set()) {
            None
        } else {
            self.attempt_heatmap(&tensor, &original, &decision)
        };

        Ok(PipelineResult::Explained(ExplainedResult {
            prediction: decision.label.text().to_string(),
            confidence: decision.confidence,
            probabilities,
            heatmap,
        }))
    }

    /// Never fails the request: the label must stay deliverable even when
    /// the explanation subsystem is broken.
    fn attempt_heatmap(
        &self,
        tensor: &Array4<f32>,
        original: &Array3<f32>,
        decision: &PredictionDecision,
    ) -> Option<String> {
        let map: Array2<f32> = match self.saliency.generate(tensor, decision.class_index) {
            Ok(map) => map,
            Err(err) => {
                log::warn!(
                    "saliency generation failed for layer `{}`, returning result without heatmap: {err}",
                    self.saliency.layer()
                );
                return None;
            }
        };

        match self.renderer.render(original, &map) {
            Ok(encoded) => Some(encoded),
            Err(err) => {
                log::warn!("heatmap rendering failed, returning result without heatmap: {err}");
                None
            }
        }
    }
}
