//! Gradient-weighted class-activation mapping.
//!
//! The classifier supplies activations and gradients for the configured
//! layer; this module turns them into a normalized spatial map of the
//! regions that argued for the target class.

use std::sync::Arc;

use ndarray::{Array2, Array3, Array4, Axis};

use crate::data::SaliencyError;
use crate::inference_runners::inference_engine::InferenceEngine;

pub struct SaliencyMapGenerator {
    engine: Arc<InferenceEngine>,
    layer: String,
}

impl SaliencyMapGenerator {
    pub fn new(engine: Arc<InferenceEngine>, layer: &str) -> Self {
        Self {
            engine,
            layer: layer.to_string(),
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Computes the class-activation map for `target_class`, which must be
    /// the argmax index of the decision being explained. Values are in
    /// [0,1]; a degenerate gradient yields an all-zero map rather than an
    /// error.
    pub fn generate(
        &self,
        tensor: &Array4<f32>,
        target_class: usize,
    ) -> Result<Array2<f32>, SaliencyError> {
        let trace = self.engine.trace_layer(tensor, &self.layer, target_class)?;
        Ok(class_activation_map(&trace.activations, &trace.gradients))
    }
}

/// Pools the gradient into one importance weight per channel, weighs the
/// activations with it, keeps the positive part, and normalizes by the
/// maximum. Negative contributions argue against the class and are not
/// visualized as evidence for it.
pub(crate) fn class_activation_map(
    activations: &Array3<f32>,
    gradients: &Array3<f32>,
) -> Array2<f32> {
    let (height, width, channels) = activations.dim();

    // Spatial mean of the gradient per channel.
    let mut weights = vec![0f32; channels];
    for (ch, weight) in weights.iter_mut().enumerate() {
        *weight = gradients
            .index_axis(Axis(2), ch)
            .mean()
            .unwrap_or(0.0);
    }

    let mut map = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut value = 0.0;
            for (ch, weight) in weights.iter().enumerate() {
                value += activations[[y, x, ch]] * weight;
            }
            map[[y, x]] = value.max(0.0);
        }
    }

    let max = map.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    if !max.is_finite() || max <= 0.0 {
        // Degenerate but valid: nothing argued for the class.
        return Array2::zeros((height, width));
    }
    map.mapv_into(|v| v / max)
}
