use ndarray::{Array3, Array4};

use crate::data::SaliencyError;

/// Activations and gradients captured at one convolutional layer during a
/// differentiable forward pass. Both arrays are H' x W' x C.
#[derive(Debug, Clone)]
pub struct LayerTrace {
    pub activations: Array3<f32>,
    pub gradients: Array3<f32>,
}

/// Capability contract for the frozen classifier.
///
/// Anything that can run a forward pass and differentiate a class score
/// down to a named intermediate layer satisfies this trait; the pipeline
/// does not care which numerical runtime sits behind it. Implementations
/// must treat the model as read-only: a forward pass never mutates
/// parameters.
pub trait DifferentiableClassifier: Send + Sync {
    /// Number of output classes.
    fn class_count(&self) -> usize;

    /// Runs one forward pass over a (1, H, W, 3) tensor in [0,1] and
    /// returns the softmax probability vector.
    fn forward(&self, input: &Array4<f32>) -> anyhow::Result<Vec<f32>>;

    /// Runs a differentiable forward pass, returning the activations of
    /// the named layer together with the gradient of the target class
    /// probability with respect to those activations.
    fn trace_layer(
        &self,
        input: &Array4<f32>,
        layer: &str,
        target_class: usize,
    ) -> Result<LayerTrace, SaliencyError>;
}
