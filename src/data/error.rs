use thiserror::Error;

/// Errors that abort a pipeline invocation.
///
/// `ImageDecode` is a client-input failure; the other variants are system
/// faults. Saliency problems are deliberately not part of this enum, they
/// are recovered before reaching the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode input image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The classifier artifact could not be loaded. Raised at composition
    /// time, never per-request.
    #[error("classifier model unavailable: {0}")]
    ModelUnavailable(#[source] anyhow::Error),

    /// Forward pass or tensor bookkeeping failed for this request.
    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),
}

/// Recoverable saliency failure. The orchestrator catches this, logs it,
/// and returns the prediction without a heatmap.
#[derive(Debug, Error)]
pub enum SaliencyError {
    #[error("layer `{0}` does not exist in the classifier")]
    UnknownLayer(String),

    #[error("target class index {index} out of range for {count} classes")]
    ClassOutOfRange { index: usize, count: usize },

    #[error("gradient computation failed: {0}")]
    Gradient(#[source] anyhow::Error),
}
