mod pipeline;
pub mod data;
pub mod image_ops;
pub mod inference_runners;
pub mod render;

use std::sync::Arc;
use std::time::Instant;

use crate::data::{PipelineConfig, PipelineError, PipelineResult};
use crate::inference_runners::CnnClassifier;
pub use crate::pipeline::ExplainedPipeline;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Loads the frozen classifier named by the config. Called once at
/// startup; a failure here is fatal to the process, not to a request.
pub fn init_classifier(config: &PipelineConfig) -> Result<Arc<CnnClassifier>> {
    let classifier = CnnClassifier::load(config)?;
    log::info!("Loaded classifier from {}", config.weights_path);
    log::info!("{}", classifier.describe());
    Ok(Arc::new(classifier))
}

/// Composition root: loads the model and wires the full pipeline.
pub fn build_pipeline(config: PipelineConfig) -> Result<ExplainedPipeline> {
    let classifier = init_classifier(&config)?;
    Ok(ExplainedPipeline::new(&config, classifier))
}

/// Runs one classification request and logs the processing time.
pub fn run_pipeline(pipeline: &ExplainedPipeline, raw_bytes: &[u8]) -> Result<PipelineResult> {
    let now = Instant::now();
    let result = pipeline.run(raw_bytes)?;
    log::info!("Processing time: {:?}", now.elapsed());
    Ok(result)
}
