mod class_set;
mod error;
mod pipeline_config;
mod pipeline_result;
mod prediction;

pub use class_set::ClassSet;
pub use error::{PipelineError, SaliencyError};
pub use pipeline_config::PipelineConfig;
pub use pipeline_result::{ExplainedResult, PipelineResult, RejectReason};
pub use prediction::{PredictedLabel, PredictionDecision, UNCERTAIN_LABEL};
