pub mod classifier;
mod candle_classifier;
mod inference_engine;
mod saliency;

pub use candle_classifier::CnnClassifier;
pub use classifier::{DifferentiableClassifier, LayerTrace};
pub use inference_engine::InferenceEngine;
pub use saliency::SaliencyMapGenerator;
