use anyhow::Error as AnyError;
use ndarray::{Array3, Array4, Axis};

use crate::data::{PipelineConfig, PipelineError};
use crate::image_ops::resize::resize_rgb8;

/// Decodes raw bytes into the model input tensor plus the unnormalized
/// pixel array kept for overlay rendering.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    input_size: u32,
}

impl ImagePreprocessor {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.input_size)
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Returns `(normalized, original)`.
    ///
    /// `normalized` has shape (1, H, W, 3) with values in [0,1];
    /// `original` has shape (H, W, 3) with values in [0,255]. Both come
    /// from the same single resize so the saliency overlay stays aligned
    /// with the pixels the model saw.
    pub fn preprocess(
        &self,
        raw_bytes: &[u8],
    ) -> Result<(Array4<f32>, Array3<f32>), PipelineError> {
        let rgb = image::load_from_memory(raw_bytes)?.to_rgb8();
        let resized = resize_rgb8(&rgb, self.input_size, self.input_size)
            .map_err(PipelineError::Inference)?;

        let side = self.input_size as usize;
        let floats: Vec<f32> = resized.as_raw().iter().map(|&v| v as f32).collect();
        let original = Array3::from_shape_vec((side, side, 3), floats)
            .map_err(|e| PipelineError::Inference(AnyError::new(e)))?;

        let normalized = original.mapv(|v| v / 255.0).insert_axis(Axis(0));
        Ok((normalized, original))
    }
}
