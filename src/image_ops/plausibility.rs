use image::RgbImage;
use rayon::prelude::*;

use crate::data::{PipelineConfig, PipelineError};

/// Heuristic pre-filter rejecting inputs that are unlikely to be grayscale
/// radiographs.
///
/// A pixel counts as colored when the summed pairwise channel difference
/// |R-G| + |G-B| + |R-B| (in [0,1] scale) exceeds the tolerance; the image
/// is judged plausible when the colored fraction stays below the ratio
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct PlausibilityFilter {
    tolerance: f32,
    ratio_threshold: f32,
}

impl Default for PlausibilityFilter {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            ratio_threshold: 0.1,
        }
    }
}

impl PlausibilityFilter {
    pub fn new(tolerance: f32, ratio_threshold: f32) -> Self {
        Self {
            tolerance,
            ratio_threshold,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.color_tolerance, config.color_ratio_threshold)
    }

    /// Decodes the bytes and applies the colored-pixel heuristic.
    ///
    /// Malformed bytes surface as `PipelineError::ImageDecode`; the filter
    /// never swallows decode failures.
    pub fn is_plausible(&self, raw_bytes: &[u8]) -> Result<bool, PipelineError> {
        let rgb = image::load_from_memory(raw_bytes)?.to_rgb8();
        let fraction = self.color_fraction(&rgb);
        log::debug!(
            "plausibility check: colored fraction {:.4} (threshold {})",
            fraction,
            self.ratio_threshold
        );
        Ok(fraction < self.ratio_threshold)
    }

    /// Fraction of pixels whose channel divergence exceeds the tolerance.
    pub fn color_fraction(&self, rgb: &RgbImage) -> f32 {
        let pixel_count = (rgb.width() * rgb.height()) as usize;
        if pixel_count == 0 {
            return 0.0;
        }

        let colored = rgb
            .as_raw()
            .par_chunks_exact(3)
            .filter(|px| {
                let r = px[0] as f32 / 255.0;
                let g = px[1] as f32 / 255.0;
                let b = px[2] as f32 / 255.0;
                (r - g).abs() + (g - b).abs() + (r - b).abs() > self.tolerance
            })
            .count();

        colored as f32 / pixel_count as f32
    }
}
