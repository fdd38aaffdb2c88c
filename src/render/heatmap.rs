use std::io::Cursor;

use anyhow::Error as AnyError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbImage};
use ndarray::{Array2, Array3};

use crate::data::{PipelineConfig, PipelineError};
use crate::image_ops::resize::resize_rgb8;
use crate::render::colormap::jet_lut;

/// Turns a saliency map into a colorized overlay on the source image,
/// encoded as a base64 string ready for a JSON payload.
pub struct HeatmapRenderer {
    alpha: f32,
    format: ImageFormat,
    lut: [[u8; 3]; 256],
}

impl HeatmapRenderer {
    pub fn new(alpha: f32, format: ImageFormat) -> Self {
        Self {
            alpha,
            format,
            lut: jet_lut(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.overlay_alpha, config.heatmap_format)
    }

    /// Upsamples the saliency map to the original's resolution, colorizes
    /// it, blends `colorized*alpha + original*(1-alpha)` and encodes the
    /// result. Pure transform, no side effects beyond allocation.
    pub fn render(
        &self,
        original: &Array3<f32>,
        saliency: &Array2<f32>,
    ) -> Result<String, PipelineError> {
        let (height, width, _) = original.dim();
        let colorized = self.colorize(saliency);
        let colorized = resize_rgb8(&colorized, width as u32, height as u32)
            .map_err(PipelineError::Inference)?;

        let mut blended = RgbImage::new(width as u32, height as u32);
        for (x, y, pixel) in blended.enumerate_pixels_mut() {
            let overlay = colorized.get_pixel(x, y).0;
            for ch in 0..3 {
                let source = original[[y as usize, x as usize, ch]];
                let value = overlay[ch] as f32 * self.alpha + source * (1.0 - self.alpha);
                pixel.0[ch] = value.round().clamp(0.0, 255.0) as u8;
            }
        }

        let mut cursor = Cursor::new(Vec::new());
        blended
            .write_to(&mut cursor, self.format)
            .map_err(|e| PipelineError::Inference(AnyError::new(e)))?;
        Ok(STANDARD.encode(cursor.into_inner()))
    }

    /// Quantizes the map to 0-255 and applies the jet lookup at the map's
    /// native resolution.
    fn colorize(&self, saliency: &Array2<f32>) -> RgbImage {
        let (height, width) = saliency.dim();
        let mut img = RgbImage::new(width as u32, height as u32);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let value = saliency[[y as usize, x as usize]].clamp(0.0, 1.0);
            let bucket = (value * 255.0).round() as usize;
            pixel.0 = self.lut[bucket];
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::colormap::jet_rgb;

    fn decode(b64: &str) -> RgbImage {
        let bytes = STANDARD.decode(b64).unwrap();
        image::load_from_memory(&bytes).unwrap().to_rgb8()
    }

    fn gray_original(side: usize, level: f32) -> Array3<f32> {
        Array3::from_elem((side, side, 3), level)
    }

    #[test]
    fn alpha_zero_reproduces_the_original() {
        let original = gray_original(16, 200.0);
        let saliency = Array2::from_elem((4, 4), 0.7);
        let renderer = HeatmapRenderer::new(0.0, ImageFormat::Png);

        let out = decode(&renderer.render(&original, &saliency).unwrap());
        assert_eq!(out.dimensions(), (16, 16));
        assert!(out.pixels().all(|p| p.0 == [200, 200, 200]));
    }

    #[test]
    fn alpha_one_reproduces_the_colorized_map() {
        let original = gray_original(16, 10.0);
        // Constant map so upsampling cannot introduce mixing.
        let saliency = Array2::from_elem((4, 4), 1.0);
        let renderer = HeatmapRenderer::new(1.0, ImageFormat::Png);

        let expected = jet_rgb(1.0);
        let out = decode(&renderer.render(&original, &saliency).unwrap());
        assert!(out.pixels().all(|p| p.0 == expected));
    }

    #[test]
    fn all_zero_map_still_renders_a_neutral_overlay() {
        let original = gray_original(8, 128.0);
        let saliency = Array2::zeros((4, 4));
        let renderer = HeatmapRenderer::new(0.4, ImageFormat::Png);

        let out = decode(&renderer.render(&original, &saliency).unwrap());
        let expected_blue = jet_rgb(0.0);
        let expected = [
            (expected_blue[0] as f32 * 0.4 + 128.0 * 0.6).round() as u8,
            (expected_blue[1] as f32 * 0.4 + 128.0 * 0.6).round() as u8,
            (expected_blue[2] as f32 * 0.4 + 128.0 * 0.6).round() as u8,
        ];
        assert!(out.pixels().all(|p| p.0 == expected));
    }
}
