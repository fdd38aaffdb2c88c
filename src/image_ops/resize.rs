//! Shared resize policy.
//!
//! Every resample in the pipeline goes through the same bilinear
//! convolution so that the preprocessed tensor, the overlay source and the
//! upsampled saliency map stay pixel-aligned.

use anyhow::{anyhow, Result};
use fast_image_resize::{
    images::Image as FirImage, pixels::PixelType, FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;

pub(crate) fn resize_rgb8(src: &RgbImage, target_w: u32, target_h: u32) -> Result<RgbImage> {
    let src_fir = FirImage::from_vec_u8(
        src.width(),
        src.height(),
        src.as_raw().clone(),
        PixelType::U8x3,
    )?;
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut resizer = Resizer::new();
    resizer.resize(&src_fir, &mut dst, &options)?;

    RgbImage::from_raw(target_w, target_h, dst.buffer().to_vec())
        .ok_or_else(|| anyhow!("resize produced an unexpected buffer size"))
}
