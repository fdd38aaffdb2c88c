pub(crate) mod colormap;
mod heatmap;

pub use heatmap::HeatmapRenderer;
