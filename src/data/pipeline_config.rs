use image::ImageFormat;

use crate::data::ClassSet;

/// Options for building the explainable-inference pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub weights_path: String,
    pub class_set: ClassSet,
    /// Square model input resolution, in pixels.
    pub input_size: u32,
    /// Top probability below this value is labeled uncertain.
    pub confidence_threshold: f32,
    /// Name of the convolutional layer used for gradient attribution.
    pub attribution_layer: String,
    /// Per-pixel summed channel difference above which a pixel counts as colored.
    pub color_tolerance: f32,
    /// Colored-pixel fraction above which an input is rejected.
    pub color_ratio_threshold: f32,
    /// Blend weight of the colorized heatmap in the overlay.
    pub overlay_alpha: f32,
    pub heatmap_format: ImageFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights_path: String::new(),
            class_set: ClassSet::default(),
            input_size: 150,
            confidence_threshold: 0.6,
            attribution_layer: "conv_4".to_string(),
            color_tolerance: 0.02,
            color_ratio_threshold: 0.1,
            overlay_alpha: 0.4,
            heatmap_format: ImageFormat::Jpeg,
        }
    }
}

#[allow(dead_code)]
impl PipelineConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_weights(mut self, weights_path: &str) -> Self {
        self.weights_path = weights_path.to_string();
        self
    }

    pub fn with_class_set(mut self, class_set: ClassSet) -> Self {
        self.class_set = class_set;
        self
    }

    pub fn with_input_size(mut self, n: u32) -> Self {
        self.input_size = n;
        self
    }

    pub fn with_confidence_threshold(mut self, x: f32) -> Self {
        self.confidence_threshold = x;
        self
    }

    pub fn with_attribution_layer(mut self, layer: &str) -> Self {
        self.attribution_layer = layer.to_string();
        self
    }

    pub fn with_color_tolerance(mut self, x: f32) -> Self {
        self.color_tolerance = x;
        self
    }

    pub fn with_color_ratio_threshold(mut self, x: f32) -> Self {
        self.color_ratio_threshold = x;
        self
    }

    pub fn with_overlay_alpha(mut self, x: f32) -> Self {
        self.overlay_alpha = x;
        self
    }

    pub fn with_heatmap_format(mut self, format: ImageFormat) -> Self {
        self.heatmap_format = format;
        self
    }

    pub fn to_string(&self) -> String {
        format!("Weights File Path: {}\n\
        Classes: {:?} (healthy: {})\n\
        Model Input Resolution: {}x{}\n\
        Confidence Threshold: {}\n\
        Attribution Layer: {}",
                self.weights_path, self.class_set.names(), self.class_set.healthy_name(),
                self.input_size, self.input_size, self.confidence_threshold,
                self.attribution_layer)
    }
}
