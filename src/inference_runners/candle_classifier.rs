//! Candle backend for the chest X-ray CNN.
//!
//! The architecture mirrors the trained artifact: four 3x3 convolution
//! blocks (ReLU, 2x2 max-pool) followed by two dense layers and a softmax.
//! Weights live in a safetensors file and are memory-mapped once at
//! startup; forward passes never touch them mutably.

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor, Var, D};
use candle_nn::{ops, Conv2d, Conv2dConfig, Linear, Module, VarBuilder};
use ndarray::{Array3, Array4};

use crate::data::{PipelineConfig, PipelineError, SaliencyError};
use crate::inference_runners::classifier::{DifferentiableClassifier, LayerTrace};

/// Channel widths of the convolution blocks, in model order. Block `i`
/// loads its weights under the name `conv_{i+1}`.
const CONV_CHANNELS: [usize; 4] = [32, 64, 128, 128];
const DENSE_UNITS: usize = 128;

#[derive(Debug)]
struct ConvBlock {
    name: String,
    conv: Conv2d,
    out_channels: usize,
}

#[derive(Debug)]
pub struct CnnClassifier {
    blocks: Vec<ConvBlock>,
    dense_1: Linear,
    dense_2: Linear,
    class_count: usize,
    input_size: usize,
    device: Device,
}

impl CnnClassifier {
    /// Loads the frozen classifier from the configured safetensors
    /// artifact. Any failure here is fatal to pipeline construction.
    pub fn load(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let device = Device::Cpu;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&config.weights_path], DType::F32, &device)
                .map_err(|e| PipelineError::ModelUnavailable(e.into()))?
        };
        Self::from_var_builder(
            vb,
            config.class_set.len(),
            config.input_size as usize,
            device,
        )
        .map_err(PipelineError::ModelUnavailable)
    }

    fn from_var_builder(
        vb: VarBuilder,
        class_count: usize,
        input_size: usize,
        device: Device,
    ) -> Result<Self> {
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let mut blocks = Vec::with_capacity(CONV_CHANNELS.len());
        let mut in_channels = 3;
        for (i, &out_channels) in CONV_CHANNELS.iter().enumerate() {
            let name = format!("conv_{}", i + 1);
            let conv = candle_nn::conv2d(in_channels, out_channels, 3, conv_cfg, vb.pp(&name))
                .with_context(|| format!("loading weights for layer `{name}`"))?;
            blocks.push(ConvBlock {
                name,
                conv,
                out_channels,
            });
            in_channels = out_channels;
        }

        let feature_side = pooled_extent(input_size, blocks.len());
        let flat_features = in_channels * feature_side * feature_side;
        let dense_1 = candle_nn::linear(flat_features, DENSE_UNITS, vb.pp("dense_1"))
            .context("loading weights for layer `dense_1`")?;
        let dense_2 = candle_nn::linear(DENSE_UNITS, class_count, vb.pp("dense_2"))
            .context("loading weights for layer `dense_2`")?;

        Ok(Self {
            blocks,
            dense_1,
            dense_2,
            class_count,
            input_size,
            device,
        })
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }

    /// One-line-per-layer summary, logged at startup.
    pub fn describe(&self) -> String {
        let mut side = self.input_size;
        let mut lines = vec![format!(
            "CnnClassifier: input {0}x{0}x3, {1} classes",
            self.input_size, self.class_count
        )];
        for block in &self.blocks {
            lines.push(format!(
                "  {}: 3x3 conv, {}x{}x{}",
                block.name, side, side, block.out_channels
            ));
            side /= 2;
        }
        lines.push(format!("  dense_1: {DENSE_UNITS} units"));
        lines.push(format!("  dense_2: {} units (softmax)", self.class_count));
        lines.join("\n")
    }

    fn input_to_nchw(&self, input: &Array4<f32>) -> Result<Tensor> {
        let (batch, height, width, channels) = input.dim();
        if batch != 1 || channels != 3 {
            return Err(anyhow!(
                "expected input of shape (1, H, W, 3), got {:?}",
                input.dim()
            ));
        }
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_vec(data, (batch, height, width, channels), &self.device)?;
        Ok(tensor.permute((0, 3, 1, 2))?)
    }

    fn head(&self, features: &Tensor) -> Result<Tensor> {
        let flat = features.flatten_from(1)?;
        let hidden = self.dense_1.forward(&flat)?.relu()?;
        let logits = self.dense_2.forward(&hidden)?;
        Ok(ops::softmax(&logits, D::Minus1)?)
    }
}

impl DifferentiableClassifier for CnnClassifier {
    fn class_count(&self) -> usize {
        self.class_count
    }

    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let mut x = self.input_to_nchw(input)?;
        for block in &self.blocks {
            x = block.conv.forward(&x)?.relu()?;
            x = x.max_pool2d(2)?;
        }
        let probs = self.head(&x)?;
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }

    fn trace_layer(
        &self,
        input: &Array4<f32>,
        layer: &str,
        target_class: usize,
    ) -> Result<LayerTrace, SaliencyError> {
        if target_class >= self.class_count {
            return Err(SaliencyError::ClassOutOfRange {
                index: target_class,
                count: self.class_count,
            });
        }
        if !self.blocks.iter().any(|b| b.name == layer) {
            return Err(SaliencyError::UnknownLayer(layer.to_string()));
        }
        self.trace_layer_inner(input, layer, target_class)
            .map_err(SaliencyError::Gradient)
    }
}

impl CnnClassifier {
    /// Replays the network with the named layer's activation detached into
    /// a fresh `Var`, so the backward pass yields the gradient of the
    /// target class probability with respect to that activation. The graph
    /// lives only for the duration of this call.
    fn trace_layer_inner(
        &self,
        input: &Array4<f32>,
        layer: &str,
        target_class: usize,
    ) -> Result<LayerTrace> {
        let mut x = self.input_to_nchw(input)?;
        let mut captured: Option<Var> = None;

        for block in &self.blocks {
            x = block.conv.forward(&x)?.relu()?;
            if block.name == layer {
                // Post-activation output of the named convolution, before
                // pooling collapses its spatial resolution.
                let var = Var::from_tensor(&x.detach())?;
                x = var.as_tensor().clone();
                captured = Some(var);
            }
            x = x.max_pool2d(2)?;
        }

        let var = captured.ok_or_else(|| anyhow!("layer `{layer}` not reached"))?;
        let probs = self.head(&x)?;
        let score = probs.i((0, target_class))?;
        let grads = score.backward()?;
        let grad = grads
            .get(var.as_tensor())
            .ok_or_else(|| anyhow!("no gradient recorded for layer `{layer}`"))?;

        Ok(LayerTrace {
            activations: hwc_array(var.as_tensor())?,
            gradients: hwc_array(grad)?,
        })
    }
}

/// Spatial extent after `pools` rounds of 2x2 max pooling.
fn pooled_extent(mut extent: usize, pools: usize) -> usize {
    for _ in 0..pools {
        extent /= 2;
    }
    extent
}

/// Converts a (1, C, H, W) tensor into an H x W x C array.
fn hwc_array(tensor: &Tensor) -> Result<Array3<f32>> {
    let hwc = tensor.squeeze(0)?.permute((1, 2, 0))?.contiguous()?;
    let (h, w, c) = hwc.dims3()?;
    let data = hwc.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array3::from_shape_vec((h, w, c), data)?)
}
