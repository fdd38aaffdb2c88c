extern crate cxr_explain;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use image::{Rgb, RgbImage};
use ndarray::Array4;

use cxr_explain::data::{PipelineConfig, PipelineError, PipelineResult, SaliencyError};
use cxr_explain::inference_runners::{CnnClassifier, DifferentiableClassifier};
use cxr_explain::ExplainedPipeline;

/////////////////////
// Testing variables
const IMG_SIZE: u32 = 64; // keeps the debug-mode forward pass cheap
const FEATURE_SIDE: usize = 4; // 64 after four 2x2 max-pools
const LAST_CONV_CHANNELS: usize = 128;
/////////////////////

/// Writes a random-weight artifact with the layer names and shapes the
/// classifier expects for a 64x64 input and 3 classes.
fn write_weights(path: &Path) {
    let dev = Device::Cpu;
    let mut tensors: HashMap<String, Tensor> = HashMap::new();

    let conv_shapes = [
        ("conv_1", (32usize, 3usize)),
        ("conv_2", (64, 32)),
        ("conv_3", (128, 64)),
        ("conv_4", (128, 128)),
    ];
    for (name, (out_c, in_c)) in conv_shapes {
        let weight = Tensor::randn(0f32, 0.05, (out_c, in_c, 3, 3), &dev).unwrap();
        let bias = Tensor::randn(0f32, 0.01, (out_c,), &dev).unwrap();
        tensors.insert(format!("{name}.weight"), weight);
        tensors.insert(format!("{name}.bias"), bias);
    }

    let flat = LAST_CONV_CHANNELS * FEATURE_SIDE * FEATURE_SIDE;
    tensors.insert(
        "dense_1.weight".to_string(),
        Tensor::randn(0f32, 0.01, (128, flat), &dev).unwrap(),
    );
    tensors.insert(
        "dense_1.bias".to_string(),
        Tensor::randn(0f32, 0.01, (128,), &dev).unwrap(),
    );
    tensors.insert(
        "dense_2.weight".to_string(),
        Tensor::randn(0f32, 0.01, (3, 128), &dev).unwrap(),
    );
    tensors.insert(
        "dense_2.bias".to_string(),
        Tensor::randn(0f32, 0.01, (3,), &dev).unwrap(),
    );

    candle_core::safetensors::save(&tensors, path).unwrap();
}

fn test_config(weights_path: &Path) -> PipelineConfig {
    PipelineConfig::new()
        .with_weights(weights_path.to_str().unwrap())
        .with_input_size(IMG_SIZE)
        .with_heatmap_format(image::ImageFormat::Png)
}

fn gray_tensor() -> Array4<f32> {
    Array4::from_elem((1, IMG_SIZE as usize, IMG_SIZE as usize, 3), 0.5)
}

fn gray_scan_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(IMG_SIZE, IMG_SIZE, Rgb([110, 110, 110]));
    let mut cursor = std::io::Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}

#[test]
fn forward_produces_a_softmax_distribution() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.safetensors");
    write_weights(&weights);

    let classifier = CnnClassifier::load(&test_config(&weights)).unwrap();
    assert_eq!(classifier.class_count(), 3);
    assert_eq!(classifier.layer_names(), vec!["conv_1", "conv_2", "conv_3", "conv_4"]);

    let probs = classifier.forward(&gray_tensor()).unwrap();
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));

    // The model is read-only state: a second pass must reproduce the first.
    let again = classifier.forward(&gray_tensor()).unwrap();
    assert_eq!(probs, again);
}

#[test]
fn trace_layer_returns_aligned_activation_and_gradient_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.safetensors");
    write_weights(&weights);

    let classifier = CnnClassifier::load(&test_config(&weights)).unwrap();
    let probs = classifier.forward(&gray_tensor()).unwrap();
    let argmax = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap()
        .0;

    let trace = classifier
        .trace_layer(&gray_tensor(), "conv_4", argmax)
        .unwrap();
    // conv_4 output is captured before its pool, so its side is twice the
    // final feature side.
    let expected = (FEATURE_SIDE * 2, FEATURE_SIDE * 2, LAST_CONV_CHANNELS);
    assert_eq!(trace.activations.dim(), expected);
    assert_eq!(trace.gradients.dim(), expected);
    assert!(trace.gradients.iter().all(|v| v.is_finite()));
}

#[test]
fn unknown_layer_and_bad_class_are_typed_saliency_errors() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.safetensors");
    write_weights(&weights);

    let classifier = CnnClassifier::load(&test_config(&weights)).unwrap();

    let err = classifier
        .trace_layer(&gray_tensor(), "conv_9", 0)
        .unwrap_err();
    assert!(matches!(err, SaliencyError::UnknownLayer(_)));

    let err = classifier
        .trace_layer(&gray_tensor(), "conv_4", 17)
        .unwrap_err();
    assert!(matches!(err, SaliencyError::ClassOutOfRange { index: 17, count: 3 }));
}

#[test]
fn missing_artifact_is_model_unavailable() {
    let config = test_config(Path::new("/nonexistent/model.safetensors"));
    let err = CnnClassifier::load(&config).unwrap_err();
    assert!(matches!(err, PipelineError::ModelUnavailable(_)));
}

#[test]
fn pipeline_with_real_classifier_completes_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.safetensors");
    write_weights(&weights);

    let pipeline = cxr_explain::build_pipeline(test_config(&weights)).unwrap();
    let result = cxr_explain::run_pipeline(&pipeline, &gray_scan_bytes()).unwrap();

    let explained = match result {
        PipelineResult::Explained(explained) => explained,
        other => panic!("expected explained result, got {other:?}"),
    };
    assert_eq!(explained.probabilities.len(), 3);
    assert!((explained.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    assert!(explained.confidence > 0.0);
}

#[test]
fn misconfigured_attribution_layer_never_fails_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.safetensors");
    write_weights(&weights);

    let config = test_config(&weights).with_attribution_layer("conv_9");
    let classifier = Arc::new(CnnClassifier::load(&config).unwrap());
    let pipeline = ExplainedPipeline::new(&config, classifier);

    let result = pipeline.run(&gray_scan_bytes()).unwrap();
    let explained = match result {
        PipelineResult::Explained(explained) => explained,
        other => panic!("expected explained result, got {other:?}"),
    };
    assert_eq!(explained.probabilities.len(), 3);
    assert!(explained.heatmap.is_none());
}
