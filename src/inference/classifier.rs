use std::path::Path;

use anyhow::Context;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module};
use image::imageops::FilterType;

/// Fixed input edge all classifiers are fed: 224x224 RGB, scaled to [0,1].
pub const INPUT_SIZE: u32 = 224;

/// One loaded classifier. The registry only needs raw class scores; verdict
/// reduction lives in the parent module.
pub trait Classifier: Send + Sync {
    fn scores(&self, pixels: &[f32]) -> anyhow::Result<Vec<f32>>;
}

/// Decode an uploaded image and normalize it into the flat tensor layout the
/// classifiers expect.
pub fn preprocess(bytes: &[u8]) -> Result<Vec<f32>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let rgb = resized.to_rgb8();
    Ok(rgb.into_raw().into_iter().map(|p| p as f32 / 255.0).collect())
}

/// Classifier head backed by candle: serialized weights loaded from a
/// safetensors file, one linear forward pass, softmax (multi-class) or
/// sigmoid (single-logit) on the way out.
pub struct CandleClassifier {
    linear: Linear,
    device: Device,
    in_dim: usize,
    out_dim: usize,
}

impl CandleClassifier {
    pub fn load(path: &Path, device: &Device) -> anyhow::Result<Self> {
        let tensors = candle_core::safetensors::load(path, device)
            .with_context(|| format!("load weights from {}", path.display()))?;
        let weight = tensors
            .get("weight")
            .cloned()
            .with_context(|| format!("{}: missing `weight` tensor", path.display()))?;
        let bias = tensors.get("bias").cloned();
        let (out_dim, in_dim) = weight.dims2().context("weight must be a 2d tensor")?;

        let expected = (INPUT_SIZE * INPUT_SIZE * 3) as usize;
        anyhow::ensure!(
            in_dim == expected,
            "weight input dimension {in_dim} does not match the {expected}-element input"
        );

        Ok(Self {
            linear: Linear::new(weight, bias),
            device: device.clone(),
            in_dim,
            out_dim,
        })
    }

    fn from_parts(linear: Linear, device: Device, in_dim: usize, out_dim: usize) -> Self {
        Self {
            linear,
            device,
            in_dim,
            out_dim,
        }
    }
}

impl Classifier for CandleClassifier {
    fn scores(&self, pixels: &[f32]) -> anyhow::Result<Vec<f32>> {
        anyhow::ensure!(
            pixels.len() == self.in_dim,
            "expected {} input values, got {}",
            self.in_dim,
            pixels.len()
        );
        let x = Tensor::from_vec(pixels.to_vec(), (1, self.in_dim), &self.device)?;
        let logits = self.linear.forward(&x)?;
        let probs = if self.out_dim > 1 {
            candle_nn::ops::softmax(&logits, candle_core::D::Minus1)?
        } else {
            candle_nn::ops::sigmoid(&logits)?
        };
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_classifier(out_dim: usize, in_dim: usize) -> CandleClassifier {
        let device = Device::Cpu;
        let weight =
            Tensor::from_vec(vec![0.5f32; out_dim * in_dim], (out_dim, in_dim), &device).unwrap();
        let bias = Tensor::from_vec(vec![0.0f32; out_dim], out_dim, &device).unwrap();
        CandleClassifier::from_parts(Linear::new(weight, Some(bias)), device, in_dim, out_dim)
    }

    #[test]
    fn preprocess_yields_normalized_rgb_tensor() {
        let mut png = Vec::new();
        let img = image::DynamicImage::new_rgb8(2, 2);
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let pixels = preprocess(&png).expect("valid png should decode");
        assert_eq!(pixels.len(), (INPUT_SIZE * INPUT_SIZE * 3) as usize);
        assert!(pixels.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn preprocess_rejects_garbage() {
        assert!(preprocess(b"not an image").is_err());
    }

    #[test]
    fn multi_class_scores_form_a_distribution() {
        let clf = tiny_classifier(3, 4);
        let scores = clf.scores(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(scores.len(), 3);
        let total: f32 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn single_logit_scores_stay_in_unit_interval() {
        let clf = tiny_classifier(1, 4);
        let scores = clf.scores(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(scores.len(), 1);
        assert!((0.0..=1.0).contains(&scores[0]));
    }

    #[test]
    fn wrong_input_length_is_rejected() {
        let clf = tiny_classifier(2, 4);
        assert!(clf.scores(&[0.1, 0.2]).is_err());
    }
}
