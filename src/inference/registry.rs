use std::collections::HashMap;
use std::path::Path;

use candle_core::Device;
use tracing::{info, warn};

use super::classifier::{preprocess, CandleClassifier, Classifier};
use super::{reduce_scores, Category, Verdict};

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("could not decode uploaded image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference failed: {0}")]
    Inference(#[from] anyhow::Error),
}

/// Maps categories to loaded classifiers. Built once at startup and shared
/// read-only; a category without a model resolves to the simulated verdict.
pub struct ModelRegistry {
    models: HashMap<Category, Box<dyn Classifier>>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Try loading one weight file per category. A missing or unloadable
    /// model logs a warning and leaves the category in the simulated branch;
    /// the process still starts.
    pub fn load(models_dir: &Path, device: &Device) -> Self {
        let mut models: HashMap<Category, Box<dyn Classifier>> = HashMap::new();
        for category in Category::ALL {
            let path = models_dir.join(category.model_file());
            if !path.exists() {
                warn!(%category, path = %path.display(), "model file missing; classification simulated");
                continue;
            }
            match CandleClassifier::load(&path, device) {
                Ok(clf) => {
                    info!(%category, path = %path.display(), "model loaded");
                    models.insert(category, Box::new(clf));
                }
                Err(e) => {
                    warn!(%category, error = %e, "model load failed; classification simulated");
                }
            }
        }
        Self { models }
    }

    #[cfg(test)]
    pub fn with_model(mut self, category: Category, model: Box<dyn Classifier>) -> Self {
        self.models.insert(category, model);
        self
    }

    pub fn is_loaded(&self, category: Category) -> bool {
        self.models.contains_key(&category)
    }

    /// Classify an uploaded image. The fallback path never touches the image
    /// bytes, so an unregistered category succeeds even for undecodable data.
    pub fn classify(&self, category: Category, image_bytes: &[u8]) -> Result<Verdict, ClassifyError> {
        let Some(model) = self.models.get(&category) else {
            return Ok(Verdict::simulated());
        };
        let pixels = preprocess(image_bytes)?;
        let scores = model.scores(&pixels)?;
        Ok(reduce_scores(&scores)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Status;

    struct FixedScores(Vec<f32>);

    impl Classifier for FixedScores {
        fn scores(&self, _pixels: &[f32]) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn tiny_png() -> Vec<u8> {
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn unregistered_category_simulates_normal() {
        let registry = ModelRegistry::empty();
        for category in Category::ALL {
            let v = registry.classify(category, b"irrelevant").unwrap();
            assert_eq!(v.status, Status::Normal);
            assert_eq!(v.confidence, 95.0);
            assert!(v.simulated);
        }
    }

    #[test]
    fn registered_category_runs_the_model() {
        let registry = ModelRegistry::empty()
            .with_model(Category::Brain, Box::new(FixedScores(vec![0.1, 0.9])));
        let v = registry.classify(Category::Brain, &tiny_png()).unwrap();
        assert_eq!(v.status, Status::Detected);
        assert_eq!(v.confidence, 90.0);
        assert!(!v.simulated);
    }

    #[test]
    fn registered_category_rejects_undecodable_upload() {
        let registry = ModelRegistry::empty()
            .with_model(Category::Brain, Box::new(FixedScores(vec![0.2])));
        let err = registry.classify(Category::Brain, b"garbage").unwrap_err();
        assert!(matches!(err, ClassifyError::Decode(_)));
    }

    #[test]
    fn loading_from_missing_dir_keeps_all_categories_simulated() {
        let registry = ModelRegistry::load(Path::new("/nonexistent"), &Device::Cpu);
        for category in Category::ALL {
            assert!(!registry.is_loaded(category));
        }
    }
}
