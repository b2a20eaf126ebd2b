use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod registry;

pub use registry::ModelRegistry;

/// Scan types the application accepts. One classifier per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Brain,
    Pneumonia,
    Retina,
    Skin,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Brain,
        Category::Pneumonia,
        Category::Retina,
        Category::Skin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Brain => "brain",
            Category::Pneumonia => "pneumonia",
            Category::Retina => "retina",
            Category::Skin => "skin",
        }
    }

    /// Weight file looked up under the models directory at startup.
    pub fn model_file(&self) -> String {
        format!("{}.safetensors", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brain" => Ok(Category::Brain),
            "pneumonia" => Ok(Category::Pneumonia),
            "retina" => Ok(Category::Retina),
            "skin" => Ok(Category::Skin),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown scan category: {0}")]
pub struct UnknownCategory(pub String);

/// Binary verdict over a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Detected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Normal => f.write_str("Normal"),
            Status::Detected => f.write_str("Detected"),
        }
    }
}

/// Outcome of one classification pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub status: Status,
    /// Percentage strength of the verdict, rounded to two decimals.
    pub confidence: f32,
    /// True when no model was registered and the hardcoded fallback was used.
    pub simulated: bool,
}

impl Verdict {
    /// Fallback used whenever a category has no loaded model.
    pub fn simulated() -> Self {
        Self {
            status: Status::Normal,
            confidence: 95.0,
            simulated: true,
        }
    }

    /// Percentage string as persisted in history rows, e.g. "95.0%".
    pub fn confidence_label(&self) -> String {
        format_confidence(self.confidence)
    }
}

/// Reduce raw model scores into a verdict.
///
/// Multi-class output: argmax decides, with index 0 meaning Normal.
/// Single scalar: 0.5 threshold, confidence is the probability of whichever
/// side won.
pub fn reduce_scores(scores: &[f32]) -> anyhow::Result<Verdict> {
    let verdict = match scores {
        [] => anyhow::bail!("model produced no scores"),
        [p] => {
            let status = if *p > 0.5 {
                Status::Detected
            } else {
                Status::Normal
            };
            let winning = if *p > 0.5 { *p } else { 1.0 - *p };
            Verdict {
                status,
                confidence: round2(winning * 100.0),
                simulated: false,
            }
        }
        many => {
            let (idx, top) = many
                .iter()
                .enumerate()
                .fold((0usize, f32::MIN), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                });
            Verdict {
                status: if idx == 0 {
                    Status::Normal
                } else {
                    Status::Detected
                },
                confidence: round2(top * 100.0),
                simulated: false,
            }
        }
    };
    Ok(verdict)
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Render a confidence percentage the way history rows store it: at least one
/// decimal place, at most two, no trailing zero on the second.
pub fn format_confidence(conf: f32) -> String {
    let s = format!("{conf:.2}");
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0%")
    } else {
        format!("{trimmed}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Brain".parse::<Category>().unwrap(), Category::Brain);
        assert_eq!("SKIN".parse::<Category>().unwrap(), Category::Skin);
        assert!("xray".parse::<Category>().is_err());
    }

    #[test]
    fn multi_class_scores_take_argmax() {
        let v = reduce_scores(&[0.1, 0.9]).unwrap();
        assert_eq!(v.status, Status::Detected);
        assert_eq!(v.confidence, 90.0);
        assert!(!v.simulated);
    }

    #[test]
    fn multi_class_index_zero_is_normal() {
        let v = reduce_scores(&[0.8, 0.15, 0.05]).unwrap();
        assert_eq!(v.status, Status::Normal);
        assert_eq!(v.confidence, 80.0);
    }

    #[test]
    fn scalar_below_threshold_is_normal() {
        let v = reduce_scores(&[0.3]).unwrap();
        assert_eq!(v.status, Status::Normal);
        assert_eq!(v.confidence, 70.0);
    }

    #[test]
    fn scalar_above_threshold_is_detected() {
        let v = reduce_scores(&[0.7]).unwrap();
        assert_eq!(v.status, Status::Detected);
        assert_eq!(v.confidence, 70.0);
    }

    #[test]
    fn empty_scores_are_an_error() {
        assert!(reduce_scores(&[]).is_err());
    }

    #[test]
    fn confidence_rounds_to_two_decimals() {
        let v = reduce_scores(&[0.1234568, 0.8765432]).unwrap();
        assert_eq!(v.confidence, 87.65);
    }

    #[test]
    fn confidence_label_keeps_one_decimal_minimum() {
        assert_eq!(format_confidence(95.0), "95.0%");
        assert_eq!(format_confidence(87.65), "87.65%");
        assert_eq!(format_confidence(87.5), "87.5%");
        assert_eq!(
            Verdict::simulated().confidence_label(),
            "95.0%"
        );
    }
}
