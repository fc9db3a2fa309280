use thiserror::Error;

use super::imagenet::{DecodeError, ScoreBatch};
use super::preprocess::ImageTensor;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model file unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("model hash mismatch expected={expected} got={got}")]
    Checksum { expected: String, got: String },
    #[error("unexpected model output: {0}")]
    Output(#[from] DecodeError),
    #[error("inference backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Pretrained classifier used as a black box: preprocessed input in, raw scores out.
pub trait ImageClassifier: Send + Sync {
    fn model_name(&self) -> &str;
    fn predict(&self, input: &ImageTensor) -> Result<ScoreBatch, InferenceError>;
}

/// Returns the same score row for every input.
#[derive(Debug, Clone)]
pub struct StaticClassifier {
    name: String,
    scores: Vec<f32>,
}

impl StaticClassifier {
    pub fn new(name: impl Into<String>, scores: Vec<f32>) -> Self {
        Self { name: name.into(), scores }
    }

    /// `classes` scores that all lose to `winner`, which gets `probability`.
    pub fn peaked(name: impl Into<String>, classes: usize, winner: usize, probability: f32) -> Self {
        let rest = if classes > 1 { (1.0 - probability) / (classes - 1) as f32 } else { 0.0 };
        let mut scores = vec![rest; classes];
        if let Some(s) = scores.get_mut(winner) { *s = probability; }
        Self::new(name, scores)
    }
}

impl ImageClassifier for StaticClassifier {
    fn model_name(&self) -> &str { &self.name }

    fn predict(&self, _input: &ImageTensor) -> Result<ScoreBatch, InferenceError> {
        Ok(ScoreBatch::from_row(self.scores.clone()))
    }
}
