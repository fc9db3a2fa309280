//! ONNX inference through tract.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use super::classifier::{ImageClassifier, InferenceError};
use super::imagenet::ScoreBatch;
use super::preprocess::ImageTensor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct TractClassifier {
    name: String,
    plan: Plan,
    input_shape: [usize; 4],
}

impl TractClassifier {
    /// Load, pin the input shape, optimize, and run one warm-up pass.
    pub fn load(name: &str, path: &Path, input_shape: [usize; 4], expected_sha256: Option<&str>) -> Result<Self, InferenceError> {
        if let Some(expected) = expected_sha256.filter(|s| !s.is_empty()) {
            verify_checksum(path, expected)?;
        }
        let start = Instant::now();
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(0, f32::fact(input_shape).into())?
            .into_optimized()?
            .into_runnable()?;
        let this = Self { name: name.to_string(), plan, input_shape };
        this.warmup()?;
        info!(model = %this.name, path = %path.display(), ?input_shape, elapsed_ms = start.elapsed().as_millis() as u64, "model loaded");
        Ok(this)
    }

    fn warmup(&self) -> Result<(), InferenceError> {
        let dim: usize = self.input_shape.iter().product();
        let zeros = vec![0f32; dim];
        let input = Tensor::from_shape(&self.input_shape, &zeros[..])?;
        self.plan.run(tvec!(input.into_tvalue()))?;
        debug!(model = %self.name, "warmup inference done");
        Ok(())
    }
}

fn verify_checksum(path: &Path, expected: &str) -> Result<(), InferenceError> {
    let bytes = std::fs::read(path)?;
    let got = hex::encode(Sha256::digest(&bytes));
    if !expected.eq_ignore_ascii_case(&got) {
        return Err(InferenceError::Checksum { expected: expected.to_string(), got });
    }
    Ok(())
}

impl ImageClassifier for TractClassifier {
    fn model_name(&self) -> &str { &self.name }

    fn predict(&self, input: &ImageTensor) -> Result<ScoreBatch, InferenceError> {
        let tensor = Tensor::from_shape(input.shape(), input.data())?;
        let outputs = self.plan.run(tvec!(tensor.into_tvalue()))?;
        let view = outputs[0].to_array_view::<f32>()?;
        Ok(ScoreBatch::new(view.shape().to_vec(), view.iter().copied().collect())?)
    }
}
