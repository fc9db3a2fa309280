//! Image preprocessing, inference backends and ImageNet label decoding.

use thiserror::Error;

pub mod classifier;
pub mod imagenet;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod predictor;
pub mod preprocess;

pub use classifier::{ImageClassifier, InferenceError, StaticClassifier};
pub use imagenet::{ClassEntry, ClassIndex, DecodeError, Prediction, ScoreBatch, NUM_CLASSES};
#[cfg(feature = "onnx")]
pub use onnx::TractClassifier;
pub use predictor::{PredictionResult, Predictor};
pub use preprocess::{ImageTensor, Layout, Normalization, PreprocessError, Preprocessor};

/// Failure anywhere between raw upload bytes and a decoded label.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
