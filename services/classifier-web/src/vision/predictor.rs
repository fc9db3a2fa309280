use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::classifier::ImageClassifier;
use super::imagenet::ClassIndex;
use super::preprocess::Preprocessor;
use super::VisionError;

/// One entry of the `/predict` response `results` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub model: String,
    #[serde(rename = "imagenetID")]
    pub imagenet_id: String,
    pub label: String,
    pub probability: f64,
}

/// Bytes in, best ImageNet label out. Shared read-only across requests.
pub struct Predictor {
    classifier: Arc<dyn ImageClassifier>,
    class_index: ClassIndex,
    preprocessor: Preprocessor,
    apply_softmax: bool,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn ImageClassifier>, class_index: ClassIndex, preprocessor: Preprocessor, apply_softmax: bool) -> Self {
        Self { classifier, class_index, preprocessor, apply_softmax }
    }

    pub fn model_name(&self) -> &str { self.classifier.model_name() }

    /// Blocking; run it off the async reactor.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<PredictionResult, VisionError> {
        let start = Instant::now();
        let input = self.preprocessor.prepare_bytes(bytes)?;
        let mut scores = self.classifier.predict(&input)?;
        if self.apply_softmax { scores.softmax_rows(); }
        snapclass_core::record_inference_latency(start.elapsed());

        let decoded = self.class_index.decode_predictions(&scores, 1)?;
        let best = decoded
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| super::DecodeError::Shape(scores.shape().to_vec()))?;
        debug!(label = %best.label, score = best.score, "top-1 decoded");
        Ok(PredictionResult {
            model: self.model_name().to_string(),
            imagenet_id: best.imagenet_id,
            label: best.label,
            probability: f64::from(best.score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::imagenet::synthetic_index;
    use crate::vision::{Layout, Normalization, StaticClassifier};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(32, 24)).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn predictor(classifier: StaticClassifier, softmax: bool) -> Predictor {
        Predictor::new(Arc::new(classifier), synthetic_index(), Preprocessor::new(224, Layout::Nhwc, Normalization::Tf), softmax)
    }

    #[test]
    fn returns_top_label_with_model_name() {
        let p = predictor(StaticClassifier::peaked("MobileNetV2", 1000, 281, 0.8), false);
        let out = p.classify_bytes(&png_bytes()).unwrap();
        assert_eq!(out.model, "MobileNetV2");
        assert_eq!(out.label, "class_281");
        assert_eq!(out.imagenet_id, "n00000281");
        assert!((out.probability - 0.8).abs() < 1e-6);
    }

    #[test]
    fn softmax_turns_logits_into_probability() {
        let mut logits = vec![0.0f32; 1000];
        logits[5] = 20.0;
        let p = predictor(StaticClassifier::new("Logits", logits), true);
        let out = p.classify_bytes(&png_bytes()).unwrap();
        assert_eq!(out.label, "class_5");
        assert!(out.probability > 0.99 && out.probability <= 1.0);
    }

    #[test]
    fn wrong_output_width_is_a_decode_error() {
        let p = predictor(StaticClassifier::peaked("Short", 999, 0, 0.5), false);
        assert!(matches!(p.classify_bytes(&png_bytes()), Err(VisionError::Decode(_))));
    }

    #[test]
    fn undecodable_upload_is_a_preprocess_error() {
        let p = predictor(StaticClassifier::peaked("M", 1000, 0, 0.5), false);
        assert!(matches!(p.classify_bytes(b"\x00\x01junk"), Err(VisionError::Preprocess(_))));
    }

    #[test]
    fn serializes_with_camel_case_imagenet_id() {
        let r = PredictionResult { model: "M".into(), imagenet_id: "n1".into(), label: "l".into(), probability: 0.5 };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["imagenetID"], "n1");
        assert_eq!(v["probability"], 0.5);
    }
}
