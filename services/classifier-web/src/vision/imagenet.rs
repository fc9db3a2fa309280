//! ImageNet class-index table and top-k decoding of model output.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const NUM_CLASSES: usize = 1000;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("`decode_predictions` expects a batch of predictions (i.e. a 2D array of shape (samples, {NUM_CLASSES})). Found array with shape: {0:?}")]
    Shape(Vec<usize>),
    #[error("{len} values cannot fill shape {shape:?}")]
    Buffer { shape: Vec<usize>, len: usize },
    #[error("class index has no entry for {0}")]
    UnknownClass(usize),
    #[error("class index unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("class index malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row-major model output with its shape, normally `[samples, classes]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBatch {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl ScoreBatch {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, DecodeError> {
        if shape.iter().product::<usize>() != values.len() {
            return Err(DecodeError::Buffer { shape, len: values.len() });
        }
        Ok(Self { shape, values })
    }

    pub fn from_row(row: Vec<f32>) -> Self { Self { shape: vec![1, row.len()], values: row } }

    pub fn shape(&self) -> &[usize] { &self.shape }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        let width = self.shape.last().copied().unwrap_or(0).max(1);
        self.values.chunks(width)
    }

    /// Turn logits into probabilities row by row.
    pub fn softmax_rows(&mut self) {
        let width = self.shape.last().copied().unwrap_or(0).max(1);
        for row in self.values.chunks_mut(width) { softmax(row); }
    }
}

fn softmax(v: &mut [f32]) {
    if v.is_empty() { return; }
    let max = v.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for x in v.iter_mut() { *x = (*x - max).exp(); sum += *x; }
    if sum > 0.0 { for x in v.iter_mut() { *x /= sum; } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub imagenet_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub imagenet_id: String,
    pub label: String,
    pub score: f32,
}

/// Static mapping from output position to `(wnid, label)`.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    entries: HashMap<usize, ClassEntry>,
}

impl ClassIndex {
    /// Read the Keras `imagenet_class_index.json` layout: `{"0": ["n01440764", "tench"], ...}`.
    pub fn load(path: &Path) -> Result<Self, DecodeError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DecodeError> {
        let raw: HashMap<usize, (String, String)> = serde_json::from_str(text)?;
        Ok(Self::from_entries(raw))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (usize, (String, String))>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(i, (imagenet_id, label))| (i, ClassEntry { imagenet_id, label }))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn get(&self, idx: usize) -> Option<&ClassEntry> { self.entries.get(&idx) }

    /// Top-`top` classes per row, highest score first. Ties keep the lower index first.
    pub fn decode_predictions(&self, preds: &ScoreBatch, top: usize) -> Result<Vec<Vec<Prediction>>, DecodeError> {
        if preds.shape().len() != 2 || preds.shape()[1] != NUM_CLASSES {
            return Err(DecodeError::Shape(preds.shape().to_vec()));
        }
        let mut results = Vec::with_capacity(preds.shape()[0]);
        for row in preds.rows() {
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
            order.truncate(top.min(row.len()));
            let result = order
                .into_iter()
                .map(|i| {
                    let entry = self.get(i).ok_or(DecodeError::UnknownClass(i))?;
                    Ok(Prediction { imagenet_id: entry.imagenet_id.clone(), label: entry.label.clone(), score: row[i] })
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) fn synthetic_index() -> ClassIndex {
    ClassIndex::from_entries((0..NUM_CLASSES).map(|i| (i, (format!("n{i:08}"), format!("class_{i}")))))
}
