//! Decode uploads and turn them into model input tensors.

use image::{imageops::FilterType, DynamicImage, RgbImage};
use serde::Deserialize;
use thiserror::Error;

/// Per-channel mean/std for the `torch` mode, RGB order.
const TORCH_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const TORCH_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Per-channel mean for the `caffe` mode, BGR order.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `[1, H, W, 3]`, as exported from Keras.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

/// Input normalization of the ImageNet model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Scale to `[-1, 1]` (MobileNet, Inception).
    #[default]
    Tf,
    /// Scale to `[0, 1]` then standardize per channel (DenseNet, torchvision exports).
    Torch,
    /// Swap to BGR and zero-center per channel without scaling (VGG, ResNet50).
    Caffe,
}

impl Normalization {
    /// Normalize one RGB pixel. The output is in model channel order (BGR for `Caffe`).
    pub fn apply(self, px: [u8; 3]) -> [f32; 3] {
        let v = px.map(f32::from);
        match self {
            Normalization::Tf => v.map(|x| x / 127.5 - 1.0),
            Normalization::Torch => [0, 1, 2].map(|c| (v[c] / 255.0 - TORCH_MEAN[c]) / TORCH_STD[c]),
            Normalization::Caffe => [0, 1, 2].map(|k| v[2 - k] - CAFFE_MEAN_BGR[k]),
        }
    }
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("undecodable image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Preprocessed batch-of-one input with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn data(&self) -> &[f32] { &self.data }
}

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    pub size: u32,
    pub layout: Layout,
    pub normalization: Normalization,
}

impl Preprocessor {
    pub fn new(size: u32, layout: Layout, normalization: Normalization) -> Self {
        Self { size, layout, normalization }
    }

    pub fn input_shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        match self.layout {
            Layout::Nhwc => [1, s, s, 3],
            Layout::Nchw => [1, 3, s, s],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// RGB conversion, square resize, normalization and layout in one pass.
    pub fn prepare(&self, image: &DynamicImage) -> ImageTensor {
        let rgb: RgbImage = image
            .resize_exact(self.size, self.size, FilterType::CatmullRom)
            .to_rgb8();
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let mut data = vec![0f32; w * h * 3];
        for (x, y, px) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for (c, v) in self.normalization.apply(px.0).into_iter().enumerate() {
                let idx = match self.layout {
                    Layout::Nhwc => (y * w + x) * 3 + c,
                    Layout::Nchw => c * h * w + y * w + x,
                };
                data[idx] = v;
            }
        }
        ImageTensor { shape: self.input_shape(), data }
    }

    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
        let image = Self::decode(bytes)?;
        Ok(self.prepare(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb};

    fn solid(w: u32, h: u32, px: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb(px)))
    }

    #[test]
    fn tf_mode_maps_to_unit_range() {
        assert_eq!(Normalization::Tf.apply([0, 255, 0]), [-1.0, 1.0, -1.0]);
    }

    #[test]
    fn caffe_mode_swaps_to_bgr() {
        let out = Normalization::Caffe.apply([10, 20, 30]);
        assert!((out[0] - (30.0 - 103.939)).abs() < 1e-4);
        assert!((out[2] - (10.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn torch_mode_standardizes() {
        let out = Normalization::Torch.apply([255, 255, 255]);
        assert!((out[0] - (1.0 - 0.485) / 0.229).abs() < 1e-4);
    }

    #[test]
    fn nhwc_tensor_has_batch_dimension() {
        let p = Preprocessor::new(224, Layout::Nhwc, Normalization::Tf);
        let t = p.prepare(&solid(100, 60, [255, 0, 0]));
        assert_eq!(t.shape(), &[1, 224, 224, 3]);
        assert_eq!(t.data().len(), 224 * 224 * 3);
        assert_eq!(&t.data()[..3], &[1.0, -1.0, -1.0]);
    }

    #[test]
    fn nchw_tensor_is_channel_planar() {
        let p = Preprocessor::new(8, Layout::Nchw, Normalization::Tf);
        let t = p.prepare(&solid(8, 8, [255, 0, 0]));
        assert_eq!(t.shape(), &[1, 3, 8, 8]);
        assert!(t.data()[..64].iter().all(|v| *v == 1.0));
        assert!(t.data()[64..].iter().all(|v| *v == -1.0));
    }

    #[test]
    fn grayscale_expands_to_three_channels() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([255])));
        let t = Preprocessor::new(4, Layout::Nhwc, Normalization::Tf).prepare(&gray);
        assert_eq!(t.data().len(), 4 * 4 * 3);
        assert!(t.data().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let p = Preprocessor::new(224, Layout::Nhwc, Normalization::Tf);
        assert!(matches!(p.prepare_bytes(b"not an image"), Err(PreprocessError::Decode(_))));
    }
}
