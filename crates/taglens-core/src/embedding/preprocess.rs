//! Image-to-tensor preprocessing shared by the ONNX backends.
//!
//! Both the SigLIP vision encoder and WD14-style multi-label classifiers expect:
//! - A square input (224/384 for SigLIP, 448 for WD14 taggers)
//! - Normalization: pixels scaled to [-1, 1] via (pixel/255 - 0.5) / 0.5
//! - Channel order: RGB
//!
//! They differ in tensor layout (SigLIP is NCHW, WD14 exports are usually NHWC)
//! and in the resize filter.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::config::TensorLayout;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Normalization mean (per-channel).
const NORM_MEAN: f32 = 0.5;

/// Normalization std (per-channel).
const NORM_STD: f32 = 0.5;

/// Resize `image` to `size × size`, convert to RGB, normalize to [-1, 1] and
/// lay the pixels out as a batch of one.
pub fn preprocess(
    image: &DynamicImage,
    size: u32,
    layout: TensorLayout,
    filter: FilterType,
) -> Array4<f32> {
    let resized = image.resize_exact(size, size, filter);
    let rgb = resized.to_rgb8();

    let side = size as usize;
    let shape = match layout {
        TensorLayout::Nchw => (1, CHANNELS, side, side),
        TensorLayout::Nhwc => (1, side, side, CHANNELS),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    // Index the raw RGB bytes directly rather than going through get_pixel()
    // and 4D ndarray indexing. A fresh zeros() array is always standard layout.
    let raw = rgb.as_raw();
    if let Some(tensor_data) = tensor.as_slice_mut() {
        for (i, pixel) in raw.chunks_exact(CHANNELS).enumerate() {
            let y = i / side;
            let x = i % side;
            for (c, &val) in pixel.iter().enumerate() {
                let idx = match layout {
                    TensorLayout::Nchw => c * side * side + y * side + x,
                    TensorLayout::Nhwc => (y * side + x) * CHANNELS + c,
                };
                tensor_data[idx] = (val as f32 / 255.0 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}
