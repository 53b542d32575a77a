//! Conversion of raw change scores into a binary mask and a change ratio

use crate::codec::ImageCodec;
use crate::error::InferenceError;
use image::{GrayImage, Luma};
use ndarray::{ArrayD, Axis, Ix2};
use std::path::Path;
use tracing::{debug, error};

/// Probability above which a pixel counts as changed
pub const CHANGE_THRESHOLD: f32 = 0.5;

/// Mask value for changed pixels
pub const CHANGED: u8 = 255;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Threshold sigmoid probabilities into a 0/255 mask.
///
/// Length-1 axes (batch, channel first or last) are dropped while more than
/// two remain; what is left must be a non-empty `[H, W]` map. NaN scores fall
/// on the unchanged side.
pub fn binarize(scores: &ArrayD<f32>) -> Result<GrayImage, InferenceError> {
    let mut view = scores.view();
    while view.ndim() > 2 {
        match view.shape().iter().position(|&len| len == 1) {
            Some(axis) => view = view.index_axis_move(Axis(axis), 0),
            None => break,
        }
    }

    let plane = view
        .into_dimensionality::<Ix2>()
        .map_err(|_| InferenceError::UnexpectedOutputShape(scores.shape().to_vec()))?;

    let (height, width) = plane.dim();
    if height == 0 || width == 0 {
        return Err(InferenceError::UnexpectedOutputShape(scores.shape().to_vec()));
    }

    let mut mask = GrayImage::new(width as u32, height as u32);
    for ((y, x), &score) in plane.indexed_iter() {
        if sigmoid(score) > CHANGE_THRESHOLD {
            mask.put_pixel(x as u32, y as u32, Luma([CHANGED]));
        }
    }

    Ok(mask)
}

/// Percentage of nonzero pixels, rounded to two decimals. `None` for an empty mask.
pub fn change_ratio(mask: &GrayImage) -> Option<f64> {
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return None;
    }

    let changed = mask.pixels().filter(|p| p[0] != 0).count() as f64;
    let percentage = changed / total as f64 * 100.0;
    Some((percentage * 100.0).round() / 100.0)
}

/// Measure the change ratio of a persisted mask. Failures are logged and yield `None`.
pub fn measure<P: AsRef<Path>>(mask_path: P) -> Option<f64> {
    let mask_path = mask_path.as_ref();
    match ImageCodec::read_mask(mask_path) {
        Ok(mask) => {
            let ratio = change_ratio(&mask);
            debug!(path = %mask_path.display(), ratio = ?ratio, "Measured change ratio");
            ratio
        }
        Err(e) => {
            error!(path = %mask_path.display(), error = %e, "Error calculating percentage change");
            None
        }
    }
}
