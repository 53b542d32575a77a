//! Image decoding into model tensors and mask encoding.
//!
//! Preprocessing mirrors the training pipeline of the change detection
//! network: RGB conversion, bilinear resize to the fixed model resolution and
//! scaling of 8-bit samples into [0, 1]. Tensors are channel-first.

use crate::config::ModelConfig;
use crate::error::DecodeError;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader};
use ndarray::Array3;
use std::io::Cursor;
use std::path::Path;

/// `[3, height, width]` tensor with values in [0, 1]
pub type ImageTensor = Array3<f32>;

/// Converts between image files and model tensors at a fixed resolution.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    width: u32,
    height: u32,
}

impl ImageCodec {
    /// Create a codec producing tensors of `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.image_width, config.image_height)
    }

    /// Model input resolution as (width, height).
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode an image file into a normalized tensor.
    ///
    /// The format is sniffed from the file content, not the extension:
    /// staged uploads carry a fixed name whatever their real encoding.
    pub fn decode<P: AsRef<Path>>(&self, path: P) -> Result<ImageTensor, DecodeError> {
        let image = open_image(path.as_ref())?;
        Ok(self.to_tensor(&image))
    }

    /// Convert an in-memory image into a normalized tensor.
    pub fn to_tensor(&self, image: &DynamicImage) -> ImageTensor {
        let rgb = image.to_rgb8();
        let rgb = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle)
        };

        Array3::from_shape_fn(
            (3, self.height as usize, self.width as usize),
            |(c, y, x)| rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        )
    }

    /// Serialize an 8-bit mask as PNG.
    pub fn encode(mask: &GrayImage) -> Result<Vec<u8>, DecodeError> {
        let mut bytes = Vec::new();
        mask.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(DecodeError::Encode)?;
        Ok(bytes)
    }

    /// Read a persisted mask back as single-channel 8-bit.
    pub fn read_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage, DecodeError> {
        Ok(open_image(path.as_ref())?.to_luma8())
    }
}

fn open_image(path: &Path) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    reader.decode().map_err(|source| DecodeError::Image {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn write_png(path: &Path, image: &RgbImage) {
        image.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_decode_resizes_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        write_png(&path, &RgbImage::from_pixel(40, 20, Rgb([255, 0, 51])));

        let codec = ImageCodec::new(16, 8);
        let tensor = codec.decode(&path).unwrap();

        assert_eq!(tensor.shape(), &[3, 8, 16]);
        assert!((tensor[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[1, 4, 4]].abs() < 1e-6);
        assert!((tensor[[2, 7, 15]] - 0.2).abs() < 1e-6);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_decode_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged_img1.jpg");
        write_png(&path, &RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));

        let tensor = ImageCodec::new(8, 8).decode(&path).unwrap();
        assert_eq!(tensor.shape(), &[3, 8, 8]);
    }

    #[test]
    fn test_decode_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = ImageCodec::new(8, 8).decode(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Image { .. }));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = ImageCodec::new(8, 8)
            .decode("/nonexistent/input.png")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Read { .. }));
    }

    #[test]
    fn test_encode_and_read_mask() {
        let dir = tempfile::tempdir().unwrap();
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(1, 2, Luma([255]));

        let bytes = ImageCodec::encode(&mask).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let path = dir.path().join("mask.png");
        std::fs::write(&path, &bytes).unwrap();
        let read = ImageCodec::read_mask(&path).unwrap();
        assert_eq!(read, mask);
    }
}
