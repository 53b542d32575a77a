//! Upload validation against a fixed extension allow-list

use crate::config::UploadConfig;
use crate::error::ValidationError;
use crate::types::UploadedImage;

/// Which uploads the service accepts.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new<I, S>(allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.allowed_extensions)
    }

    /// True when the text after the last `.` is an allowed extension.
    pub fn is_allowed(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions.iter().any(|allowed| *allowed == ext)
            }
            None => false,
        }
    }

    /// Check a single upload.
    pub fn validate(&self, image: &UploadedImage) -> Result<(), ValidationError> {
        if image.filename.is_empty() {
            return Err(ValidationError::EmptyFilename);
        }

        if !self.is_allowed(&image.filename) {
            return Err(ValidationError::DisallowedExtension {
                filename: image.filename.clone(),
                allowed: self.allowed_extensions.join(", "),
            });
        }

        if image.data.is_empty() {
            return Err(ValidationError::EmptyFile {
                filename: image.filename.clone(),
            });
        }

        Ok(())
    }

    /// Require both uploads and validate them in order.
    pub fn validate_pair(
        &self,
        image1: Option<UploadedImage>,
        image2: Option<UploadedImage>,
    ) -> Result<(UploadedImage, UploadedImage), ValidationError> {
        let (Some(image1), Some(image2)) = (image1, image2) else {
            return Err(ValidationError::MissingImage);
        };

        self.validate(&image1)?;
        self.validate(&image2)?;

        Ok((image1, image2))
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> UploadedImage {
        UploadedImage::new(name, vec![1, 2, 3])
    }

    #[test]
    fn test_allowed_extensions() {
        let policy = UploadPolicy::default();

        assert!(policy.is_allowed("before.png"));
        assert!(policy.is_allowed("after.JPEG"));
        assert!(policy.is_allowed("scene.2024.tiff"));
        assert!(policy.is_allowed(".bmp"));
        assert!(!policy.is_allowed("malware.exe"));
        assert!(!policy.is_allowed("png"));
        assert!(!policy.is_allowed("archive.png.zip"));
        assert!(!policy.is_allowed("image.tif"));
    }

    #[test]
    fn test_missing_image() {
        let policy = UploadPolicy::default();

        let err = policy.validate_pair(Some(upload("a.png")), None).unwrap_err();
        assert_eq!(err, ValidationError::MissingImage);

        let err = policy.validate_pair(None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingImage);
    }

    #[test]
    fn test_empty_filename() {
        let policy = UploadPolicy::default();
        let err = policy
            .validate_pair(Some(upload("")), Some(upload("b.png")))
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyFilename);
    }

    #[test]
    fn test_disallowed_extension() {
        let policy = UploadPolicy::default();
        let err = policy
            .validate_pair(Some(upload("malware.exe")), Some(upload("b.png")))
            .unwrap_err();

        match err {
            ValidationError::DisallowedExtension { filename, allowed } => {
                assert_eq!(filename, "malware.exe");
                assert_eq!(allowed, "png, jpg, jpeg, bmp, tiff");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_content() {
        let policy = UploadPolicy::default();
        let err = policy
            .validate_pair(Some(upload("a.png")), Some(UploadedImage::new("b.png", vec![])))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EmptyFile {
                filename: "b.png".to_string()
            }
        );
    }

    #[test]
    fn test_valid_pair() {
        let policy = UploadPolicy::new(["PNG", ".jpg"]);
        let (a, b) = policy
            .validate_pair(Some(upload("a.png")), Some(upload("b.jpg")))
            .unwrap();
        assert_eq!(a.filename, "a.png");
        assert_eq!(b.filename, "b.jpg");
    }
}
