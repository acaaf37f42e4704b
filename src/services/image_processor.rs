// src/services/image_processor.rs
use crate::errors::OutfitError;
use crate::models::UploadedImage;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GenericImageView, imageops::FilterType};

const ACCEPTED_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

pub struct ImageProcessor {
    max_bytes: usize,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImageProcessor {
    pub fn new(max_bytes: usize, max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_bytes,
            max_dimension,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks the declared media type and payload size. Does not decode.
    pub fn validate(&self, image: &UploadedImage) -> Result<(), OutfitError> {
        let mime = image.mime_type.to_ascii_lowercase();
        if !ACCEPTED_TYPES.contains(&mime.as_str()) {
            return Err(OutfitError::Validation(format!(
                "unsupported image type {}, upload a JPG or PNG",
                image.mime_type
            )));
        }
        if image.size() == 0 {
            return Err(OutfitError::Validation("the uploaded image is empty".to_string()));
        }
        if image.size() > self.max_bytes {
            return Err(OutfitError::Validation(format!(
                "image is {} bytes, the limit is {} bytes",
                image.size(),
                self.max_bytes
            )));
        }
        Ok(())
    }

    /// Re-encodes the image as JPEG, shrinking it so the longest side fits
    /// `max_dimension`. Deterministic for identical input bytes.
    pub fn normalize(&self, image: &UploadedImage) -> Result<UploadedImage, OutfitError> {
        let img = image::load_from_memory(&image.data)
            .map_err(|e| OutfitError::Validation(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();
        let img = if width > self.max_dimension || height > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        let rgb = img.to_rgb8();
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.jpeg_quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| {
                OutfitError::Validation(format!("Failed to encode normalized image: {}", e))
            })?;

        Ok(UploadedImage {
            filename: image.filename.clone(),
            mime_type: "image/jpeg".to_string(),
            data: output.into(),
        })
    }
}

#[cfg(test)]
pub(crate) fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, 90)
        .encode(img.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();
    output
}
