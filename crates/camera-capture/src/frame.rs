//! Video frame types and processing

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::CameraError;

/// JPEG quality used for the live feed
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0, 0)
    }

    /// Wrap an `RgbImage`
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Copy the pixels into an `RgbImage`
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Format(format!(
                "{} bytes do not describe a {}x{} RGB frame",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True when the buffer length matches the declared geometry
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() as u64 == self.pixel_count() * 3
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114)
                .round()
                .min(255.0) as u8;
            gray.push(y);
        }
        gray
    }

    /// Encode the frame as baseline JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        if !self.is_well_formed() {
            return Err(CameraError::Format("cannot encode a malformed frame".into()));
        }
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality).write_image(
            &self.data,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }

    /// Encode as JPEG and wrap in standard base64, ready for a data URL
    pub fn to_jpeg_base64(&self, quality: u8) -> Result<String, CameraError> {
        Ok(BASE64_STANDARD.encode(self.encode_jpeg(quality)?))
    }
}
