//! Reference image construction
//!
//! Every frame, whether used for calibration or detection, goes through
//! the same [`preprocess`] step so that differencing compares like with like.

use camera_capture::VideoFrame;
use image::GrayImage;
use imageproc::filter::separable_filter_equal;

use crate::DetectorError;

/// Side length of the square Gaussian kernel
pub const BLUR_KERNEL_SIZE: usize = 21;

/// Sigma implied by a kernel size when none is given explicitly
fn sigma_for_kernel(size: usize) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights for [`BLUR_KERNEL_SIZE`]
pub fn gaussian_kernel() -> [f32; BLUR_KERNEL_SIZE] {
    let sigma = sigma_for_kernel(BLUR_KERNEL_SIZE);
    let center = (BLUR_KERNEL_SIZE / 2) as f32;
    let mut kernel = [0.0f32; BLUR_KERNEL_SIZE];
    for (i, weight) in kernel.iter_mut().enumerate() {
        let d = i as f32 - center;
        *weight = (-(d * d) / (2.0 * sigma * sigma)).exp();
    }
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Grayscale conversion followed by the fixed Gaussian blur
pub fn preprocess(frame: &VideoFrame) -> Result<GrayImage, DetectorError> {
    if !frame.is_well_formed() {
        return Err(DetectorError::InvalidFrame(format!(
            "{}x{} frame with {} bytes",
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }
    let gray = GrayImage::from_raw(frame.width, frame.height, frame.to_grayscale())
        .ok_or_else(|| DetectorError::InvalidFrame("grayscale buffer size".into()))?;
    Ok(separable_filter_equal(&gray, &gaussian_kernel()))
}

/// Pixel-wise mean of the preprocessed frames, truncated to 8 bits
pub fn build_reference(frames: &[VideoFrame]) -> Result<GrayImage, DetectorError> {
    let first = frames.first().ok_or(DetectorError::EmptyCalibration)?;
    let (width, height) = (first.width, first.height);

    if let Some(odd) = frames.iter().find(|f| (f.width, f.height) != (width, height)) {
        return Err(DetectorError::FrameSizeMismatch {
            expected_width: width,
            expected_height: height,
            width: odd.width,
            height: odd.height,
        });
    }

    let mut sums = vec![0u32; (width * height) as usize];
    for frame in frames {
        let blurred = preprocess(frame)?;
        for (sum, value) in sums.iter_mut().zip(blurred.as_raw()) {
            *sum += u32::from(*value);
        }
    }

    let count = frames.len() as u32;
    let mean = sums.into_iter().map(|sum| (sum / count) as u8).collect();
    GrayImage::from_raw(width, height, mean)
        .ok_or_else(|| DetectorError::ImageProcessing("reference buffer size".into()))
}
