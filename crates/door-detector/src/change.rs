//! Change analysis between a preprocessed frame and the reference

use image::{GrayImage, Luma};
use image::imageops::replace;
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Dilation radius: two passes of a 3x3 square element
pub const DILATION_RADIUS: u8 = 2;

const CHANGED: u8 = 255;

/// Bounding box and enclosed area of one external contour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangedRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Polygon area enclosed by the contour (px²)
    pub area: f64,
}

/// Result of comparing one frame against the reference
#[derive(Debug, Clone)]
pub struct ChangeAnalysis {
    /// Dilated binary change mask
    pub mask: GrayImage,
    /// External contours of the mask
    pub regions: Vec<ChangedRegion>,
    /// Sum of all region areas
    pub total_area: f64,
    /// `total_area` as a percentage of the frame area
    pub change_percent: f64,
}

/// Absolute difference thresholded to a binary mask (`> threshold` is changed)
pub fn difference_mask(reference: &GrayImage, current: &GrayImage, threshold: i32) -> GrayImage {
    GrayImage::from_fn(current.width(), current.height(), |x, y| {
        let diff = reference.get_pixel(x, y)[0].abs_diff(current.get_pixel(x, y)[0]);
        if i32::from(diff) > threshold {
            Luma([CHANGED])
        } else {
            Luma([0])
        }
    })
}

/// Shoelace area of a closed contour
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 / 2.0
}

fn bounding_region(points: &[Point<i32>], area: f64) -> Option<ChangedRegion> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(ChangedRegion {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
        area,
    })
}

/// External (outermost) contours of a binary mask as regions.
///
/// Pixels outside the mask count as background, so regions touching the
/// frame edge are traced like any other.
pub fn external_regions(mask: &GrayImage) -> Vec<ChangedRegion> {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .filter_map(|c| {
            let points: Vec<Point<i32>> = c.points.iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect();
            bounding_region(&points, polygon_area(&points))
        })
        .collect()
}

/// Full change pipeline: difference, threshold, dilation, contour areas
pub fn analyze(reference: &GrayImage, current: &GrayImage, threshold: i32) -> ChangeAnalysis {
    let mask = dilate(
        &difference_mask(reference, current, threshold),
        Norm::LInf,
        DILATION_RADIUS,
    );
    let regions = external_regions(&mask);
    let total_area = regions.iter().fold(0.0, |acc, r| acc + r.area);
    let frame_area = f64::from(current.width()) * f64::from(current.height());

    ChangeAnalysis {
        change_percent: total_area / frame_area * 100.0,
        total_area,
        regions,
        mask,
    }
}
