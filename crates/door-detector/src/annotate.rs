//! Debug overlay for analysed frames

use ab_glyph::{FontRef, PxScale};
use camera_capture::VideoFrame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::change::ChangedRegion;
use crate::{DetectorError, DoorState};

/// Regions at or below this area (px²) are not boxed
pub const NOISE_FLOOR_AREA: f64 = 100.0;

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

static FONT_DATA: &[u8] = include_bytes!("../font/DejaVuSansMono.ttf");

const TEXT_SCALE: f32 = 24.0;
const TEXT_ORIGIN: (i32, i32) = (10, 10);
const LINE_SPACING: i32 = 30;

fn overlay_font() -> Result<FontRef<'static>, DetectorError> {
    FontRef::try_from_slice(FONT_DATA).map_err(|e| DetectorError::ImageProcessing(e.to_string()))
}

/// Two pixel wide box around `region`
fn draw_region(image: &mut RgbImage, region: &ChangedRegion) {
    let (x, y) = (region.x as i32, region.y as i32);
    draw_hollow_rect_mut(image, Rect::at(x, y).of_size(region.width, region.height), BOX_COLOR);
    draw_hollow_rect_mut(
        image,
        Rect::at(x - 1, y - 1).of_size(region.width + 2, region.height + 2),
        BOX_COLOR,
    );
}

/// Copy of `frame` with the committed state, change percentage and
/// boxes around every region above the noise floor
pub fn annotate(
    frame: &VideoFrame,
    state: DoorState,
    change_percent: f64,
    regions: &[ChangedRegion],
) -> Result<VideoFrame, DetectorError> {
    let mut image = frame
        .to_rgb_image()
        .map_err(|e| DetectorError::ImageProcessing(e.to_string()))?;

    let font = overlay_font()?;
    let scale = PxScale::from(TEXT_SCALE);
    let (tx, ty) = TEXT_ORIGIN;
    let status = format!("Door: {}", state.as_str());
    draw_text_mut(&mut image, TEXT_COLOR, tx, ty, scale, &font, &status);
    let change = format!("Change: {:.2}%", change_percent);
    draw_text_mut(&mut image, TEXT_COLOR, tx, ty + LINE_SPACING, scale, &font, &change);

    for region in regions.iter().filter(|r| r.area > NOISE_FLOOR_AREA) {
        draw_region(&mut image, region);
    }

    Ok(VideoFrame::from_rgb_image(image, frame.timestamp_ns, frame.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: u32, y: u32, side: u32, area: f64) -> ChangedRegion {
        ChangedRegion { x, y, width: side, height: side, area }
    }

    fn count_color(frame: &VideoFrame, color: Rgb<u8>) -> usize {
        frame
            .data
            .chunks_exact(3)
            .filter(|p| *p == color.0.as_slice())
            .count()
    }

    fn reddish(frame: &VideoFrame, x_range: std::ops::Range<u32>, y_range: std::ops::Range<u32>) -> usize {
        let mut count = 0;
        for y in y_range {
            for x in x_range.clone() {
                if let Some([r, g, b]) = frame.get_pixel(x, y) {
                    if r > 128 && g == 0 && b == 0 {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    #[test]
    fn test_text_is_drawn() {
        let frame = VideoFrame::filled(240, 80, [0, 0, 0]);
        let annotated = annotate(&frame, DoorState::Closed, 1.5, &[]).unwrap();
        // status line, then the change line below it
        assert!(reddish(&annotated, 0..240, 0..40) > 0);
        assert!(reddish(&annotated, 0..240, 40..80) > 0);
        assert_eq!(count_color(&annotated, BOX_COLOR), 0);
        assert_eq!(annotated.sequence, frame.sequence);
    }

    #[test]
    fn test_font_loads() {
        assert!(overlay_font().is_ok());
    }

    #[test]
    fn test_small_regions_are_not_boxed() {
        let frame = VideoFrame::filled(200, 200, [0, 0, 0]);
        let annotated = annotate(&frame, DoorState::Open, 0.0, &[region(120, 120, 10, 81.0)]).unwrap();
        assert_eq!(count_color(&annotated, BOX_COLOR), 0);

        let annotated = annotate(&frame, DoorState::Open, 0.0, &[region(120, 120, 20, 361.0)]).unwrap();
        assert_eq!(annotated.get_pixel(120, 130), Some([0, 255, 0]));
        assert_eq!(annotated.get_pixel(119, 130), Some([0, 255, 0]));
        assert_eq!(annotated.get_pixel(130, 130), Some([0, 0, 0]));
    }

    #[test]
    fn test_box_at_frame_edge_is_clipped() {
        let frame = VideoFrame::filled(50, 50, [0, 0, 0]);
        let annotated = annotate(&frame, DoorState::Open, 0.0, &[region(0, 0, 50, 2401.0)]).unwrap();
        assert_eq!(annotated.get_pixel(49, 49), Some([0, 255, 0]));
    }
}
