//! Frame sources

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::{CameraError, VideoFrame};

/// A device or file that produces RGB frames on demand
pub trait FrameSource: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Whether the source can still deliver frames
    fn is_open(&self) -> bool;

    /// Release the underlying device
    fn release(&mut self);
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Read `count` frames, `interval` apart, skipping failed reads
pub fn collect_frames<S: FrameSource + ?Sized>(
    source: &mut S,
    count: usize,
    interval: Duration,
) -> Vec<VideoFrame> {
    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        match source.read_frame() {
            Ok(frame) => frames.push(frame),
            Err(e) => warn!("Calibration frame {} unavailable: {}", i, e),
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    debug!("Collected {}/{} frames", frames.len(), count);
    frames
}

/// Shared switch that opens or closes the synthetic door
#[derive(Debug, Clone, Default)]
pub struct DoorHandle(Arc<AtomicBool>);

impl DoorHandle {
    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Synthetic camera: a textured wall with a door that can be swung open
pub struct TestPatternSource {
    width: u32,
    height: u32,
    door: DoorHandle,
    sequence: u32,
    open: bool,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_door(width, height, DoorHandle::default())
    }

    /// Scene whose door follows an existing handle
    pub fn with_door(width: u32, height: u32, door: DoorHandle) -> Self {
        Self {
            width,
            height,
            door,
            sequence: 0,
            open: true,
        }
    }

    /// Handle for toggling the door from another thread
    pub fn door(&self) -> DoorHandle {
        self.door.clone()
    }

    /// Door rectangle: middle third horizontally, lower three quarters vertically
    pub fn door_region(&self) -> (u32, u32, u32, u32) {
        let x = self.width / 3;
        let y = self.height / 4;
        (x, y, self.width / 3, self.height - y)
    }

    fn render(&self) -> VideoFrame {
        let (dx, dy, dw, dh) = self.door_region();
        let door_open = self.door.is_open();
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let in_door = x >= dx && x < dx + dw && y >= dy && y < dy + dh;
                let pixel = if in_door && door_open {
                    // lit corridor behind the door
                    [230, 225, 200]
                } else if in_door {
                    [90, 60, 40]
                } else {
                    let shade = if (x / 16 + y / 16) % 2 == 0 { 128 } else { 136 };
                    [shade, shade, shade]
                };
                data.extend_from_slice(&pixel);
            }
        }
        VideoFrame::new(data, self.width, self.height, now_ns(), self.sequence)
    }
}

impl FrameSource for TestPatternSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        let frame = self.render();
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) {
        self.open = false;
    }
}

/// Plays back the images of a directory in file-name order, looping forever
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    width: u32,
    height: u32,
    cursor: usize,
    sequence: u32,
    open: bool,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

impl ImageSequenceSource {
    /// Scan `dir` for images; frames are resized to `width`x`height` when needed
    pub fn open(dir: impl AsRef<Path>, width: u32, height: u32) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!("no images in {}", dir.display())));
        }
        info!("Opened image sequence {} ({} frames)", dir.display(), files.len());

        Ok(Self {
            files,
            width,
            height,
            cursor: 0,
            sequence: 0,
            open: true,
        })
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();

        let mut rgb = image::open(path)?.to_rgb8();
        if rgb.dimensions() != (self.width, self.height) {
            rgb = image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle);
        }

        let frame = VideoFrame::from_rgb_image(rgb, now_ns(), self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) {
        self.open = false;
    }
}
