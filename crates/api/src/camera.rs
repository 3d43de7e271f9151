//! Shared camera handle, opened on first use and released when idle

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use camera_capture::{collect_frames, CameraConfig, CameraError, FrameSource, VideoFrame};
use tracing::info;

/// Opens a fresh frame source
pub type SourceFactory = Box<dyn Fn() -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync>;

pub struct Camera {
    factory: SourceFactory,
    source: Mutex<Option<Box<dyn FrameSource>>>,
}

impl Camera {
    pub fn new(factory: SourceFactory) -> Self {
        Self {
            factory,
            source: Mutex::new(None),
        }
    }

    pub fn from_config(config: CameraConfig) -> Self {
        Self::new(Box::new(move || config.open()))
    }

    fn source(&self) -> MutexGuard<'_, Option<Box<dyn FrameSource>>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn opened<'a>(
        &self,
        slot: &'a mut Option<Box<dyn FrameSource>>,
    ) -> Result<&'a mut Box<dyn FrameSource>, CameraError> {
        if slot.as_ref().map_or(true, |source| !source.is_open()) {
            *slot = Some((self.factory)()?);
            info!("Camera opened");
        }
        slot.as_mut().ok_or(CameraError::NotInitialized)
    }

    pub fn read_frame(&self) -> Result<VideoFrame, CameraError> {
        let mut slot = self.source();
        self.opened(&mut slot)?.read_frame()
    }

    /// Gather a calibration batch; reads that fail are skipped
    pub fn collect(&self, count: usize, interval: Duration) -> Result<Vec<VideoFrame>, CameraError> {
        let mut slot = self.source();
        let source = self.opened(&mut slot)?;
        Ok(collect_frames(source.as_mut(), count, interval))
    }

    pub fn is_open(&self) -> bool {
        self.source().as_ref().is_some_and(|source| source.is_open())
    }

    pub fn release(&self) {
        if let Some(mut source) = self.source().take() {
            source.release();
            info!("Camera released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::TestPatternSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_opens_lazily_and_reopens_after_release() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let camera = Camera::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestPatternSource::new(16, 12)) as Box<dyn FrameSource>)
        }));

        assert!(!camera.is_open());
        camera.read_frame().unwrap();
        camera.read_frame().unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        camera.release();
        assert!(!camera.is_open());
        assert_eq!(camera.collect(3, Duration::ZERO).unwrap().len(), 3);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let camera = Camera::new(Box::new(|| Err(CameraError::Open("unplugged".into()))));
        assert!(matches!(camera.read_frame(), Err(CameraError::Open(_))));
        assert!(camera.collect(10, Duration::ZERO).is_err());
    }
}
