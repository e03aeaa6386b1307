use super::provider::{MediaDeviceProvider, MediaStream};
use super::types::StreamConstraints;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Media devices backed by an image file on disk.
///
/// Every stream serves the decoded image as its live frame, which lets the
/// capture flow run on machines without a camera.
pub struct StillImageDevices {
    path: PathBuf,
}

impl StillImageDevices {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MediaDeviceProvider for StillImageDevices {
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        if !self.path.is_file() {
            warn!("Still image source not found: {}", self.path.display());
            return Err(CameraError::NoDevice);
        }

        debug!(
            "Opening still image source {} (facing {} ignored, ideal {}x{})",
            self.path.display(),
            constraints.facing,
            constraints.ideal_width,
            constraints.ideal_height
        );

        let path = self.path.clone();
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::StreamFailed {
                details: format!("decoder task failed: {}", e),
            })?
            .map_err(|e| CameraError::StreamFailed {
                details: format!("failed to decode {}: {}", self.path.display(), e),
            })?
            .to_rgb8();

        let (width, height) = decoded.dimensions();
        info!(
            "Still image source ready: {} ({}x{})",
            self.path.display(),
            width,
            height
        );

        Ok(Box::new(StillImageStream {
            id: format!("file:{}", self.path.display()),
            pixels: Arc::new(decoded.into_raw()),
            width,
            height,
            frame_counter: AtomicU64::new(0),
            active: AtomicBool::new(true),
        }))
    }
}

struct StillImageStream {
    id: String,
    pixels: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    frame_counter: AtomicU64,
    active: AtomicBool,
}

#[async_trait]
impl MediaStream for StillImageStream {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ready(&self) {}

    fn frame_dimensions(&self) -> Option<(u32, u32)> {
        if self.is_active() && self.width > 0 && self.height > 0 {
            Some((self.width, self.height))
        } else {
            None
        }
    }

    fn current_frame(&self) -> Option<FrameData> {
        self.frame_dimensions()?;
        Some(FrameData {
            id: self.frame_counter.fetch_add(1, Ordering::Relaxed),
            timestamp: SystemTime::now(),
            data: Arc::clone(&self.pixels),
            width: self.width,
            height: self.height,
            format: FrameFormat::Rgb24,
        })
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Still image stream {} stopped", self.id);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
