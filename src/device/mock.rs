use super::provider::{MediaDeviceProvider, MediaStream};
use super::types::StreamConstraints;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// How the mock answers a stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    NoDevice,
    Unsupported,
}

/// When a mock stream reports ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyBehavior {
    Immediate,
    After(Duration),
    Never,
}

/// Mock media devices for testing without camera hardware.
///
/// Tracks how many streams are open so leaks show up in tests.
pub struct MockMediaDevices {
    supported: bool,
    outcome: Mutex<PermissionOutcome>,
    ready: ReadyBehavior,
    acquisition_delay: Duration,
    frame_size: Option<(u32, u32)>,
    open_streams: Arc<AtomicUsize>,
    streams_opened: AtomicUsize,
    last_constraints: Mutex<Option<StreamConstraints>>,
}

impl MockMediaDevices {
    /// Grants every request; streams are ready immediately with 64x48 frames
    pub fn new() -> Self {
        Self {
            supported: true,
            outcome: Mutex::new(PermissionOutcome::Granted),
            ready: ReadyBehavior::Immediate,
            acquisition_delay: Duration::ZERO,
            frame_size: Some((64, 48)),
            open_streams: Arc::new(AtomicUsize::new(0)),
            streams_opened: AtomicUsize::new(0),
            last_constraints: Mutex::new(None),
        }
    }

    pub fn with_outcome(self, outcome: PermissionOutcome) -> Self {
        *self.outcome.lock() = outcome;
        self
    }

    pub fn with_ready(mut self, ready: ReadyBehavior) -> Self {
        self.ready = ready;
        self
    }

    /// Simulate a permission prompt that takes a while to answer
    pub fn with_acquisition_delay(mut self, delay: Duration) -> Self {
        self.acquisition_delay = delay;
        self
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = Some((width, height));
        self
    }

    /// Streams never produce a frame
    pub fn without_frames(mut self) -> Self {
        self.frame_size = None;
        self
    }

    /// Host has no media capture capability
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Change the answer for subsequent requests
    pub fn set_outcome(&self, outcome: PermissionOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Streams currently open (not yet stopped)
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Total streams ever handed out
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        self.last_constraints.lock().clone()
    }
}

impl Default for MockMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDeviceProvider for MockMediaDevices {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        *self.last_constraints.lock() = Some(constraints.clone());

        if !self.acquisition_delay.is_zero() {
            tokio::time::sleep(self.acquisition_delay).await;
        }

        let outcome = *self.outcome.lock();
        match outcome {
            PermissionOutcome::Granted => {}
            PermissionOutcome::Denied => return Err(CameraError::PermissionDenied),
            PermissionOutcome::NoDevice => return Err(CameraError::NoDevice),
            PermissionOutcome::Unsupported => return Err(CameraError::Unsupported),
        }

        let index = self.streams_opened.fetch_add(1, Ordering::SeqCst);
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        debug!("Mock stream {} opened ({})", index, constraints.facing);

        Ok(Box::new(MockStream {
            id: format!("mock-{}", index),
            ready: self.ready,
            frame_size: self.frame_size,
            frame_counter: AtomicU64::new(0),
            active: AtomicBool::new(true),
            open_streams: Arc::clone(&self.open_streams),
        }))
    }
}

struct MockStream {
    id: String,
    ready: ReadyBehavior,
    frame_size: Option<(u32, u32)>,
    frame_counter: AtomicU64,
    active: AtomicBool,
    open_streams: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaStream for MockStream {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ready(&self) {
        match self.ready {
            ReadyBehavior::Immediate => {}
            ReadyBehavior::After(delay) => tokio::time::sleep(delay).await,
            ReadyBehavior::Never => std::future::pending::<()>().await,
        }
    }

    fn frame_dimensions(&self) -> Option<(u32, u32)> {
        if self.is_active() {
            self.frame_size
        } else {
            None
        }
    }

    fn current_frame(&self) -> Option<FrameData> {
        let (width, height) = self.frame_dimensions()?;
        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let shade = (id % 256) as u8;
        let data = (0..width * height)
            .flat_map(|i| [shade, (i % 256) as u8, 128])
            .collect();

        Some(FrameData::new(
            id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
            debug!("Mock stream {} stopped", self.id);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
