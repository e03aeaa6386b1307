use crate::analysis::{AnalysisResult, CaptureKind};
use crate::config::CaptureAppConfig;
use crate::device::Facing;
use crate::frame::StillImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Acquiring,
    Live,
    Previewing,
    Submitting,
    Succeeded,
    Failed,
}

impl CaptureState {
    /// States in which a still must be held
    pub fn holds_image(&self) -> bool {
        matches!(self, CaptureState::Previewing | CaptureState::Submitting)
    }

    /// States in which the session may own a camera stream
    pub fn may_hold_stream(&self) -> bool {
        matches!(
            self,
            CaptureState::Acquiring
                | CaptureState::Live
                | CaptureState::Previewing
                | CaptureState::Submitting
        )
    }
}

/// A state change, reported to observers and the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CaptureState,
    pub to: CaptureState,
}

/// Tunables for a session, usually taken from `CaptureAppConfig`
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upper bound on waiting for the stream ready signal
    pub ready_timeout: Duration,
    /// Time spent in `Succeeded` before resetting to `Idle`
    pub success_reset_delay: Duration,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub jpeg_quality: u8,
    pub event_bus_capacity: usize,
}

impl SessionSettings {
    pub fn from_config(config: &CaptureAppConfig) -> Self {
        Self {
            ready_timeout: config.session.ready_timeout(),
            success_reset_delay: config.session.success_reset_delay(),
            ideal_width: config.camera.ideal_width,
            ideal_height: config.camera.ideal_height,
            jpeg_quality: config.camera.jpeg_quality,
            event_bus_capacity: config.session.event_bus_capacity,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&CaptureAppConfig::default())
    }
}

/// Point-in-time view of a session for rendering
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub kind: CaptureKind,
    pub state: CaptureState,
    pub last_error: Option<String>,
    pub has_stream: bool,
    pub captured_image: Option<StillImage>,
    pub facing: Facing,
    pub last_result: Option<AnalysisResult>,
}
