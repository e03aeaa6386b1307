use super::types::StreamConstraints;
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;

/// Source of camera streams (the host's media devices)
#[async_trait]
pub trait MediaDeviceProvider: Send + Sync {
    /// Whether the host exposes any media capture capability at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Request a video stream matching the constraints.
    ///
    /// This may suspend on a permission prompt. Errors map to
    /// `PermissionDenied`, `NoDevice` or `Unsupported`.
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// A live handle to camera hardware. Must be stopped explicitly.
#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Identifier for logging
    fn id(&self) -> &str;

    /// Resolves once the video sink reports it is producing frames.
    /// Some environments never fire this, so callers bound the wait.
    async fn ready(&self);

    /// Native dimensions of the current frame, if any frame exists yet
    fn frame_dimensions(&self) -> Option<(u32, u32)>;

    /// Read the current frame at native dimensions
    fn current_frame(&self) -> Option<FrameData>;

    /// Stop every track. Idempotent.
    fn stop(&self);

    fn is_active(&self) -> bool;
}
