pub mod analysis;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod frame;
pub mod session;

pub use analysis::{
    AnalysisEndpoint, AnalysisResult, AnalysisUpload, CaptureKind, HttpAnalysisEndpoint,
};
pub use config::{AnalysisConfig, CameraConfig, CaptureAppConfig, SessionConfig};
pub use device::{
    Facing, FacingHint, MediaDeviceProvider, MediaStream, MockMediaDevices, PermissionOutcome,
    ReadyBehavior, StillImageDevices, StreamConstraints,
};
pub use error::{CameraError, CaptureError, Result, SessionError, SubmitError};
pub use events::{EventBus, SessionEvent};
pub use frame::{encode_still, FrameData, FrameFormat, StillImage};
pub use session::{
    CaptureSession, CaptureSessionBuilder, CaptureState, LoggingObserver, SessionObserver,
    SessionSettings, SessionSnapshot, Transition, STORE_ID_FIELD,
};
