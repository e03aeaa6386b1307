use crate::session::CaptureState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Operation '{operation}' is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },

    #[error("Operation was cancelled before it completed")]
    Cancelled,

    #[error("Capture session has been disposed")]
    Disposed,

    #[error("System error: {message}")]
    System { message: String },
}

/// Errors raised while acquiring a camera stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Media capture is not supported in this environment")]
    Unsupported,

    #[error("Camera permission was denied")]
    PermissionDenied,

    #[error("No matching camera device was found")]
    NoDevice,

    #[error("Camera stream failed: {details}")]
    StreamFailed { details: String },
}

/// Errors raised while taking a still frame from the live stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera is not producing frames yet")]
    NotReady,

    #[error("Failed to encode still image: {details}")]
    Encode { details: String },
}

/// Errors raised while uploading a still to the analysis endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("{0}")]
    ServerRejected(String),

    #[error("Invalid response from analysis endpoint: {0}")]
    InvalidResponse(String),
}

impl CameraError {
    pub fn user_message(&self) -> String {
        match self {
            CameraError::Unsupported => "Camera is not available on this device".to_string(),
            CameraError::PermissionDenied => {
                "Camera permission denied. Allow camera access and try again".to_string()
            }
            CameraError::NoDevice => "No camera found".to_string(),
            CameraError::StreamFailed { .. } => "Could not start the camera".to_string(),
        }
    }
}

impl CaptureError {
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::NotReady => "Camera is not ready yet, try again".to_string(),
            CaptureError::Encode { .. } => "Could not capture the photo".to_string(),
        }
    }
}

impl SubmitError {
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::NetworkFailure(_) => {
                "Could not reach the server. Check your connection and try again".to_string()
            }
            SubmitError::ServerRejected(message) => message.clone(),
            SubmitError::InvalidResponse(_) => "Unexpected response from the server".to_string(),
        }
    }
}

impl SessionError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: CaptureState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Camera(e) => e.user_message(),
            SessionError::Capture(e) => e.user_message(),
            SessionError::Submit(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
