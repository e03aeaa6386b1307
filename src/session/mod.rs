mod builder;
mod controller;
mod observer;
mod state;

pub use builder::{CaptureSessionBuilder, STORE_ID_FIELD};
pub use controller::CaptureSession;
pub use observer::{LoggingObserver, SessionObserver};
pub use state::{CaptureState, SessionSettings, SessionSnapshot, Transition};
