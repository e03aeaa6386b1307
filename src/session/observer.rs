use super::state::CaptureState;
use tracing::info;

/// Lifecycle callbacks invoked by the controller on every transition.
///
/// Callbacks run after the session's internal lock is released, so they may
/// call back into the session.
pub trait SessionObserver: Send + Sync {
    fn on_exit_state(&self, _session_id: &str, _state: CaptureState) {}

    fn on_enter_state(&self, _session_id: &str, _state: CaptureState) {}
}

/// Observer that logs every state entry
pub struct LoggingObserver {
    name: String,
}

impl LoggingObserver {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl SessionObserver for LoggingObserver {
    fn on_enter_state(&self, session_id: &str, state: CaptureState) {
        info!("[{}] session {} entered {:?}", self.name, session_id, state);
    }
}
