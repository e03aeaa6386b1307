use crate::session::CaptureState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events emitted by a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The session moved between states
    StateChanged {
        session_id: String,
        from: CaptureState,
        to: CaptureState,
        timestamp: DateTime<Utc>,
    },
    /// A camera stream is now owned by the session
    StreamAcquired {
        session_id: String,
        stream_id: String,
    },
    /// The session stopped its camera stream
    StreamReleased {
        session_id: String,
        stream_id: String,
    },
    /// A still was captured for preview
    ImageCaptured {
        session_id: String,
        capture_id: String,
        width: u32,
        height: u32,
        bytes: usize,
    },
    /// An operation failed with a user-facing message
    OperationFailed {
        session_id: String,
        operation: String,
        message: String,
    },
    /// The analysis endpoint accepted the still
    AnalysisCompleted {
        session_id: String,
        capture_id: String,
        sku: Option<String>,
        products: usize,
    },
    /// The hosting context tore the session down
    Disposed { session_id: String },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::StateChanged { session_id, .. }
            | SessionEvent::StreamAcquired { session_id, .. }
            | SessionEvent::StreamReleased { session_id, .. }
            | SessionEvent::ImageCaptured { session_id, .. }
            | SessionEvent::OperationFailed { session_id, .. }
            | SessionEvent::AnalysisCompleted { session_id, .. }
            | SessionEvent::Disposed { session_id } => session_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::StateChanged { from, to, .. } => {
                format!("State changed: {:?} -> {:?}", from, to)
            }
            SessionEvent::StreamAcquired { stream_id, .. } => {
                format!("Stream acquired: {}", stream_id)
            }
            SessionEvent::StreamReleased { stream_id, .. } => {
                format!("Stream released: {}", stream_id)
            }
            SessionEvent::ImageCaptured {
                capture_id,
                width,
                height,
                bytes,
                ..
            } => format!(
                "Image captured: {} ({}x{}, {} bytes)",
                capture_id, width, height, bytes
            ),
            SessionEvent::OperationFailed {
                operation, message, ..
            } => format!("{} failed: {}", operation, message),
            SessionEvent::AnalysisCompleted { sku, products, .. } => format!(
                "Analysis completed: sku {} ({} products)",
                sku.as_deref().unwrap_or("-"),
                products
            ),
            SessionEvent::Disposed { .. } => "Session disposed".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::StreamAcquired { .. } => "stream_acquired",
            SessionEvent::StreamReleased { .. } => "stream_released",
            SessionEvent::ImageCaptured { .. } => "image_captured",
            SessionEvent::OperationFailed { .. } => "operation_failed",
            SessionEvent::AnalysisCompleted { .. } => "analysis_completed",
            SessionEvent::Disposed { .. } => "disposed",
        }
    }
}

/// Event bus for session observers using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: SessionEvent) -> usize {
        match &event {
            SessionEvent::OperationFailed {
                operation, message, ..
            } => {
                warn!("Capture {} failed: {}", operation, message);
            }
            SessionEvent::AnalysisCompleted { .. } => {
                info!("{}", event.description());
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        // No subscribers is normal for headless sessions
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(4);
        let delivered = bus.publish(SessionEvent::Disposed {
            session_id: "s1".to_string(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(SessionEvent::StateChanged {
            session_id: "s1".to_string(),
            from: CaptureState::Idle,
            to: CaptureState::Acquiring,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "state_changed");
        assert_eq!(event.session_id(), "s1");
        assert_eq!(event.description(), "State changed: Idle -> Acquiring");
    }
}
