use super::observer::SessionObserver;
use super::state::{CaptureState, SessionSettings, SessionSnapshot, Transition};
use crate::analysis::{AnalysisEndpoint, AnalysisResult, AnalysisUpload, CaptureKind};
use crate::device::{Facing, FacingHint, MediaDeviceProvider, MediaStream, StreamConstraints};
use crate::error::{CameraError, CaptureError, Result, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::frame::{encode_still, StillImage};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Camera capture session: acquire, capture, preview, submit.
///
/// Cheap to clone; clones control the same session. Every asynchronous
/// completion checks the session epoch before touching state, so results
/// that arrive after `cancel()` or `dispose()` are discarded.
#[derive(Clone)]
pub struct CaptureSession {
    shared: Arc<Shared>,
}

pub(super) struct Shared {
    id: String,
    kind: CaptureKind,
    devices: Arc<dyn MediaDeviceProvider>,
    endpoint: Arc<dyn AnalysisEndpoint>,
    settings: SessionSettings,
    facing: FacingHint,
    events: EventBus,
    inner: Mutex<Inner>,
}

struct Inner {
    state: CaptureState,
    stream: Option<Arc<dyn MediaStream>>,
    captured: Option<StillImage>,
    last_error: Option<String>,
    last_result: Option<AnalysisResult>,
    context: BTreeMap<String, String>,
    observers: Vec<Arc<dyn SessionObserver>>,
    /// Bumped by cancel/dispose; stale completions compare against it
    epoch: u64,
    cancel: CancellationToken,
    disposed: bool,
}

impl Inner {
    fn set_state(&mut self, to: CaptureState, transitions: &mut Vec<Transition>) {
        if self.state != to {
            transitions.push(Transition {
                from: self.state,
                to,
            });
            self.state = to;
        }
    }
}

/// How the acquiring stream was confirmed live
#[derive(Debug)]
enum ReadySource {
    Signal,
    Timeout,
}

impl CaptureSession {
    pub(super) fn from_parts(
        kind: CaptureKind,
        devices: Arc<dyn MediaDeviceProvider>,
        endpoint: Arc<dyn AnalysisEndpoint>,
        settings: SessionSettings,
        facing: FacingHint,
        context: BTreeMap<String, String>,
        observers: Vec<Arc<dyn SessionObserver>>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let events = EventBus::new(settings.event_bus_capacity);
        info!("Created {} capture session {}", kind, id);

        Self {
            shared: Arc::new(Shared {
                id,
                kind,
                devices,
                endpoint,
                settings,
                facing,
                events,
                inner: Mutex::new(Inner {
                    state: CaptureState::Idle,
                    stream: None,
                    captured: None,
                    last_error: None,
                    last_result: None,
                    context,
                    observers,
                    epoch: 0,
                    cancel: CancellationToken::new(),
                    disposed: false,
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn kind(&self) -> CaptureKind {
        self.shared.kind
    }

    pub fn state(&self) -> CaptureState {
        self.shared.inner.lock().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.inner.lock().last_error.clone()
    }

    pub fn captured_image(&self) -> Option<StillImage> {
        self.shared.inner.lock().captured.clone()
    }

    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.shared.inner.lock().last_result.clone()
    }

    pub fn has_open_stream(&self) -> bool {
        self.shared.inner.lock().stream.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.inner.lock().disposed
    }

    pub fn facing_hint(&self) -> &FacingHint {
        &self.shared.facing
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.lock();
        SessionSnapshot {
            session_id: self.shared.id.clone(),
            kind: self.shared.kind,
            state: inner.state,
            last_error: inner.last_error.clone(),
            has_stream: inner.stream.is_some(),
            captured_image: inner.captured.clone(),
            facing: self.shared.facing.get(),
            last_result: inner.last_result.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        let mut inner = self.shared.inner.lock();
        if !inner.disposed {
            inner.observers.push(observer);
        }
    }

    /// Attach an identifier sent with every upload (e.g. the owning store)
    pub fn set_context<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.shared
            .inner
            .lock()
            .context
            .insert(key.into(), value.into());
    }

    pub fn context(&self) -> BTreeMap<String, String> {
        self.shared.inner.lock().context.clone()
    }

    /// Acquire using the remembered facing preference
    pub async fn acquire_preferred(&self) -> Result<()> {
        self.acquire(self.shared.facing.get()).await
    }

    /// Open the camera and bring the session to `Live`.
    ///
    /// Calling this while already `Live` is a no-op. `Live` is entered when
    /// the stream signals ready or when the ready timeout elapses, whichever
    /// is first.
    pub async fn acquire(&self, preference: Facing) -> Result<()> {
        let mut transitions = Vec::new();
        let (epoch, token) = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(SessionError::Disposed);
            }

            match inner.state {
                CaptureState::Live => {
                    debug!("Session {} already live, ignoring acquire", self.shared.id);
                    return Ok(());
                }
                CaptureState::Idle => {}
                CaptureState::Succeeded => {
                    // Start the next capture before the confirmation delay ends
                    inner.epoch += 1;
                    inner.set_state(CaptureState::Idle, &mut transitions);
                }
                other => return Err(SessionError::invalid_state("acquire", other)),
            }

            self.shared.facing.set(preference);

            if !self.shared.devices.is_supported() {
                let err = CameraError::Unsupported;
                inner.last_error = Some(err.user_message());
                drop(inner);
                self.announce(transitions);
                self.report_failure("acquire", &err.user_message());
                return Err(err.into());
            }

            inner.last_error = None;
            inner.set_state(CaptureState::Acquiring, &mut transitions);
            (inner.epoch, inner.cancel.clone())
        };
        self.announce(transitions);

        let constraints = StreamConstraints::video(
            preference,
            self.shared.settings.ideal_width,
            self.shared.settings.ideal_height,
        );
        debug!(
            "Session {} requesting stream: {:?}",
            self.shared.id, constraints
        );

        // Not raced against cancellation: a stream that arrives late must
        // still be stopped, which only happens if the request completes.
        let requested = self.shared.devices.request_stream(&constraints).await;

        let stream: Arc<dyn MediaStream> = match requested {
            Ok(stream) => Arc::from(stream),
            Err(err) => {
                let mut transitions = Vec::new();
                {
                    let mut inner = self.shared.inner.lock();
                    if inner.disposed || inner.epoch != epoch {
                        debug!("Discarding acquisition failure after cancel: {}", err);
                        Self::settle_disposed(&mut inner);
                        return Err(SessionError::Cancelled);
                    }
                    inner.last_error = Some(err.user_message());
                    inner.set_state(CaptureState::Idle, &mut transitions);
                }
                self.announce(transitions);
                self.report_failure("acquire", &err.user_message());
                return Err(err.into());
            }
        };

        {
            let mut inner = self.shared.inner.lock();
            if inner.disposed || inner.epoch != epoch {
                Self::settle_disposed(&mut inner);
                drop(inner);
                warn!(
                    "Stream {} arrived after session {} was cancelled; stopping it",
                    stream.id(),
                    self.shared.id
                );
                stream.stop();
                return Err(SessionError::Cancelled);
            }
            if let Some(previous) = inner.stream.replace(Arc::clone(&stream)) {
                error!(
                    "Session {} already held stream {}; stopping it",
                    self.shared.id,
                    previous.id()
                );
                previous.stop();
            }
        }
        self.shared.events.publish(SessionEvent::StreamAcquired {
            session_id: self.shared.id.clone(),
            stream_id: stream.id().to_string(),
        });

        let source = tokio::select! {
            _ = stream.ready() => ReadySource::Signal,
            _ = sleep(self.shared.settings.ready_timeout) => ReadySource::Timeout,
            _ = token.cancelled() => return Err(SessionError::Cancelled),
        };

        let mut transitions = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.disposed || inner.epoch != epoch || inner.state != CaptureState::Acquiring {
                return Err(SessionError::Cancelled);
            }
            inner.set_state(CaptureState::Live, &mut transitions);
        }
        self.announce(transitions);

        match source {
            ReadySource::Signal => info!("Camera live for session {}", self.shared.id),
            ReadySource::Timeout => info!(
                "Camera assumed live for session {} after {:?} without ready signal",
                self.shared.id, self.shared.settings.ready_timeout
            ),
        }
        Ok(())
    }

    /// Take a still from the live stream and move to `Previewing`.
    ///
    /// Encoding runs on the blocking pool. The stream stays open so
    /// `retake()` can resume without a new permission prompt.
    pub async fn capture(&self) -> Result<StillImage> {
        let (stream, epoch) = {
            let inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(SessionError::Disposed);
            }
            if inner.state != CaptureState::Live {
                return Err(SessionError::invalid_state("capture", inner.state));
            }
            (inner.stream.clone(), inner.epoch)
        };

        let frame = stream
            .as_ref()
            .and_then(|s| s.frame_dimensions().and_then(|_| s.current_frame()));
        let quality = self.shared.settings.jpeg_quality;
        let encoded = match frame {
            Some(frame) => tokio::task::spawn_blocking(move || encode_still(&frame, quality))
                .await
                .unwrap_or_else(|e| {
                    Err(CaptureError::Encode {
                        details: format!("encoder task failed: {}", e),
                    })
                }),
            None => Err(CaptureError::NotReady),
        };

        let mut transitions = Vec::new();
        let still = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed || inner.epoch != epoch {
                return Err(SessionError::Cancelled);
            }
            if inner.state != CaptureState::Live {
                return Err(SessionError::invalid_state("capture", inner.state));
            }
            match encoded {
                Ok(still) => {
                    inner.captured = Some(still.clone());
                    inner.set_state(CaptureState::Previewing, &mut transitions);
                    still
                }
                Err(err) => {
                    inner.last_error = Some(err.user_message());
                    drop(inner);
                    self.report_failure("capture", &err.user_message());
                    return Err(err.into());
                }
            }
        };

        self.shared.events.publish(SessionEvent::ImageCaptured {
            session_id: self.shared.id.clone(),
            capture_id: still.capture_id.clone(),
            width: still.width,
            height: still.height,
            bytes: still.len(),
        });
        self.announce(transitions);
        Ok(still)
    }

    /// Discard the still and resume the live preview on the same stream
    pub fn retake(&self) -> Result<()> {
        let mut transitions = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(SessionError::Disposed);
            }
            if inner.state != CaptureState::Previewing {
                return Err(SessionError::invalid_state("retake", inner.state));
            }
            if let Some(discarded) = inner.captured.take() {
                debug!("Discarded still {}", discarded.capture_id);
            }
            inner.set_state(CaptureState::Live, &mut transitions);
        }
        self.announce(transitions);
        Ok(())
    }

    /// Upload the still for analysis.
    ///
    /// On rejection the session passes through `Failed` back to
    /// `Previewing` with `last_error` set, keeping the still and stream so
    /// the caller can retry or retake. On success the stream is released,
    /// the still dropped, and the session rests in `Succeeded` until the
    /// reset delay returns it to `Idle`.
    pub async fn submit(&self) -> Result<AnalysisResult> {
        let mut transitions = Vec::new();
        let (upload, epoch, token) = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(SessionError::Disposed);
            }
            if inner.state != CaptureState::Previewing {
                return Err(SessionError::invalid_state("submit", inner.state));
            }
            let image = inner
                .captured
                .clone()
                .ok_or_else(|| SessionError::invalid_state("submit", inner.state))?;

            inner.last_error = None;
            inner.set_state(CaptureState::Submitting, &mut transitions);
            let upload = AnalysisUpload {
                kind: self.shared.kind,
                image,
                fields: inner.context.clone(),
            };
            (upload, inner.epoch, inner.cancel.clone())
        };
        self.announce(transitions);

        let outcome = tokio::select! {
            outcome = self.shared.endpoint.analyze(&upload) => outcome,
            _ = token.cancelled() => return Err(SessionError::Cancelled),
        };

        let mut transitions = Vec::new();
        let released = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed || inner.epoch != epoch || inner.state != CaptureState::Submitting {
                debug!("Discarding submit result after cancel");
                return Err(SessionError::Cancelled);
            }

            match &outcome {
                Ok(result) => {
                    inner.captured = None;
                    inner.last_result = Some(result.clone());
                    inner.set_state(CaptureState::Succeeded, &mut transitions);
                    inner.stream.take()
                }
                Err(err) => {
                    inner.last_error = Some(err.user_message());
                    inner.set_state(CaptureState::Failed, &mut transitions);
                    inner.set_state(CaptureState::Previewing, &mut transitions);
                    None
                }
            }
        };

        if let Some(stream) = released {
            self.release_stream(stream);
        }
        self.announce(transitions);

        match outcome {
            Ok(result) => {
                self.shared.events.publish(SessionEvent::AnalysisCompleted {
                    session_id: self.shared.id.clone(),
                    capture_id: upload.image.capture_id.clone(),
                    sku: result.sku_style_me.clone(),
                    products: result.products.len(),
                });
                self.schedule_success_reset(epoch);
                Ok(result)
            }
            Err(err) => {
                self.report_failure("submit", &err.user_message());
                Err(err.into())
            }
        }
    }

    /// Release everything and return to `Idle`. Safe from any state.
    pub fn cancel(&self) {
        let mut transitions = Vec::new();
        let stream = {
            let mut inner = self.shared.inner.lock();
            Self::reset_locked(&mut inner, &mut transitions)
        };

        if let Some(stream) = stream {
            self.release_stream(stream);
        }
        if !transitions.is_empty() {
            info!("Session {} cancelled", self.shared.id);
        }
        self.announce(transitions);
    }

    /// Tear the session down: reset to `Idle` and detach every observer in
    /// one step.
    ///
    /// No stream is open once this returns; later operations fail with
    /// `SessionError::Disposed`.
    pub fn dispose(&self) {
        let mut transitions = Vec::new();
        let (stream, observers, already) = {
            let mut inner = self.shared.inner.lock();
            let stream = Self::reset_locked(&mut inner, &mut transitions);
            let already = inner.disposed;
            inner.disposed = true;
            inner.context.clear();
            // Detached now; they still hear the final transition to Idle
            let observers = std::mem::take(&mut inner.observers);
            (stream, observers, already)
        };

        if let Some(stream) = stream {
            self.release_stream(stream);
        }
        self.announce_to(&observers, transitions);

        if !already {
            info!("Session {} disposed", self.shared.id);
            self.shared.events.publish(SessionEvent::Disposed {
                session_id: self.shared.id.clone(),
            });
        }
    }

    /// A disposed session always rests in `Idle`
    fn settle_disposed(inner: &mut Inner) {
        if inner.disposed && inner.state != CaptureState::Idle {
            let mut ignored = Vec::new();
            inner.set_state(CaptureState::Idle, &mut ignored);
        }
    }

    fn reset_locked(
        inner: &mut Inner,
        transitions: &mut Vec<Transition>,
    ) -> Option<Arc<dyn MediaStream>> {
        inner.epoch += 1;
        inner.cancel.cancel();
        inner.cancel = CancellationToken::new();
        inner.captured = None;
        inner.last_error = None;
        inner.set_state(CaptureState::Idle, transitions);
        inner.stream.take()
    }

    fn schedule_success_reset(&self, epoch: u64) {
        let delay = self.shared.settings.success_reset_delay;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);

        tokio::spawn(async move {
            sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                CaptureSession { shared }.finish_success(epoch);
            }
        });
    }

    fn finish_success(&self, epoch: u64) {
        let mut transitions = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.disposed || inner.epoch != epoch || inner.state != CaptureState::Succeeded {
                return;
            }
            inner.set_state(CaptureState::Idle, &mut transitions);
        }
        debug!("Session {} reset after success", self.shared.id);
        self.announce(transitions);
    }

    fn release_stream(&self, stream: Arc<dyn MediaStream>) {
        stream.stop();
        debug!("Session {} released stream {}", self.shared.id, stream.id());
        self.shared.events.publish(SessionEvent::StreamReleased {
            session_id: self.shared.id.clone(),
            stream_id: stream.id().to_string(),
        });
    }

    fn report_failure(&self, operation: &str, message: &str) {
        self.shared.events.publish(SessionEvent::OperationFailed {
            session_id: self.shared.id.clone(),
            operation: operation.to_string(),
            message: message.to_string(),
        });
    }

    /// Deliver transitions to observers and the event bus, outside the lock
    fn announce(&self, transitions: Vec<Transition>) {
        if transitions.is_empty() {
            return;
        }
        let observers = self.shared.inner.lock().observers.clone();
        self.announce_to(&observers, transitions);
    }

    fn announce_to(&self, observers: &[Arc<dyn SessionObserver>], transitions: Vec<Transition>) {
        for transition in transitions {
            debug!(
                "Session {}: {:?} -> {:?}",
                self.shared.id, transition.from, transition.to
            );
            for observer in observers {
                observer.on_exit_state(&self.shared.id, transition.from);
                observer.on_enter_state(&self.shared.id, transition.to);
            }
            self.shared.events.publish(SessionEvent::StateChanged {
                session_id: self.shared.id.clone(),
                from: transition.from,
                to: transition.to,
                timestamp: Utc::now(),
            });
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(stream) = self.inner.get_mut().stream.take() {
            warn!(
                "Session {} dropped while holding stream {}; stopping it",
                self.id,
                stream.id()
            );
            stream.stop();
        }
    }
}
