use super::controller::CaptureSession;
use super::observer::SessionObserver;
use super::state::SessionSettings;
use crate::analysis::{AnalysisEndpoint, CaptureKind};
use crate::config::CaptureAppConfig;
use config::ConfigError;
use crate::device::{FacingHint, MediaDeviceProvider};
use crate::error::{Result, SessionError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Multipart field carrying the owning store
pub const STORE_ID_FIELD: &str = "lojaId";

/// Builder for capture sessions
pub struct CaptureSessionBuilder {
    kind: CaptureKind,
    devices: Option<Arc<dyn MediaDeviceProvider>>,
    endpoint: Option<Arc<dyn AnalysisEndpoint>>,
    settings: SessionSettings,
    facing: Option<FacingHint>,
    context: BTreeMap<String, String>,
    observers: Vec<Arc<dyn SessionObserver>>,
    invalid_config: Option<ConfigError>,
}

impl CaptureSessionBuilder {
    pub fn new(kind: CaptureKind) -> Self {
        Self {
            kind,
            devices: None,
            endpoint: None,
            settings: SessionSettings::default(),
            facing: None,
            context: BTreeMap::new(),
            observers: Vec::new(),
            invalid_config: None,
        }
    }

    pub fn devices(mut self, devices: Arc<dyn MediaDeviceProvider>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn endpoint(mut self, endpoint: Arc<dyn AnalysisEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Take settings, and the store id if any, from application config.
    /// An invalid config makes `build()` fail.
    pub fn config(mut self, config: &CaptureAppConfig) -> Self {
        self.invalid_config = config.validate().err();
        self.settings = SessionSettings::from_config(config);
        if let Some(store_id) = &config.analysis.store_id {
            self.context
                .insert(STORE_ID_FIELD.to_string(), store_id.clone());
        }
        if let (None, Some(facing)) = (&self.facing, config.camera.default_facing) {
            self.facing = Some(FacingHint::new(facing));
        }
        self
    }

    /// Share a facing preference with other sessions
    pub fn facing_hint(mut self, facing: FacingHint) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<CaptureSession> {
        if let Some(err) = self.invalid_config {
            return Err(err.into());
        }
        let devices = self
            .devices
            .ok_or_else(|| SessionError::system("Media device provider must be specified"))?;
        let endpoint = self
            .endpoint
            .ok_or_else(|| SessionError::system("Analysis endpoint must be specified"))?;
        let facing = self
            .facing
            .unwrap_or_else(|| FacingHint::new(self.kind.default_facing()));

        Ok(CaptureSession::from_parts(
            self.kind,
            devices,
            endpoint,
            self.settings,
            facing,
            self.context,
            self.observers,
        ))
    }
}
