use crate::device::Facing;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureAppConfig {
    pub camera: CameraConfig,
    pub session: SessionConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Ideal capture width requested from the device
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,

    /// Ideal capture height requested from the device
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,

    /// Facing used before any preference is recorded; the capture kind
    /// decides when unset
    pub default_facing: Option<Facing>,

    /// JPEG quality for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Upper bound on waiting for the stream ready signal
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// How long the success state is shown before resetting to idle
    #[serde(default = "default_success_reset_delay_ms")]
    pub success_reset_delay_ms: u64,

    /// Session event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// Endpoint that classifies product photos
    #[serde(default = "default_product_url")]
    pub product_url: String,

    /// Endpoint that analyses profile photos
    #[serde(default = "default_profile_url")]
    pub profile_url: String,

    /// Multipart field name of the image part
    #[serde(default = "default_image_field")]
    pub image_field: String,

    /// Owning store sent with every upload
    pub store_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl SessionConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn success_reset_delay(&self) -> Duration {
        Duration::from_millis(self.success_reset_delay_ms)
    }
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl CaptureAppConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("styleme.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.ideal_width", default_ideal_width())?
            .set_default("camera.ideal_height", default_ideal_height())?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("session.ready_timeout_ms", default_ready_timeout_ms())?
            .set_default(
                "session.success_reset_delay_ms",
                default_success_reset_delay_ms(),
            )?
            .set_default(
                "session.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("analysis.product_url", default_product_url())?
            .set_default("analysis.profile_url", default_profile_url())?
            .set_default("analysis.image_field", default_image_field())?
            .set_default(
                "analysis.request_timeout_seconds",
                default_request_timeout_seconds(),
            )?
            .add_source(File::with_name(&path_str).required(false))
            // STYLEME__ANALYSIS__STORE_ID style keys, since field names contain underscores
            .add_source(
                Environment::with_prefix("STYLEME")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: CaptureAppConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(ConfigError::Message(
                "Camera ideal resolution must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.session.ready_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Session ready_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.analysis.product_url.trim().is_empty() || self.analysis.profile_url.trim().is_empty()
        {
            return Err(ConfigError::Message(
                "Analysis endpoint URLs must not be empty".to_string(),
            ));
        }

        if self.analysis.image_field.trim().is_empty() {
            return Err(ConfigError::Message(
                "Analysis image_field must not be empty".to_string(),
            ));
        }

        if self.analysis.request_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Analysis request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for CaptureAppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                ideal_width: default_ideal_width(),
                ideal_height: default_ideal_height(),
                default_facing: None,
                jpeg_quality: default_jpeg_quality(),
            },
            session: SessionConfig {
                ready_timeout_ms: default_ready_timeout_ms(),
                success_reset_delay_ms: default_success_reset_delay_ms(),
                event_bus_capacity: default_event_bus_capacity(),
            },
            analysis: AnalysisConfig {
                product_url: default_product_url(),
                profile_url: default_profile_url(),
                image_field: default_image_field(),
                store_id: None,
                request_timeout_seconds: default_request_timeout_seconds(),
            },
        }
    }
}

// Default value functions
fn default_ideal_width() -> u32 {
    1280
}
fn default_ideal_height() -> u32 {
    720
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_ready_timeout_ms() -> u64 {
    3000
}
fn default_success_reset_delay_ms() -> u64 {
    2000
}
fn default_event_bus_capacity() -> usize {
    64
}

fn default_product_url() -> String {
    "http://localhost:3000/api/produtos/analisar".to_string()
}
fn default_profile_url() -> String {
    "http://localhost:3000/api/perfil/analisar".to_string()
}
fn default_image_field() -> String {
    "imagem".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CaptureAppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.ideal_width, 1280);
        assert_eq!(config.camera.ideal_height, 720);
        assert_eq!(config.session.ready_timeout(), Duration::from_millis(3000));
        assert_eq!(
            config.session.success_reset_delay(),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
default_facing = "front"
jpeg_quality = 80

[session]
ready_timeout_ms = 1500

[analysis]
store_id = "loja-42"
"#
        )
        .unwrap();

        let config = CaptureAppConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.default_facing, Some(Facing::Front));
        assert_eq!(config.camera.jpeg_quality, 80);
        assert_eq!(config.camera.ideal_width, 1280);
        assert_eq!(config.session.ready_timeout_ms, 1500);
        assert_eq!(config.session.success_reset_delay_ms, 2000);
        assert_eq!(config.analysis.store_id.as_deref(), Some("loja-42"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureAppConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.analysis.image_field, "imagem");
        assert_eq!(config.camera.default_facing, None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CaptureAppConfig::default();
        config.camera.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.camera.jpeg_quality = 90;
        config.session.ready_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.session.ready_timeout_ms = 3000;
        config.analysis.product_url = "  ".to_string();
        assert!(config.validate().is_err());

        config.analysis.product_url = default_product_url();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_round_trips_through_loader() {
        let mut config = CaptureAppConfig::default();
        config.analysis.store_id = Some("loja-7".to_string());
        let rendered = config.to_toml().unwrap();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(rendered.as_bytes()).unwrap();

        let loaded = CaptureAppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.analysis.store_id.as_deref(), Some("loja-7"));
        assert_eq!(loaded.camera.jpeg_quality, config.camera.jpeg_quality);
    }
}
