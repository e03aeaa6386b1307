use crate::device::Facing;
use crate::error::SubmitError;
use crate::frame::StillImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What the captured photo is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// A garment photographed for product creation
    Product,
    /// A photo of the user for their style profile
    Profile,
}

impl CaptureKind {
    /// Camera normally used for this kind of photo
    pub fn default_facing(&self) -> Facing {
        match self {
            CaptureKind::Product => Facing::Rear,
            CaptureKind::Profile => Facing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Product => "product",
            CaptureKind::Profile => "profile",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "product" => Ok(CaptureKind::Product),
            "profile" => Ok(CaptureKind::Profile),
            other => Err(format!("unknown capture kind '{}'", other)),
        }
    }
}

/// One still plus the identifiers of the context that owns it
#[derive(Debug, Clone)]
pub struct AnalysisUpload {
    pub kind: CaptureKind,
    pub image: StillImage,
    /// Sent as multipart text fields
    pub fields: BTreeMap<String, String>,
}

/// Structured attributes returned by the analysis endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default = "default_ok")]
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, rename = "produtos")]
    pub products: Vec<serde_json::Value>,

    #[serde(default, rename = "skuStyleMe", skip_serializing_if = "Option::is_none")]
    pub sku_style_me: Option<String>,
}

fn default_ok() -> bool {
    true
}

/// Remote service that classifies an uploaded still
#[async_trait]
pub trait AnalysisEndpoint: Send + Sync {
    async fn analyze(&self, upload: &AnalysisUpload) -> Result<AnalysisResult, SubmitError>;
}
