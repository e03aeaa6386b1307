use super::types::{AnalysisEndpoint, AnalysisResult, AnalysisUpload, CaptureKind};
use crate::config::AnalysisConfig;
use crate::error::SubmitError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Analysis endpoint reached over HTTP with a multipart upload
pub struct HttpAnalysisEndpoint {
    client: reqwest::Client,
    product_url: String,
    profile_url: String,
    image_field: String,
}

impl HttpAnalysisEndpoint {
    pub fn new(config: &AnalysisConfig) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SubmitError::NetworkFailure(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            product_url: config.product_url.clone(),
            profile_url: config.profile_url.clone(),
            image_field: config.image_field.clone(),
        })
    }

    pub fn url_for(&self, kind: CaptureKind) -> &str {
        match kind {
            CaptureKind::Product => &self.product_url,
            CaptureKind::Profile => &self.profile_url,
        }
    }

    fn build_form(&self, upload: &AnalysisUpload) -> Result<Form, SubmitError> {
        let part = Part::bytes(upload.image.data.as_ref().clone())
            .file_name(upload.image.file_name())
            .mime_str(upload.image.mime_type())
            .map_err(|e| SubmitError::NetworkFailure(format!("invalid image part: {}", e)))?;

        let form = upload
            .fields
            .iter()
            .fold(Form::new().part(self.image_field.clone(), part), |form, (key, value)| {
                form.text(key.clone(), value.clone())
            });

        Ok(form)
    }
}

#[async_trait]
impl AnalysisEndpoint for HttpAnalysisEndpoint {
    async fn analyze(&self, upload: &AnalysisUpload) -> Result<AnalysisResult, SubmitError> {
        let url = self.url_for(upload.kind);
        info!(
            "Uploading {} still {} ({} bytes) to {}",
            upload.kind,
            upload.image.capture_id,
            upload.image.len(),
            url
        );

        let form = self.build_form(upload)?;
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmitError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::NetworkFailure(e.to_string()))?;

        debug!("Analysis endpoint answered {} ({} bytes)", status, body.len());

        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| fallback_message(status));
            warn!("Analysis rejected with {}: {}", status, message);
            return Err(SubmitError::ServerRejected(message));
        }

        let result: AnalysisResult = serde_json::from_slice(&body)
            .map_err(|e| SubmitError::InvalidResponse(e.to_string()))?;

        if !result.ok {
            let message = result
                .message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback_message(status));
            warn!("Analysis reported failure: {}", message);
            return Err(SubmitError::ServerRejected(message));
        }

        Ok(result)
    }
}

/// `message` from an error body, if the body is JSON and carries one
fn server_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn fallback_message(status: StatusCode) -> String {
    format!("Image analysis failed (HTTP {})", status.as_u16())
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(
            server_message(br#"{"ok":false,"message":"SKU duplicado"}"#),
            Some("SKU duplicado".to_string())
        );
        assert_eq!(server_message(br#"{"ok":false,"message":"  "}"#), None);
        assert_eq!(server_message(b"<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_fallback_message_names_status() {
        assert_eq!(
            fallback_message(StatusCode::BAD_GATEWAY),
            "Image analysis failed (HTTP 502)"
        );
    }
}
