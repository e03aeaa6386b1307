use super::*;
use crate::config::AnalysisConfig;
use crate::error::SubmitError;
use crate::frame::{encode_still, FrameData, FrameFormat};
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// A multipart field as seen by the fake endpoint
#[derive(Debug, Clone)]
struct ReceivedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct FakeEndpoint {
    status: StatusCode,
    body: String,
    paths: Arc<Mutex<Vec<String>>>,
    fields: Arc<Mutex<Vec<ReceivedField>>>,
}

async fn receive(
    State(endpoint): State<FakeEndpoint>,
    uri: Uri,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    endpoint.paths.lock().unwrap().push(uri.path().to_string());

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        endpoint.fields.lock().unwrap().push(ReceivedField {
            name,
            file_name,
            content_type,
            bytes,
        });
    }

    (endpoint.status, endpoint.body.clone())
}

async fn spawn_endpoint(status: StatusCode, body: &str) -> (AnalysisConfig, FakeEndpoint) {
    let endpoint = FakeEndpoint {
        status,
        body: body.to_string(),
        paths: Arc::new(Mutex::new(Vec::new())),
        fields: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/produtos/analisar", post(receive))
        .route("/perfil/analisar", post(receive))
        .with_state(endpoint.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = AnalysisConfig {
        product_url: format!("http://{}/produtos/analisar", addr),
        profile_url: format!("http://{}/perfil/analisar", addr),
        image_field: "imagem".to_string(),
        store_id: Some("loja-1".to_string()),
        request_timeout_seconds: 5,
    };

    (config, endpoint)
}

fn upload(kind: CaptureKind) -> AnalysisUpload {
    let frame = FrameData::new(
        1,
        SystemTime::now(),
        vec![90u8; 16 * 16 * 3],
        16,
        16,
        FrameFormat::Rgb24,
    );
    let mut fields = BTreeMap::new();
    fields.insert("lojaId".to_string(), "loja-1".to_string());

    AnalysisUpload {
        kind,
        image: encode_still(&frame, 90).unwrap(),
        fields,
    }
}

#[tokio::test]
async fn test_successful_analysis_returns_parsed_result() {
    let body = json!({
        "ok": true,
        "produtos": [{ "categoria": "vestido", "cor": "azul" }],
        "skuStyleMe": "ABC123"
    })
    .to_string();
    let (config, endpoint) = spawn_endpoint(StatusCode::OK, &body).await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();
    let upload = upload(CaptureKind::Product);

    let result = client.analyze(&upload).await.unwrap();

    assert!(result.ok);
    assert_eq!(result.sku_style_me.as_deref(), Some("ABC123"));
    assert_eq!(result.products.len(), 1);
    assert_eq!(result.products[0]["cor"], Value::from("azul"));

    let fields = endpoint.fields.lock().unwrap().clone();
    let image = fields.iter().find(|f| f.name == "imagem").unwrap();
    assert_eq!(image.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(image.file_name, Some(upload.image.file_name()));
    assert_eq!(image.bytes, *upload.image.data);

    let store = fields.iter().find(|f| f.name == "lojaId").unwrap();
    assert_eq!(store.bytes, b"loja-1");
    assert!(store.file_name.is_none());

    assert_eq!(
        endpoint.paths.lock().unwrap().as_slice(),
        ["/produtos/analisar".to_string()]
    );
}

#[tokio::test]
async fn test_profile_uploads_go_to_profile_endpoint() {
    let (config, endpoint) = spawn_endpoint(StatusCode::OK, r#"{"ok":true}"#).await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let result = client.analyze(&upload(CaptureKind::Profile)).await.unwrap();

    assert!(result.products.is_empty());
    assert!(result.sku_style_me.is_none());
    assert_eq!(
        endpoint.paths.lock().unwrap().as_slice(),
        ["/perfil/analisar".to_string()]
    );
}

#[tokio::test]
async fn test_rejection_uses_server_message() {
    let (config, _endpoint) =
        spawn_endpoint(StatusCode::BAD_REQUEST, r#"{"ok":false,"message":"SKU duplicado"}"#)
            .await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let err = client.analyze(&upload(CaptureKind::Product)).await.unwrap_err();

    assert_eq!(err, SubmitError::ServerRejected("SKU duplicado".to_string()));
}

#[tokio::test]
async fn test_rejection_without_message_uses_fallback() {
    let (config, _endpoint) =
        spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let err = client.analyze(&upload(CaptureKind::Product)).await.unwrap_err();

    assert_eq!(
        err,
        SubmitError::ServerRejected("Image analysis failed (HTTP 500)".to_string())
    );
}

#[tokio::test]
async fn test_ok_false_on_success_status_is_rejected() {
    let (config, _endpoint) =
        spawn_endpoint(StatusCode::OK, r#"{"ok":false,"message":"Imagem ilegível"}"#).await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let err = client.analyze(&upload(CaptureKind::Product)).await.unwrap_err();

    assert_eq!(err, SubmitError::ServerRejected("Imagem ilegível".to_string()));
}

#[tokio::test]
async fn test_non_json_success_body_is_invalid_response() {
    let (config, _endpoint) = spawn_endpoint(StatusCode::OK, "done").await;
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let err = client.analyze(&upload(CaptureKind::Product)).await.unwrap_err();

    assert!(matches!(err, SubmitError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = AnalysisConfig {
        product_url: format!("http://{}/produtos/analisar", addr),
        profile_url: format!("http://{}/perfil/analisar", addr),
        image_field: "imagem".to_string(),
        store_id: None,
        request_timeout_seconds: 2,
    };
    let client = HttpAnalysisEndpoint::new(&config).unwrap();

    let err = client.analyze(&upload(CaptureKind::Product)).await.unwrap_err();

    assert!(matches!(err, SubmitError::NetworkFailure(_)));
    assert!(err.user_message().contains("Could not reach the server"));
}

#[test]
fn test_capture_kind_defaults() {
    assert_eq!(CaptureKind::Product.default_facing(), crate::device::Facing::Rear);
    assert_eq!(CaptureKind::Profile.default_facing(), crate::device::Facing::Front);
    assert_eq!("Profile".parse::<CaptureKind>().unwrap(), CaptureKind::Profile);
    assert!("hat".parse::<CaptureKind>().is_err());
}

#[test]
fn test_result_deserializes_wire_names() {
    let result: AnalysisResult =
        serde_json::from_str(r#"{"produtos":[1,2],"skuStyleMe":"XYZ"}"#).unwrap();

    assert!(result.ok);
    assert_eq!(result.products.len(), 2);
    assert_eq!(result.sku_style_me.as_deref(), Some("XYZ"));
    assert!(result.message.is_none());
}
