use super::*;
use crate::error::CameraError;
use std::time::Duration;

fn constraints() -> StreamConstraints {
    StreamConstraints::video(Facing::Rear, 1280, 720)
}

#[test]
fn test_facing_parsing() {
    assert_eq!("front".parse::<Facing>().unwrap(), Facing::Front);
    assert_eq!("user".parse::<Facing>().unwrap(), Facing::Front);
    assert_eq!("environment".parse::<Facing>().unwrap(), Facing::Rear);
    assert_eq!("BACK".parse::<Facing>().unwrap(), Facing::Rear);
    assert!("sideways".parse::<Facing>().is_err());

    assert_eq!(Facing::Front.facing_mode(), "user");
    assert_eq!(Facing::Rear.facing_mode(), "environment");
}

#[test]
fn test_video_constraints_disable_audio() {
    let c = constraints();
    assert!(!c.audio);
    assert_eq!((c.ideal_width, c.ideal_height), (1280, 720));
}

#[test]
fn test_facing_hint_is_shared_between_clones() {
    let hint = FacingHint::new(Facing::Rear);
    let other = hint.clone();

    other.set(Facing::Front);
    assert_eq!(hint.get(), Facing::Front);
}

#[tokio::test]
async fn test_mock_tracks_open_streams() {
    let devices = MockMediaDevices::new();

    let first = devices.request_stream(&constraints()).await.unwrap();
    let second = devices.request_stream(&constraints()).await.unwrap();
    assert_eq!(devices.open_streams(), 2);

    first.stop();
    first.stop();
    assert_eq!(devices.open_streams(), 1);
    assert!(!first.is_active());
    assert!(first.current_frame().is_none());

    second.stop();
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(devices.streams_opened(), 2);
}

#[tokio::test]
async fn test_mock_outcomes_map_to_camera_errors() {
    let devices = MockMediaDevices::new().with_outcome(PermissionOutcome::Denied);
    assert_eq!(
        devices.request_stream(&constraints()).await.err(),
        Some(CameraError::PermissionDenied)
    );

    devices.set_outcome(PermissionOutcome::NoDevice);
    assert_eq!(
        devices.request_stream(&constraints()).await.err(),
        Some(CameraError::NoDevice)
    );
    assert_eq!(devices.open_streams(), 0);
    assert_eq!(devices.last_constraints(), Some(constraints()));
}

#[tokio::test(start_paused = true)]
async fn test_mock_ready_never_fires() {
    let devices = MockMediaDevices::new().with_ready(ReadyBehavior::Never);
    let stream = devices.request_stream(&constraints()).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(60), stream.ready()).await;
    assert!(waited.is_err());
    stream.stop();
}

#[tokio::test]
async fn test_mock_frames_use_configured_size() {
    let devices = MockMediaDevices::new().with_frame_size(8, 6);
    let stream = devices.request_stream(&constraints()).await.unwrap();

    let frame = stream.current_frame().unwrap();
    assert_eq!((frame.width, frame.height), (8, 6));
    assert!(frame.validate_size());
    stream.stop();

    let blank = MockMediaDevices::new().without_frames();
    let stream = blank.request_stream(&constraints()).await.unwrap();
    assert!(stream.frame_dimensions().is_none());
    stream.stop();
}

#[tokio::test]
async fn test_still_image_devices_serve_file_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("look.png");
    image::RgbImage::from_pixel(20, 10, image::Rgb([10, 20, 30]))
        .save(&path)
        .unwrap();

    let devices = StillImageDevices::new(&path);
    let stream = devices.request_stream(&constraints()).await.unwrap();
    stream.ready().await;

    assert_eq!(stream.frame_dimensions(), Some((20, 10)));
    let frame = stream.current_frame().unwrap();
    assert_eq!(&frame.data[..3], &[10, 20, 30]);

    stream.stop();
    assert!(stream.frame_dimensions().is_none());
}

#[tokio::test]
async fn test_still_image_devices_missing_file_is_no_device() {
    let dir = tempfile::tempdir().unwrap();
    let devices = StillImageDevices::new(dir.path().join("missing.jpg"));

    assert_eq!(
        devices.request_stream(&constraints()).await.err(),
        Some(CameraError::NoDevice)
    );
}

#[tokio::test]
async fn test_still_image_devices_undecodable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image").unwrap();

    let result = StillImageDevices::new(&path).request_stream(&constraints()).await;
    assert!(matches!(result, Err(CameraError::StreamFailed { .. })));
}
