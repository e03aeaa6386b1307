use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Pixel layout of a frame read from a live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Already JPEG encoded
    Mjpeg,
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit RGBA
    Rgba32,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single video frame at the stream's native dimensions
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was produced
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => !self.data.is_empty(),
        }
    }
}

/// An encoded still held in memory while it is previewed and submitted
#[derive(Debug, Clone)]
pub struct StillImage {
    /// Identifier of the capture, unique per take
    pub capture_id: String,
    /// JPEG bytes
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl StillImage {
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.capture_id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Encode a frame into a JPEG still at the given quality (1-100).
///
/// Frames that are already JPEG are kept as-is.
pub fn encode_still(frame: &FrameData, quality: u8) -> Result<StillImage, CaptureError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::NotReady);
    }

    if !frame.validate_size() {
        return Err(CaptureError::Encode {
            details: format!(
                "frame {} has {} bytes, expected {:?} for {}x{} {:?}",
                frame.id,
                frame.data.len(),
                frame.expected_size(),
                frame.width,
                frame.height,
                frame.format
            ),
        });
    }

    let data = match frame.format {
        FrameFormat::Mjpeg => {
            debug!("Frame {} already JPEG encoded, using directly", frame.id);
            Arc::clone(&frame.data)
        }
        FrameFormat::Rgb24 => Arc::new(encode_rgb(&frame.data, frame.width, frame.height, quality)?),
        FrameFormat::Rgba32 => {
            let rgb: Vec<u8> = frame
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            Arc::new(encode_rgb(&rgb, frame.width, frame.height, quality)?)
        }
    };

    debug!(
        "Encoded still from frame {} ({}x{}, {} bytes, quality {})",
        frame.id,
        frame.width,
        frame.height,
        data.len(),
        quality
    );

    Ok(StillImage {
        capture_id: uuid::Uuid::new_v4().to_string(),
        data,
        width: frame.width,
        height: frame.height,
        captured_at: Utc::now(),
    })
}

fn encode_rgb(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode(rgb, width, height, ColorType::Rgb8)
        .map_err(|e| CaptureError::Encode {
            details: e.to_string(),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32) -> FrameData {
        let data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        FrameData::new(1, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
    }

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Mjpeg.bytes_per_pixel(), 0);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(FrameFormat::Rgba32.bytes_per_pixel(), 4);
        assert!(FrameFormat::Mjpeg.is_compressed());
        assert!(!FrameFormat::Rgb24.is_compressed());
    }

    #[test]
    fn test_frame_size_validation() {
        assert!(rgb_frame(16, 8).validate_size());

        let short = FrameData::new(2, SystemTime::now(), vec![0u8; 10], 16, 8, FrameFormat::Rgb24);
        assert!(!short.validate_size());
    }

    #[test]
    fn test_encode_rgb_frame_produces_jpeg_at_native_size() {
        let still = encode_still(&rgb_frame(32, 24), 90).unwrap();

        assert_eq!(still.width, 32);
        assert_eq!(still.height, 24);
        assert_eq!(&still.data[..2], &[0xFF, 0xD8]);
        assert_eq!(still.mime_type(), "image/jpeg");

        let decoded = image::load_from_memory(&still.data).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_encode_rgba_frame() {
        let frame = FrameData::new(
            3,
            SystemTime::now(),
            vec![200u8; 8 * 8 * 4],
            8,
            8,
            FrameFormat::Rgba32,
        );
        let still = encode_still(&frame, 90).unwrap();
        assert_eq!(&still.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_mjpeg_frame_passes_through() {
        let bytes = vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let frame = FrameData::new(4, SystemTime::now(), bytes.clone(), 640, 480, FrameFormat::Mjpeg);
        let still = encode_still(&frame, 90).unwrap();
        assert_eq!(still.data.as_ref(), &bytes);
    }

    #[test]
    fn test_zero_dimensions_are_not_ready() {
        let frame = FrameData::new(5, SystemTime::now(), Vec::new(), 0, 0, FrameFormat::Rgb24);
        assert_eq!(encode_still(&frame, 90).unwrap_err(), CaptureError::NotReady);
    }

    #[test]
    fn test_each_capture_gets_a_new_id() {
        let frame = rgb_frame(4, 4);
        let a = encode_still(&frame, 90).unwrap();
        let b = encode_still(&frame, 90).unwrap();
        assert_ne!(a.capture_id, b.capture_id);
    }
}
