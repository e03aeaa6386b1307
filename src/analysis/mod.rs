mod http;
mod types;
#[cfg(test)]
mod tests;

pub use http::HttpAnalysisEndpoint;
pub use types::{AnalysisEndpoint, AnalysisResult, AnalysisUpload, CaptureKind};
