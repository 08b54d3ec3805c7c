mod client;
mod result;

pub use client::{
    parse_response_body, ClientStats, DetectionClient, HttpDetectionClient, DEFAULT_ENDPOINT,
};
pub use result::{DetectRequest, DetectResponse, DetectionResult, DetectionStatus};
