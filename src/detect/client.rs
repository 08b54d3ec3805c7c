use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::detect::result::{DetectRequest, DetectResponse, DetectionResult};
use crate::frame::EncodedFrame;

/// Default detection endpoint of a locally running detection service.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/detect";

/// Detection client trait.
///
/// # Failure Boundary
///
/// `detect` is infallible by signature. Implementations MUST absorb every failure and
/// return `DetectionResult::fallback()` instead, so that callers cannot tell a failed
/// request from a genuine `{safe, 0}` verdict.
pub trait DetectionClient: Send + Sync {
    /// Client identifier.
    fn name(&self) -> &'static str;

    /// Obtain a verdict for one encoded frame.
    fn detect(&self, frame: &EncodedFrame) -> DetectionResult;

    /// Request counters, when the client keeps them.
    fn stats(&self) -> ClientStats {
        ClientStats::default()
    }
}

/// Request counters for the health log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub requests: u64,
    pub fallbacks: u64,
}

/// Detection client for the HTTP `POST /detect` endpoint.
///
/// One request per frame. No retry, no backoff, and no timeouts beyond the transport's
/// defaults.
pub struct HttpDetectionClient {
    endpoint: String,
    agent: ureq::Agent,
    requests: AtomicU64,
    fallbacks: AtomicU64,
}

impl HttpDetectionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::AgentBuilder::new().build(),
            requests: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fallible request path. `detect` wraps this with the fail-open fallback.
    pub fn try_detect(&self, frame: &EncodedFrame) -> Result<DetectionResult> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&DetectRequest {
            image: frame.data_uri(),
        })
        .context("serialize detect request")?;

        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(anyhow!("detection endpoint returned HTTP {}", code));
            }
            Err(err) => {
                return Err(anyhow!(
                    "detection request to {} failed: {}",
                    self.endpoint,
                    err
                ));
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(anyhow!("detection endpoint returned HTTP {}", status));
        }
        let raw = response
            .into_string()
            .context("read detection response body")?;
        parse_response_body(&raw)
    }
}

impl DetectionClient for HttpDetectionClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn detect(&self, frame: &EncodedFrame) -> DetectionResult {
        match self.try_detect(frame) {
            Ok(result) => result,
            Err(err) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                log::warn!("detection failed, assuming safe: {:#}", err);
                DetectionResult::fallback()
            }
        }
    }

    fn stats(&self) -> ClientStats {
        ClientStats {
            requests: self.requests.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Parse a response body. The body must be a JSON object; both fields are optional.
pub fn parse_response_body(raw: &str) -> Result<DetectionResult> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("detection response is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("detection response is not a JSON object"));
    }
    let response: DetectResponse =
        serde_json::from_value(value).context("detection response has unexpected shape")?;
    Ok(response.into())
}
