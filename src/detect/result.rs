use serde::{Deserialize, Serialize};

/// Safety classification for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    Safe,
    Unsafe,
}

impl DetectionStatus {
    /// Only the exact string `"unsafe"` is alarming. Anything else, including a
    /// missing field, is treated as safe.
    pub fn from_wire(status: Option<&str>) -> Self {
        match status {
            Some("unsafe") => Self::Unsafe,
            _ => Self::Safe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        }
    }
}

/// Verdict returned by the detection service for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    pub status: DetectionStatus,
    /// Score in [0, 1] as reported by the service.
    pub confidence: f64,
}

impl DetectionResult {
    pub fn new(status: DetectionStatus, confidence: f64) -> Self {
        Self { status, confidence }
    }

    pub fn safe(confidence: f64) -> Self {
        Self::new(DetectionStatus::Safe, confidence)
    }

    pub fn unsafe_(confidence: f64) -> Self {
        Self::new(DetectionStatus::Unsafe, confidence)
    }

    /// Substituted whenever a verdict cannot be obtained.
    ///
    /// Fail-open: an unreachable or misbehaving detector reads as "safe" with zero
    /// confidence, never as the last known value.
    pub fn fallback() -> Self {
        Self::safe(0.0)
    }

    pub fn is_unsafe(&self) -> bool {
        self.status == DetectionStatus::Unsafe
    }
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

/// Body of `POST /detect`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectRequest {
    /// `data:image/jpeg;base64,...`
    pub image: String,
}

/// Body of a successful `POST /detect` response.
///
/// Both fields are optional on the wire; extra fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl From<DetectResponse> for DetectionResult {
    fn from(response: DetectResponse) -> Self {
        let status = DetectionStatus::from_wire(response.status.as_deref());
        if status == DetectionStatus::Safe {
            if let Some(other) = response.status.as_deref().filter(|s| *s != "safe") {
                log::debug!("unrecognized detection status '{}' treated as safe", other);
            }
        }
        let confidence = response
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(0.0);
        DetectionResult { status, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> DetectionResult {
        serde_json::from_str::<DetectResponse>(body)
            .expect("valid response body")
            .into()
    }

    #[test]
    fn only_exact_unsafe_is_unsafe() {
        assert_eq!(
            DetectionStatus::from_wire(Some("unsafe")),
            DetectionStatus::Unsafe
        );
        assert_eq!(
            DetectionStatus::from_wire(Some("UNSAFE")),
            DetectionStatus::Safe
        );
        assert_eq!(
            DetectionStatus::from_wire(Some("danger")),
            DetectionStatus::Safe
        );
        assert_eq!(DetectionStatus::from_wire(None), DetectionStatus::Safe);
    }

    #[test]
    fn parses_full_response() {
        let result = parse(r#"{"status": "unsafe", "confidence": 0.93}"#);
        assert_eq!(result, DetectionResult::unsafe_(0.93));
    }

    #[test]
    fn missing_confidence_defaults_to_zero() {
        assert_eq!(parse(r#"{"status": "unsafe"}"#), DetectionResult::unsafe_(0.0));
        assert_eq!(
            parse(r#"{"status": "unsafe", "confidence": null}"#),
            DetectionResult::unsafe_(0.0)
        );
    }

    #[test]
    fn missing_status_is_safe_but_keeps_confidence() {
        assert_eq!(parse(r#"{"confidence": 0.4}"#), DetectionResult::safe(0.4));
        assert_eq!(parse("{}"), DetectionResult::fallback());
    }

    #[test]
    fn ignores_extra_fields() {
        let result = parse(r#"{"status": "safe", "confidence": 0.1, "model": "v2"}"#);
        assert_eq!(result, DetectionResult::safe(0.1));
    }

    #[test]
    fn wrong_field_types_fail_to_parse() {
        assert!(serde_json::from_str::<DetectResponse>(r#"{"status": 1}"#).is_err());
        assert!(serde_json::from_str::<DetectResponse>(r#"{"confidence": "high"}"#).is_err());
    }

    #[test]
    fn request_serializes_single_image_field() {
        let body = serde_json::to_value(DetectRequest {
            image: "data:,".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "image": "data:," }));
    }
}
