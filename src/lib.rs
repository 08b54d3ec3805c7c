//! Flare Sentinel
//!
//! A monitoring client that samples frames from a camera, submits each one to a remote
//! flare/safety detection service, and presents the verdict as a two-state status with an
//! audible alarm and a rolling confidence chart.
//!
//! # Architecture
//!
//! One cycle per tick (default: every second):
//!
//! 1. **Sample**: capture the current frame at native resolution and encode it as a
//!    base64 JPEG data URI (`sampler`, `frame`).
//! 2. **Detect**: POST `{ "image": <data URI> }` to the detection endpoint and parse
//!    `{ "status", "confidence" }` (`detect`).
//! 3. **Present**: SAFE or UNSAFE label, alarm on UNSAFE, one chart point per cycle with
//!    the chart capped at the 30 most recent values (`present`).
//!
//! `monitor` drives the cycle and owns the overlap policy for slow requests.
//!
//! # Fail-open
//!
//! Any detection failure (transport error, non-2xx status, malformed body) is presented
//! exactly like a genuine `{ status: "safe", confidence: 0 }` verdict. An unreachable
//! detection service therefore shows SAFE and keeps the alarm silent. Failures are only
//! visible in the `warn` log and in `ClientStats::fallbacks`.
//!
//! # Module Structure
//!
//! - `frame`: raw and encoded frames, JPEG + data URI encoding
//! - `ingest`: camera sources (synthetic, still files, HTTP snapshots, V4L2)
//! - `sampler`: one encoded frame per tick
//! - `detect`: wire types and the HTTP detection client
//! - `present`: SAFE/UNSAFE state machine, alarm cue, bounded chart series
//! - `monitor`: tick loop and overlap policy
//! - `config`: file + environment configuration
//! - `ui`: startup stage reporting

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod present;
pub mod sampler;
pub mod ui;

pub use config::{SamplingSettings, SentinelConfig};
pub use detect::{
    ClientStats, DetectionClient, DetectionResult, DetectionStatus, HttpDetectionClient,
};
pub use frame::{EncodedFrame, RawFrame};
pub use ingest::{open_source, FrameSource, SourceStats};
pub use monitor::{Monitor, MonitorConfig, MonitorStats, OverlapPolicy};
pub use present::{ChartSeries, Presenter, SafetyState};
pub use sampler::FrameSampler;

/// Message shown when the camera cannot be acquired.
pub const CAMERA_ACCESS_ALERT: &str =
    "Could not access the camera. Please allow camera access and restart the monitor.";
