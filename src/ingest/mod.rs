//! Camera sources.
//!
//! This module provides the sources a monitor can sample frames from:
//! - Synthetic scene (`stub://`, testing and demos)
//! - Still images on disk (`file://` or a bare path; a file or a directory)
//! - HTTP JPEG snapshot endpoints (`http://`, `https://`)
//! - USB/V4L2 devices (`v4l2://`, feature: ingest-v4l2)
//!
//! A source is acquired once at startup with `open()`. Until it reports its native
//! dimensions the sampling timer must not start. Sources produce `RawFrame` instances at
//! their native resolution; the sampler encodes them and drops them within the same tick.
//!
//! Sources MUST NOT:
//! - Store captured frames to disk
//! - Log raw frame content

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use url::Url;

use crate::frame::RawFrame;

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod snapshot;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use snapshot::{SnapshotConfig, SnapshotSource};
pub use still::StillFileSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A live frame source (the camera).
pub trait FrameSource: Send {
    /// Human-readable description used in logs.
    fn describe(&self) -> String;

    /// Acquire the underlying device or stream.
    ///
    /// Failure here is a camera-access error: the caller reports it and does not start
    /// the sampling loop.
    fn open(&mut self) -> Result<()>;

    /// Native stream dimensions, once known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Capture the current frame at native resolution.
    fn capture(&mut self) -> Result<RawFrame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }

    fn capture(&mut self) -> Result<RawFrame> {
        (**self).capture()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub capture_errors: u64,
    pub source: String,
}

/// Build a source from a URL-ish string. The source is not opened yet.
///
/// Supported forms:
/// - `stub://<name>?width=640&height=480&flare_every=20`
/// - `file:///path/to/image.jpg`, `file:///path/to/dir`, or a bare filesystem path
/// - `http(s)://camera.local/snapshot.jpg`
/// - `v4l2:///dev/video0?width=640&height=480` (feature: ingest-v4l2)
pub fn open_source(spec: &str) -> Result<Box<dyn FrameSource>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(anyhow!("camera source must not be empty"));
    }
    let url = match Url::parse(spec) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Ok(Box::new(StillFileSource::new(PathBuf::from(spec))));
        }
        Err(err) => return Err(anyhow!("invalid camera source '{}': {}", spec, err)),
    };

    match url.scheme() {
        "stub" => Ok(Box::new(SyntheticSource::new(SyntheticConfig::from_url(
            &url,
        )?))),
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("file source '{}' is not a local path", spec))?;
            Ok(Box::new(StillFileSource::new(path)))
        }
        "http" | "https" => Ok(Box::new(SnapshotSource::new(SnapshotConfig {
            url: url.to_string(),
        }))),
        "v4l2" => open_v4l2(&url),
        other => Err(anyhow!(
            "unsupported camera source scheme '{}'; expected stub, file, http(s) or v4l2",
            other
        )),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_v4l2(url: &Url) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config::from_url(url)?)))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_v4l2(_url: &Url) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("v4l2 capture requires the ingest-v4l2 feature")
}

/// Read an optional numeric query parameter.
pub(crate) fn query_u32(url: &Url, key: &str) -> Result<Option<u32>> {
    match url.query_pairs().find(|(k, _)| k == key) {
        Some((_, value)) => value
            .parse::<u32>()
            .map(Some)
            .with_context(|| format!("query parameter '{}' must be an integer", key)),
        None => Ok(None),
    }
}
