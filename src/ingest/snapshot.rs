//! HTTP JPEG snapshot source.
//!
//! Fetches one JPEG per capture from a camera's snapshot endpoint (ESP32-CAM style
//! `/capture`, IP camera `snapshot.jpg`). Decoding happens in memory.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::io::Read;
use std::time::{Duration, Instant};

use super::{FrameSource, SourceStats};
use crate::frame::RawFrame;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const HEALTH_GRACE: Duration = Duration::from_secs(5);

/// Configuration for a snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Snapshot URL. Supported schemes: http(s)://
    pub url: String,
}

pub struct SnapshotSource {
    config: SnapshotConfig,
    dimensions: Option<(u32, u32)>,
    last_frame_at: Option<Instant>,
    frame_count: u64,
    capture_errors: u64,
    last_error: Option<String>,
}

impl SnapshotSource {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            dimensions: None,
            last_frame_at: None,
            frame_count: 0,
            capture_errors: 0,
            last_error: None,
        }
    }

    fn fetch_frame(&self) -> Result<RawFrame> {
        let jpeg = fetch_single_jpeg(&self.config.url)?;
        decode_jpeg(&jpeg)
    }
}

impl FrameSource for SnapshotSource {
    fn describe(&self) -> String {
        format!("{} (http snapshot)", self.config.url)
    }

    /// Fetch a first snapshot to learn the native resolution.
    fn open(&mut self) -> Result<()> {
        let frame = self
            .fetch_frame()
            .with_context(|| format!("connect to snapshot source {}", self.config.url))?;
        self.dimensions = Some((frame.width, frame.height));
        self.last_frame_at = Some(Instant::now());
        log::info!(
            "SnapshotSource: connected to {} ({}x{})",
            self.config.url,
            frame.width,
            frame.height
        );
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn capture(&mut self) -> Result<RawFrame> {
        if self.dimensions.is_none() {
            return Err(anyhow!("snapshot source not connected; call open() first"));
        }
        match self.fetch_frame() {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_frame_at = Some(Instant::now());
                self.last_error = None;
                Ok(frame)
            }
            Err(err) => {
                self.capture_errors += 1;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        self.last_frame_at
            .is_some_and(|at| at.elapsed() <= HEALTH_GRACE)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            capture_errors: self.capture_errors,
            source: self.config.url.clone(),
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES + 1)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    if bytes.len() as u64 > MAX_JPEG_BYTES {
        return Err(anyhow!("jpeg snapshot exceeds {} bytes", MAX_JPEG_BYTES));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<RawFrame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let (width, height) = image.dimensions();
    RawFrame::from_rgb(image.into_rgb8().into_raw(), width, height)
}
