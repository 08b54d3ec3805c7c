//! V4L2 camera source.
//!
//! This module provides `V4l2Source` for sampling frames from local V4L2 devices
//! (USB webcams, CSI cameras).
//!
//! The V4L2 source is responsible for:
//! - Opening a local device node (e.g., /dev/video0)
//! - Negotiating a capture format (RGB3, YUYV or MJPG)
//! - Normalizing each buffer to packed RGB8 in memory

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};
use url::Url;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{query_u32, FrameSource, SourceStats};
use crate::frame::RawFrame;

const HEALTH_GRACE: Duration = Duration::from_secs(5);

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

impl V4l2Config {
    pub(crate) fn from_url(url: &Url) -> Result<Self> {
        let defaults = Self::default();
        let device = if url.path().is_empty() || url.path() == "/" {
            defaults.device
        } else {
            url.path().to_string()
        };
        Ok(Self {
            device,
            width: query_u32(url, "width")?.unwrap_or(defaults.width),
            height: query_u32(url, "height")?.unwrap_or(defaults.height),
        })
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    capture_errors: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            capture_errors: 0,
            last_frame_at: None,
            last_error: None,
        }
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        format!("{} (v4l2)", self.config.device)
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} negotiated unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;
        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);
        self.last_error = None;

        log::info!(
            "V4l2Source: opened {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.state
            .as_ref()
            .map(|_| (self.active_width, self.active_height))
    }

    fn capture(&mut self) -> Result<RawFrame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not opened")?;
        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let captured = state.with_stream_mut(|stream| {
            let (buf, meta) = stream.next().context("capture v4l2 frame")?;
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            normalize_to_rgb(&buf[..used], width, height, format)
        });

        match captured.and_then(|(pixels, w, h)| RawFrame::from_rgb(pixels, w, h)) {
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
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= HEALTH_GRACE
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            capture_errors: self.capture_errors,
            source: self.config.device.clone(),
        }
    }
}
