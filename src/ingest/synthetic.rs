//! Synthetic frame source (`stub://`).
//!
//! Produces a static warm-grey scene. Every `flare_every` frames a bright orange patch
//! is painted at a jittered position so a downstream detector has something to react to.

use anyhow::{anyhow, Result};
use rand::Rng;
use url::Url;

use super::{query_u32, FrameSource, SourceStats};
use crate::frame::{rgb_len, RawFrame};

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Paint a flare patch every N frames. 0 disables the patch.
    pub flare_every: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
            flare_every: 0,
        }
    }
}

impl SyntheticConfig {
    pub(crate) fn from_url(url: &Url) -> Result<Self> {
        let defaults = Self::default();
        let name = match url.host_str() {
            Some(host) => format!("stub://{}", host),
            None => defaults.name,
        };
        Ok(Self {
            name,
            width: query_u32(url, "width")?.unwrap_or(defaults.width),
            height: query_u32(url, "height")?.unwrap_or(defaults.height),
            flare_every: query_u32(url, "flare_every")?.unwrap_or(defaults.flare_every),
        })
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    opened: bool,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            opened: false,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Result<Vec<u8>> {
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = vec![0u8; rgb_len(self.config.width, self.config.height)?];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let shade = 90 + ((i % width.max(1)) * 40 / width.max(1)) as u8;
            px.copy_from_slice(&[shade, shade.saturating_sub(6), shade.saturating_sub(12)]);
        }

        let flare_every = u64::from(self.config.flare_every);
        if flare_every > 0 && self.frame_count % flare_every == 0 && width > 0 && height > 0 {
            let patch_w = (width / 4).max(1);
            let patch_h = (height / 4).max(1);
            let mut rng = rand::thread_rng();
            let x0 = rng.gen_range(0..=width - patch_w);
            let y0 = rng.gen_range(0..=height - patch_h);
            for y in y0..y0 + patch_h {
                for x in x0..x0 + patch_w {
                    let offset = (y * width + x) * 3;
                    pixels[offset..offset + 3].copy_from_slice(&[240, 110, 10]);
                }
            }
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.config.name)
    }

    /// Synthetic sources are always available.
    fn open(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            self.config.name,
            self.config.width,
            self.config.height
        );
        self.opened = true;
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.opened
            .then_some((self.config.width, self.config.height))
    }

    fn capture(&mut self) -> Result<RawFrame> {
        if !self.opened {
            return Err(anyhow!("synthetic source not opened; call open() first"));
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels()?;
        RawFrame::from_rgb(pixels, self.config.width, self.config.height)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            capture_errors: 0,
            source: self.config.name.clone(),
        }
    }
}
