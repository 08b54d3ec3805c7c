//! Still-image frame source.
//!
//! Serves a single image file, or cycles through the images of a directory in name
//! order. Useful for replaying captured scenes against a detection service.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::RawFrame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct StillFileSource {
    path: PathBuf,
    images: Vec<PathBuf>,
    next_index: usize,
    dimensions: Option<(u32, u32)>,
    frame_count: u64,
    capture_errors: u64,
}

impl StillFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            images: Vec::new(),
            next_index: 0,
            dimensions: None,
            frame_count: 0,
            capture_errors: 0,
        }
    }

    fn list_images(&self) -> Result<Vec<PathBuf>> {
        let meta = std::fs::metadata(&self.path)
            .with_context(|| format!("open still source {}", self.path.display()))?;
        if meta.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let mut images = Vec::new();
        for entry in std::fs::read_dir(&self.path)
            .with_context(|| format!("read directory {}", self.path.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub(crate) fn decode_image_file(path: &Path) -> Result<RawFrame> {
    let image = image::open(path).with_context(|| format!("decode image {}", path.display()))?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    RawFrame::from_rgb(rgb.into_raw(), width, height)
}

impl FrameSource for StillFileSource {
    fn describe(&self) -> String {
        format!("{} (still images)", self.path.display())
    }

    fn open(&mut self) -> Result<()> {
        let images = self.list_images()?;
        let first = images
            .first()
            .ok_or_else(|| anyhow!("no images found under {}", self.path.display()))?;
        let probe = decode_image_file(first)?;
        self.dimensions = Some((probe.width, probe.height));
        log::info!(
            "StillFileSource: opened {} ({} images, {}x{})",
            self.path.display(),
            images.len(),
            probe.width,
            probe.height
        );
        self.images = images;
        self.next_index = 0;
        Ok(())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn capture(&mut self) -> Result<RawFrame> {
        if self.images.is_empty() {
            return Err(anyhow!("still source not opened; call open() first"));
        }
        let path = &self.images[self.next_index % self.images.len()];
        self.next_index = (self.next_index + 1) % self.images.len();
        match decode_image_file(path) {
            Ok(frame) => {
                self.frame_count += 1;
                Ok(frame)
            }
            Err(err) => {
                self.capture_errors += 1;
                Err(err)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.dimensions.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            capture_errors: self.capture_errors,
            source: self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))
            .save(&path)
            .expect("write png");
        path
    }

    #[test]
    fn cycles_directory_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_png(dir.path(), "b.png", 8, 4);
        write_png(dir.path(), "a.png", 6, 3);
        std::fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = StillFileSource::new(dir.path().to_path_buf());
        source.open()?;
        assert_eq!(source.dimensions(), Some((6, 3)));

        let sizes: Vec<(u32, u32)> = (0..3)
            .map(|_| source.capture().map(|f| (f.width, f.height)))
            .collect::<Result<_>>()?;
        assert_eq!(sizes, vec![(6, 3), (8, 4), (6, 3)]);
        Ok(())
    }

    #[test]
    fn missing_path_fails_to_open() {
        let mut source = StillFileSource::new(PathBuf::from("/nonexistent/flare/frames"));
        assert!(source.open().is_err());
        assert_eq!(source.dimensions(), None);
    }

    #[test]
    fn empty_directory_fails_to_open() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = StillFileSource::new(dir.path().to_path_buf());
        assert!(source.open().is_err());
        Ok(())
    }
}
