use anyhow::{anyhow, Context, Result};
use image::GenericImageView;

use crate::frame::rgb_len;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

/// Convert a device buffer to packed RGB8. Returns the pixels with the decoded size,
/// which for MJPEG may differ from the negotiated format.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<(Vec<u8>, u32, u32)> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = rgb_len(width, height)?;
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok((pixels[..expected].to_vec(), width, height))
        }
        PixelFormat::Yuyv => Ok((yuyv_to_rgb(pixels, width, height)?, width, height)),
        PixelFormat::Mjpeg => {
            let image = image::load_from_memory(pixels).context("decode mjpeg buffer")?;
            let (w, h) = image.dimensions();
            Ok((image.into_rgb8().into_raw(), w, h))
        }
    }
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    let expected = pixel_count * 2;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in pixels[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        let yuyv = vec![128u8, 128, 128, 128];
        let (rgb, w, h) = normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert_eq!((w, h), (2, 1));
        assert_eq!(rgb, vec![128u8; 6]);
        Ok(())
    }

    #[test]
    fn rgb_pass_through_validates_length() -> Result<()> {
        let pixels = vec![1u8; 9];
        let (rgb, _, _) = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, pixels);
        assert!(normalize_to_rgb(&pixels, 2, 3, PixelFormat::Rgb24).is_err());
        Ok(())
    }

    #[test]
    fn maps_known_fourccs() {
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), Some(PixelFormat::Mjpeg));
        assert_eq!(PixelFormat::from_fourcc(b"NV12"), None);
    }
}
