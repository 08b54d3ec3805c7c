//! Captured and encoded frames.
//!
//! - `RawFrame`: RGB8 pixels captured from a source. Bytes are private and zeroized on drop.
//! - `EncodedFrame`: the lossy JPEG payload that travels to the detection endpoint.
//!
//! Raw pixels never leave the process; only the encoded payload is sent, and only to the
//! configured detection endpoint.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use zeroize::Zeroize;

/// Quality the `image` JPEG encoder uses when none is requested.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Data URI a zero-sized drawing surface serializes to.
pub const EMPTY_DATA_URI: &str = "data:,";

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

// ----------------------------------------------------------------------------
// RawFrame
// ----------------------------------------------------------------------------

/// A captured frame at the source's native resolution.
///
/// There is no `Clone` and no byte accessor outside the crate; the sampler encodes it
/// and drops it within the same tick.
pub struct RawFrame {
    /// Packed RGB8 pixels, `width * height * 3` bytes.
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    /// Create a frame from packed RGB8 pixels. The length must match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A 0x0 frame. Encodes to the empty data URI.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Encode to JPEG at the given quality (1..=100).
    ///
    /// Degenerate frames produce an empty payload rather than an error.
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedFrame> {
        if self.is_degenerate() {
            return Ok(EncodedFrame::empty());
        }
        let mut jpeg = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .with_context(|| format!("encode {}x{} frame as jpeg", self.width, self.height))?;
        Ok(EncodedFrame {
            jpeg,
            width: self.width,
            height: self.height,
        })
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions {}x{} overflow", width, height))
}

// ----------------------------------------------------------------------------
// EncodedFrame
// ----------------------------------------------------------------------------

/// JPEG payload for one detection request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedFrame {
    pub fn empty() -> Self {
        Self {
            jpeg: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    /// Wrap JPEG bytes read from elsewhere (e.g. a file on disk).
    pub fn from_jpeg(jpeg: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            jpeg,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    pub fn jpeg_bytes(&self) -> &[u8] {
        &self.jpeg
    }

    /// `data:image/jpeg;base64,...`, or `data:,` for an empty payload.
    pub fn data_uri(&self) -> String {
        if self.jpeg.is_empty() {
            return EMPTY_DATA_URI.to_string();
        }
        let mut uri =
            String::with_capacity(JPEG_DATA_URI_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        uri.push_str(JPEG_DATA_URI_PREFIX);
        BASE64_STANDARD.encode_string(&self.jpeg, &mut uri);
        uri
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
