//! Frame sampler: one captured and encoded frame per timer tick.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::frame::{EncodedFrame, RawFrame};
use crate::ingest::FrameSource;

const DIMENSION_POLL: Duration = Duration::from_millis(50);

pub struct FrameSampler<S: FrameSource> {
    source: S,
    quality: u8,
    samples: u64,
    capture_failures: u64,
    encode_failures: u64,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, quality: u8) -> Self {
        Self {
            source,
            quality: quality.clamp(1, 100),
            samples: 0,
            capture_failures: 0,
            encode_failures: 0,
        }
    }

    /// Block until the source reports its native dimensions.
    ///
    /// The sampling timer must not start before this returns.
    pub fn wait_for_dimensions(&self, timeout: Duration) -> Result<(u32, u32)> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(dims) = self.source.dimensions() {
                return Ok(dims);
            }
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "{} did not report stream dimensions within {:?}",
                    self.source.describe(),
                    timeout
                ));
            }
            std::thread::sleep(DIMENSION_POLL);
        }
    }

    /// Capture the current frame and encode it.
    ///
    /// Never fails: a capture or encoder failure degrades to an empty payload, which the
    /// detection service rejects, so the cycle ends in the fail-open verdict.
    pub fn sample(&mut self) -> EncodedFrame {
        self.samples += 1;
        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(err) => {
                self.capture_failures += 1;
                log::warn!("capture from {} failed: {:#}", self.source.describe(), err);
                RawFrame::empty()
            }
        };
        match frame.encode_jpeg(self.quality) {
            Ok(encoded) => encoded,
            Err(err) => {
                self.encode_failures += 1;
                log::warn!("frame from {} not encodable: {:#}", self.source.describe(), err);
                EncodedFrame::empty()
            }
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures
    }

    pub fn encode_failures(&self) -> u64 {
        self.encode_failures
    }
}
