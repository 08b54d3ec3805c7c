//! detect_once - submit one image to the detection service.
//!
//! Prints the verdict as JSON on stdout. Exits with status 2 when the request failed and
//! the fail-open verdict `{ "status": "safe", "confidence": 0.0 }` was printed instead.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use flare_sentinel::{
    detect::DEFAULT_ENDPOINT, frame::DEFAULT_JPEG_QUALITY, ingest::StillFileSource,
    DetectionResult, FrameSampler, FrameSource, HttpDetectionClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Post one image to the detection endpoint")]
struct Args {
    /// Image file (JPEG or PNG).
    image: PathBuf,

    /// Detection endpoint URL.
    #[arg(long, env = "FLARE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut source = StillFileSource::new(args.image);
    source.open()?;
    let mut sampler = FrameSampler::new(source, args.quality);
    let frame = sampler.sample();
    log::info!(
        "encoded {}x{} frame ({} bytes)",
        frame.width,
        frame.height,
        frame.jpeg_bytes().len()
    );

    let client = HttpDetectionClient::new(args.endpoint);
    let (result, code) = match client.try_detect(&frame) {
        Ok(result) => (result, ExitCode::SUCCESS),
        Err(err) => {
            log::warn!("detection request failed, reporting fallback: {:#}", err);
            (DetectionResult::fallback(), ExitCode::from(2))
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(code)
}
