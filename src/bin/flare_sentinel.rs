//! flare_sentinel - camera flare/safety monitor
//!
//! This binary:
//! 1. Acquires the camera source and waits for its native dimensions
//! 2. Samples one frame per interval and posts it to the detection service
//! 3. Shows SAFE / UNSAFE on stderr, rings the bell on UNSAFE, and redraws the
//!    confidence sparkline every cycle
//!
//! Detection failures are presented as SAFE (fail-open); see the `warn` log.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flare_sentinel::{
    open_source,
    present::{SparklineRenderer, TerminalAlarm, TerminalStatus},
    ui::Ui,
    FrameSampler, FrameSource, HttpDetectionClient, Monitor, OverlapPolicy, Presenter,
    SentinelConfig, CAMERA_ACCESS_ALERT,
};

const DIMENSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Sample a camera and flag flares via a remote detector")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "FLARE_CONFIG")]
    config: Option<PathBuf>,

    /// Detection endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Camera source (stub://, file://, http(s)://, v4l2://).
    #[arg(long)]
    source: Option<String>,

    /// Sampling interval in milliseconds.
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Behaviour when a request is still in flight (concurrent|skip_while_in_flight).
    #[arg(long, value_name = "POLICY")]
    overlap: Option<OverlapPolicy>,

    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Stop after this many cycles instead of running until Ctrl-C.
    #[arg(long)]
    cycles: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(args.ui.as_str()), std::io::stderr().is_terminal());

    match run(args, &ui) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args, ui: &Ui) -> Result<()> {
    let cfg = {
        let _stage = ui.stage("Load configuration");
        load_config(&args)?
    };

    let sampler = match acquire_camera(&cfg, ui) {
        Ok(sampler) => sampler,
        Err(err) => {
            log::error!("camera access failed: {:#}", err);
            ui.alert(CAMERA_ACCESS_ALERT);
            return Err(err.context("camera unavailable"));
        }
    };

    let client = Arc::new(HttpDetectionClient::new(cfg.endpoint.clone()));
    log::info!("detection endpoint: {}", client.endpoint());

    let presenter = Presenter::new(
        Box::new(TerminalStatus::stderr(ui.use_color())),
        Box::new(TerminalAlarm::stderr()),
        Box::new(SparklineRenderer::stderr()),
        cfg.chart_capacity,
    );
    let mut monitor = Monitor::new(sampler, client, presenter, cfg.monitor());

    let stats = match args.cycles {
        Some(cycles) => monitor.run_cycles(cycles),
        None => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
            })
            .map_err(|e| anyhow::anyhow!("error setting Ctrl-C handler: {}", e))?;
            log::info!("monitor started; press Ctrl-C to stop");
            monitor.run(&shutdown)
        }
    };

    log::info!(
        "monitor stopped: ticks={} dispatched={} skipped={} presented={}",
        stats.ticks,
        stats.dispatched,
        stats.skipped,
        stats.presented
    );
    Ok(())
}

fn load_config(args: &Args) -> Result<SentinelConfig> {
    if let Some(path) = &args.config {
        std::env::set_var("FLARE_CONFIG", path);
    }
    let mut cfg = SentinelConfig::load()?;
    if let Some(endpoint) = &args.endpoint {
        cfg.endpoint = endpoint.clone();
    }
    if let Some(source) = &args.source {
        cfg.source = source.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        cfg.sampling.interval = Duration::from_millis(interval_ms);
    }
    if let Some(overlap) = args.overlap {
        cfg.sampling.overlap = overlap;
    }
    if let Some(quality) = args.quality {
        cfg.sampling.jpeg_quality = quality;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn acquire_camera(cfg: &SentinelConfig, ui: &Ui) -> Result<FrameSampler<Box<dyn FrameSource>>> {
    let stage = ui.stage("Acquire camera");
    let acquired = open_camera(cfg);
    if acquired.is_err() {
        stage.fail();
    }
    acquired
}

fn open_camera(cfg: &SentinelConfig) -> Result<FrameSampler<Box<dyn FrameSource>>> {
    let mut source = open_source(&cfg.source)?;
    source.open()?;
    let sampler = FrameSampler::new(source, cfg.sampling.jpeg_quality);
    let (width, height) = sampler.wait_for_dimensions(DIMENSION_TIMEOUT)?;
    log::info!(
        "camera {} ready at {}x{}",
        sampler.source().describe(),
        width,
        height
    );
    Ok(sampler)
}
