//! Monitor loop: sample → detect → present, once per tick.
//!
//! The monitor thread owns the sampler and the presenter. Each tick samples a frame on
//! this thread and hands the detection request to a short-lived worker thread. Workers
//! report back over a channel; the monitor thread presents verdicts in arrival order
//! between ticks, so the chart series is only ever touched from one thread.
//!
//! With `OverlapPolicy::Concurrent` requests may overlap and complete out of order; the
//! display follows whichever verdict arrived last, not whichever frame was sampled last.
//! `OverlapPolicy::SkipWhileInFlight` keeps a single request slot and skips ticks while
//! it is occupied, which keeps presented verdicts in sampling order.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detect::{DetectionClient, DetectionResult};
use crate::frame::EncodedFrame;
use crate::ingest::FrameSource;
use crate::present::Presenter;
use crate::sampler::FrameSampler;

/// Sampling period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

const HEALTH_LOG_EVERY: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a tick does when the previous request has not completed yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fire regardless; requests overlap and may complete out of order.
    #[default]
    Concurrent,
    /// Skip the tick while a request is in flight.
    SkipWhileInFlight,
}

impl FromStr for OverlapPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "skip" | "skip_while_in_flight" => Ok(Self::SkipWhileInFlight),
            other => Err(anyhow!(
                "unknown overlap policy '{}'; expected concurrent or skip_while_in_flight",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            overlap: OverlapPolicy::Concurrent,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub ticks: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub presented: u64,
}

struct Completion {
    cycle: u64,
    result: DetectionResult,
}

/// A worker's claim on the in-flight counter.
///
/// Released on drop, after the verdict is sent. A worker that unwinds before reporting
/// still releases its slot and reports the fail-open verdict.
struct InFlightSlot {
    cycle: u64,
    tx: Sender<Completion>,
    in_flight: Arc<AtomicUsize>,
    reported: bool,
}

impl InFlightSlot {
    fn report(&mut self, result: DetectionResult) {
        let _ = self.tx.send(Completion {
            cycle: self.cycle,
            result,
        });
        self.reported = true;
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        if !self.reported {
            log::warn!(
                "cycle {}: detection worker died, assuming safe",
                self.cycle
            );
            self.report(DetectionResult::fallback());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Monitor<S: FrameSource> {
    sampler: FrameSampler<S>,
    client: Arc<dyn DetectionClient>,
    presenter: Presenter,
    config: MonitorConfig,
    in_flight: Arc<AtomicUsize>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    stats: MonitorStats,
    last_presented_cycle: Option<u64>,
}

impl<S: FrameSource> Monitor<S> {
    pub fn new(
        sampler: FrameSampler<S>,
        client: Arc<dyn DetectionClient>,
        presenter: Presenter,
        config: MonitorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            sampler,
            client,
            presenter,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tx,
            rx,
            stats: MonitorStats::default(),
            last_presented_cycle: None,
        }
    }

    /// One timer tick: sample a frame and dispatch its detection request.
    ///
    /// Returns the cycle number, or `None` when the tick was skipped.
    pub fn tick(&mut self) -> Option<u64> {
        self.stats.ticks += 1;
        let cycle = self.stats.ticks;

        if self.config.overlap == OverlapPolicy::SkipWhileInFlight
            && self.in_flight.load(Ordering::SeqCst) > 0
        {
            self.stats.skipped += 1;
            log::debug!("cycle {} skipped: previous request still in flight", cycle);
            return None;
        }

        let frame = self.sampler.sample();
        self.dispatch(cycle, frame);
        self.stats.dispatched += 1;
        Some(cycle)
    }

    fn dispatch(&mut self, cycle: u64, frame: EncodedFrame) {
        let client = Arc::clone(&self.client);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = self.tx.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name(format!("detect-{}", cycle))
            .spawn(move || {
                let mut slot = InFlightSlot {
                    cycle,
                    tx,
                    in_flight,
                    reported: false,
                };
                let result = client.detect(&frame);
                slot.report(result);
            });

        if let Err(err) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            log::warn!(
                "cycle {}: could not start detection worker, assuming safe: {}",
                cycle,
                err
            );
            let _ = self.tx.send(Completion {
                cycle,
                result: DetectionResult::fallback(),
            });
        }
    }

    /// Present every verdict that has already arrived.
    pub fn drain_ready(&mut self) -> usize {
        let mut presented = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.present(completion);
            presented += 1;
        }
        presented
    }

    /// Present verdicts as they arrive until `deadline`, or until `stop` is set.
    pub fn drain_until(&mut self, deadline: Instant, stop: Option<&AtomicBool>) -> usize {
        let mut presented = 0;
        loop {
            if stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
                return presented;
            }
            let now = Instant::now();
            if now >= deadline {
                return presented + self.drain_ready();
            }
            let wait = (deadline - now).min(SHUTDOWN_POLL);
            match self.rx.recv_timeout(wait) {
                Ok(completion) => {
                    self.present(completion);
                    presented += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Unreachable while `self.tx` is alive.
                Err(RecvTimeoutError::Disconnected) => return presented,
            }
        }
    }

    /// Wait for in-flight requests (up to `timeout`) and present their verdicts.
    pub fn settle(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut presented = self.drain_ready();
        while self.in_flight() > 0 && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let step = Instant::now() + SHUTDOWN_POLL.min(remaining);
            presented += self.drain_until(step, None);
        }
        presented + self.drain_ready()
    }

    fn present(&mut self, completion: Completion) {
        if let Some(last) = self.last_presented_cycle {
            if completion.cycle < last {
                log::debug!(
                    "cycle {} presented after cycle {} (out of order)",
                    completion.cycle,
                    last
                );
            }
        }
        self.presenter.present(&completion.result);
        self.last_presented_cycle = Some(completion.cycle);
        self.stats.presented += 1;
    }

    /// Run until `shutdown` is set. In-flight requests get one interval to land.
    pub fn run(&mut self, shutdown: &AtomicBool) -> MonitorStats {
        log::info!(
            "monitor running: source={} client={} interval={:?} overlap={:?}",
            self.sampler.source().describe(),
            self.client.name(),
            self.config.interval,
            self.config.overlap
        );
        let mut next_tick = Instant::now();
        let mut last_health_log = Instant::now();

        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            next_tick = self.advance(next_tick);
            self.drain_until(next_tick, Some(shutdown));

            if last_health_log.elapsed() >= HEALTH_LOG_EVERY {
                self.log_health();
                last_health_log = Instant::now();
            }
        }

        log::info!("monitor stopping; waiting for in-flight requests");
        self.settle(self.config.interval);
        self.log_health();
        self.stats
    }

    /// Run a fixed number of ticks on the configured cadence, then settle.
    pub fn run_cycles(&mut self, cycles: u64) -> MonitorStats {
        let mut next_tick = Instant::now();
        for done in 1..=cycles {
            self.tick();
            if done < cycles {
                next_tick = self.advance(next_tick);
                self.drain_until(next_tick, None);
            }
        }
        self.settle(SETTLE_TIMEOUT.max(self.config.interval));
        self.stats
    }

    /// Next tick on a fixed grid. Ticks missed while sampling are dropped, not queued.
    fn advance(&self, previous: Instant) -> Instant {
        let next = previous + self.config.interval;
        let now = Instant::now();
        if next + self.config.interval <= now {
            now
        } else {
            next
        }
    }

    fn log_health(&self) {
        let source = self.sampler.source().stats();
        let client = self.client.stats();
        log::info!(
            "health: source_ok={} frames={} capture_errors={} requests={} fallbacks={} ticks={} skipped={} presented={} in_flight={}",
            self.sampler.source().is_healthy(),
            source.frames_captured,
            source.capture_errors,
            client.requests,
            client.fallbacks,
            self.stats.ticks,
            self.stats.skipped,
            self.stats.presented,
            self.in_flight()
        );
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ClientStats;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::present::{SafetyState, SparklineRenderer, TerminalAlarm, TerminalStatus};
    use std::sync::Mutex;

    /// Replies with scripted verdicts after scripted delays, one entry per call.
    struct ScriptedClient {
        script: Mutex<Vec<(Duration, DetectionResult)>>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<(Duration, DetectionResult)>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
            }
        }
    }

    impl DetectionClient for ScriptedClient {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect(&self, _frame: &EncodedFrame) -> DetectionResult {
            let next = self.script.lock().unwrap().pop();
            match next {
                Some((delay, result)) => {
                    std::thread::sleep(delay);
                    result
                }
                None => DetectionResult::fallback(),
            }
        }

        fn stats(&self) -> ClientStats {
            ClientStats::default()
        }
    }

    /// Panics inside `detect`, like a buggy client would.
    struct PanickingClient;

    impl DetectionClient for PanickingClient {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn detect(&self, _frame: &EncodedFrame) -> DetectionResult {
            panic!("detector bug");
        }
    }

    fn monitor(
        client: impl DetectionClient + 'static,
        overlap: OverlapPolicy,
    ) -> Result<Monitor<SyntheticSource>> {
        let mut source = SyntheticSource::new(SyntheticConfig {
            width: 16,
            height: 12,
            ..SyntheticConfig::default()
        });
        source.open()?;
        let presenter = Presenter::new(
            Box::new(TerminalStatus::new(Box::new(std::io::sink()), false)),
            Box::new(TerminalAlarm::new(Box::new(std::io::sink()))),
            Box::new(SparklineRenderer::new(Box::new(std::io::sink()))),
            30,
        );
        Ok(Monitor::new(
            FrameSampler::new(source, 75),
            Arc::new(client),
            presenter,
            MonitorConfig {
                interval: Duration::from_millis(20),
                overlap,
            },
        ))
    }

    #[test]
    fn concurrent_requests_present_in_arrival_order() -> Result<()> {
        let client = ScriptedClient::new(vec![
            (Duration::from_millis(300), DetectionResult::unsafe_(0.9)),
            (Duration::from_millis(0), DetectionResult::safe(0.1)),
        ]);
        let mut monitor = monitor(client, OverlapPolicy::Concurrent)?;

        assert_eq!(monitor.tick(), Some(1));
        // Let the first worker take its scripted entry before the second tick.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(monitor.tick(), Some(2));
        monitor.settle(Duration::from_secs(5));

        // The slow first verdict lands last and wins the display.
        assert_eq!(monitor.presenter().series().values(), vec![0.1, 0.9]);
        assert_eq!(monitor.presenter().state(), Some(SafetyState::Unsafe));
        assert_eq!(monitor.stats().skipped, 0);
        assert_eq!(monitor.stats().presented, 2);
        Ok(())
    }

    #[test]
    fn single_slot_guard_skips_overlapping_ticks() -> Result<()> {
        let client = ScriptedClient::new(vec![
            (Duration::from_millis(300), DetectionResult::unsafe_(0.9)),
            (Duration::from_millis(0), DetectionResult::safe(0.1)),
        ]);
        let mut monitor = monitor(client, OverlapPolicy::SkipWhileInFlight)?;

        assert_eq!(monitor.tick(), Some(1));
        assert_eq!(monitor.tick(), None);
        monitor.settle(Duration::from_secs(5));
        assert_eq!(monitor.tick(), Some(3));
        monitor.settle(Duration::from_secs(5));

        assert_eq!(monitor.presenter().series().values(), vec![0.9, 0.1]);
        assert_eq!(monitor.presenter().state(), Some(SafetyState::Safe));
        assert_eq!(
            monitor.stats(),
            MonitorStats {
                ticks: 3,
                dispatched: 2,
                skipped: 1,
                presented: 2,
            }
        );
        Ok(())
    }

    #[test]
    fn panicking_worker_releases_its_slot() -> Result<()> {
        let mut monitor = monitor(PanickingClient, OverlapPolicy::SkipWhileInFlight)?;

        assert_eq!(monitor.tick(), Some(1));
        monitor.settle(Duration::from_secs(5));
        assert_eq!(monitor.in_flight(), 0);
        assert_eq!(monitor.tick(), Some(2));
        monitor.settle(Duration::from_secs(5));

        assert_eq!(monitor.stats().skipped, 0);
        assert_eq!(monitor.presenter().series().values(), vec![0.0, 0.0]);
        assert_eq!(monitor.presenter().state(), Some(SafetyState::Safe));
        Ok(())
    }

    #[test]
    fn run_cycles_presents_every_cycle() -> Result<()> {
        let client = ScriptedClient::new(vec![
            (Duration::ZERO, DetectionResult::safe(0.1)),
            (Duration::ZERO, DetectionResult::unsafe_(0.9)),
            (Duration::ZERO, DetectionResult::safe(0.2)),
        ]);
        let mut monitor = monitor(client, OverlapPolicy::Concurrent)?;

        let stats = monitor.run_cycles(3);

        assert_eq!(stats.presented, 3);
        assert_eq!(monitor.in_flight(), 0);
        assert_eq!(monitor.presenter().series().len(), 3);
        Ok(())
    }

    #[test]
    fn run_stops_when_flag_is_set() -> Result<()> {
        let client = ScriptedClient::new(Vec::new());
        let mut monitor = monitor(client, OverlapPolicy::Concurrent)?;
        let shutdown = AtomicBool::new(true);

        let stats = monitor.run(&shutdown);
        assert_eq!(stats.ticks, 0);
        Ok(())
    }

    #[test]
    fn parses_overlap_policy() -> Result<()> {
        assert_eq!(
            "concurrent".parse::<OverlapPolicy>()?,
            OverlapPolicy::Concurrent
        );
        assert_eq!(
            "skip-while-in-flight".parse::<OverlapPolicy>()?,
            OverlapPolicy::SkipWhileInFlight
        );
        assert_eq!("SKIP".parse::<OverlapPolicy>()?, OverlapPolicy::SkipWhileInFlight);
        assert!("queue".parse::<OverlapPolicy>().is_err());
        Ok(())
    }
}
