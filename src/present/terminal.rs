//! Terminal surfaces for the presenter.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use super::{Alarm, ChartSeries, SafetyState, SeriesRenderer, StatusDisplay};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const CHART_TITLE: &str = "Unsafe Confidence";

fn stderr_sink() -> Box<dyn Write + Send> {
    Box::new(io::stderr())
}

/// Writes the status label, coloured when enabled. Repeating the current state is a
/// no-op on screen.
pub struct TerminalStatus {
    out: Box<dyn Write + Send>,
    color: bool,
    shown: Option<SafetyState>,
}

impl TerminalStatus {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            out,
            color,
            shown: None,
        }
    }

    pub fn stderr(color: bool) -> Self {
        Self::new(stderr_sink(), color)
    }
}

impl StatusDisplay for TerminalStatus {
    fn show(&mut self, state: SafetyState) {
        if self.shown == Some(state) {
            return;
        }
        let line = if self.color {
            let code = match state {
                SafetyState::Safe => "1;42;30",
                SafetyState::Unsafe => "1;41;97",
            };
            format!("\x1b[{}m {} \x1b[0m", code, state.label())
        } else {
            format!("[{}] {}", state.style(), state.label())
        };
        if let Err(err) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            log::debug!("status display write failed: {}", err);
        }
        self.shown = Some(state);
    }
}

/// Alarm cue that rings the terminal bell when playback starts.
///
/// Tracks a playback position so that pause + rewind behave like a media element.
pub struct TerminalAlarm {
    out: Box<dyn Write + Send>,
    started_at: Option<Instant>,
    offset: Duration,
}

impl TerminalAlarm {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            started_at: None,
            offset: Duration::ZERO,
        }
    }

    pub fn stderr() -> Self {
        Self::new(stderr_sink())
    }
}

impl Alarm for TerminalAlarm {
    fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    fn play(&mut self) -> Result<()> {
        if self.started_at.is_some() {
            return Ok(());
        }
        self.out
            .write_all(b"\x07")
            .and_then(|_| self.out.flush())
            .context("ring terminal bell")?;
        log::warn!("alarm started");
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.offset += started.elapsed();
            log::info!("alarm stopped");
        }
    }

    fn rewind(&mut self) {
        self.offset = Duration::ZERO;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> Duration {
        self.offset + self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// Redraws the series as a one-line sparkline on a fixed 0..1 scale.
pub struct SparklineRenderer {
    out: Box<dyn Write + Send>,
}

impl SparklineRenderer {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stderr() -> Self {
        Self::new(stderr_sink())
    }
}

impl SeriesRenderer for SparklineRenderer {
    fn redraw(&mut self, series: &ChartSeries) {
        let line = render_sparkline(series);
        if let Err(err) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            log::debug!("chart write failed: {}", err);
        }
    }
}

/// `Unsafe Confidence |▁▁▇█▁| 0.05 @ 9:5:7`
pub fn render_sparkline(series: &ChartSeries) -> String {
    let bars: String = series.points().map(|p| spark_char(p.value)).collect();
    match series.latest() {
        Some(latest) => format!(
            "{} |{:<width$}| {:.2} @ {}",
            CHART_TITLE,
            bars,
            latest.value,
            latest.label,
            width = series.capacity()
        ),
        None => format!("{} |{:<width$}|", CHART_TITLE, "", width = series.capacity()),
    }
}

fn spark_char(value: f64) -> char {
    let clamped = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let idx = (clamped * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
    SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn status_writes_only_on_change() {
        let buf = SharedBuf::default();
        let mut status = TerminalStatus::new(Box::new(buf.clone()), false);

        status.show(SafetyState::Safe);
        status.show(SafetyState::Safe);
        status.show(SafetyState::Unsafe);

        assert_eq!(buf.contents(), "[safe] SAFE\n[unsafe] UNSAFE\n");
    }

    #[test]
    fn alarm_rings_once_and_rewinds() -> Result<()> {
        let buf = SharedBuf::default();
        let mut alarm = TerminalAlarm::new(Box::new(buf.clone()));

        alarm.play()?;
        alarm.play()?;
        assert!(alarm.is_playing());
        assert_eq!(buf.contents(), "\x07");

        alarm.pause();
        assert!(!alarm.is_playing());
        alarm.rewind();
        assert_eq!(alarm.position(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn sparkline_scales_to_unit_range() {
        let mut series = ChartSeries::with_capacity(4);
        series.push("9:0:1", 0.0);
        series.push("9:0:2", 1.0);
        series.push("9:0:3", 7.5);
        assert_eq!(
            render_sparkline(&series),
            "Unsafe Confidence |▁██ | 7.50 @ 9:0:3"
        );
    }

    #[test]
    fn empty_sparkline_has_blank_bars() {
        let series = ChartSeries::with_capacity(3);
        assert_eq!(render_sparkline(&series), "Unsafe Confidence |   |");
    }
}
