//! Safety status presentation.
//!
//! The presenter maps each detection verdict to one of two visual states, drives the
//! alarm cue, and appends the confidence score to the rolling chart. Output surfaces
//! are injected capabilities:
//! - `StatusDisplay`: shows the SAFE / UNSAFE label and style
//! - `Alarm`: a single pre-loaded alarm cue
//! - `SeriesRenderer`: redraws the confidence chart
//!
//! All side effects of a cycle happen synchronously inside `Presenter::present`.

use anyhow::Result;
use std::fmt;
use std::time::Duration;

use crate::detect::DetectionResult;

mod chart;
pub mod terminal;

pub use chart::{chart_label, ChartPoint, ChartSeries, DEFAULT_CHART_CAPACITY};
pub use terminal::{SparklineRenderer, TerminalAlarm, TerminalStatus};

/// Visual safety state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SafetyState {
    Safe,
    Unsafe,
}

impl SafetyState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Unsafe => "UNSAFE",
        }
    }

    /// Style class applied alongside the label.
    pub fn style(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        }
    }
}

impl fmt::Display for SafetyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status label surface.
pub trait StatusDisplay: Send {
    /// Set the label text and style for `state`.
    fn show(&mut self, state: SafetyState);
}

/// Alarm cue.
pub trait Alarm: Send {
    fn is_playing(&self) -> bool;

    /// Start playback from the current position.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Reset the playback position to the start.
    fn rewind(&mut self);

    /// Current playback position.
    fn position(&self) -> Duration;
}

/// Confidence chart surface.
pub trait SeriesRenderer: Send {
    fn redraw(&mut self, series: &ChartSeries);
}

/// Two-state presenter.
///
/// No state is shown until the first verdict arrives; the initial look of the
/// surfaces is whatever they were created with.
pub struct Presenter {
    status: Box<dyn StatusDisplay>,
    alarm: Box<dyn Alarm>,
    renderer: Box<dyn SeriesRenderer>,
    series: ChartSeries,
    state: Option<SafetyState>,
    cycles: u64,
}

impl Presenter {
    pub fn new(
        status: Box<dyn StatusDisplay>,
        alarm: Box<dyn Alarm>,
        renderer: Box<dyn SeriesRenderer>,
        chart_capacity: usize,
    ) -> Self {
        Self {
            status,
            alarm,
            renderer,
            series: ChartSeries::with_capacity(chart_capacity),
            state: None,
            cycles: 0,
        }
    }

    /// Present one verdict, labelling the chart point with the local wall clock.
    pub fn present(&mut self, result: &DetectionResult) -> SafetyState {
        let label = chart_label(&chrono::Local::now());
        self.present_labeled(result, label)
    }

    /// Present one verdict with an explicit chart label.
    pub fn present_labeled(
        &mut self,
        result: &DetectionResult,
        label: impl Into<String>,
    ) -> SafetyState {
        let next = if result.is_unsafe() {
            SafetyState::Unsafe
        } else {
            SafetyState::Safe
        };

        if self.state != Some(next) {
            log::info!(
                "status {} -> {} (confidence {:.2})",
                self.state.map(SafetyState::label).unwrap_or("-"),
                next,
                result.confidence
            );
        }
        self.status.show(next);

        match next {
            SafetyState::Unsafe => {
                if !self.alarm.is_playing() {
                    if let Err(err) = self.alarm.play() {
                        log::error!("failed to play alarm: {:#}", err);
                    }
                }
            }
            SafetyState::Safe => {
                if self.alarm.is_playing() {
                    self.alarm.pause();
                    self.alarm.rewind();
                }
            }
        }

        self.series.push(label, result.confidence);
        self.renderer.redraw(&self.series);

        self.state = Some(next);
        self.cycles += 1;
        log::debug!(
            "cycle {}: {} confidence={:.3}",
            self.cycles,
            result.status.as_str(),
            result.confidence
        );
        next
    }

    /// Last presented state, `None` before the first cycle.
    pub fn state(&self) -> Option<SafetyState> {
        self.state
    }

    pub fn series(&self) -> &ChartSeries {
        &self.series
    }

    pub fn alarm(&self) -> &dyn Alarm {
        self.alarm.as_ref()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
