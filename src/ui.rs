use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Startup stage reporting on stderr.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    /// `Auto` follows the terminal; `Pretty` forces spinners and colour, e.g. under a pager
    /// that understands ANSI.
    pub fn is_pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Plain => false,
            UiMode::Auto => self.is_tty,
        }
    }

    /// Colour the status label; follows the same rule as the spinners.
    pub fn use_color(&self) -> bool {
        self.is_pretty()
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Blocking alert shown before a fatal exit.
    pub fn alert(&self, message: &str) {
        if self.is_pretty() {
            eprintln!("\x1b[1;41;97m ! \x1b[0m {}", message);
        } else {
            eprintln!("!! {}", message);
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Mark the stage failed so the closing line does not report success.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{} {} ({})", mark, self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            if self.failed {
                spinner.abandon_with_message(message);
            } else {
                spinner.finish_with_message(message);
            }
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_follows_the_terminal() {
        assert!(Ui::from_args(None, true).is_pretty());
        assert!(!Ui::from_args(Some("auto"), false).is_pretty());
    }

    #[test]
    fn explicit_modes_override_the_terminal() {
        let forced = Ui::from_args(Some("pretty"), false);
        assert!(forced.is_pretty());
        assert!(forced.use_color());
        assert!(!Ui::from_args(Some("plain"), true).use_color());
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
