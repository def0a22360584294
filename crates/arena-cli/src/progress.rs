//! Headless progress output using indicatif.

use arena::observer::{LogLine, Observer, RunCompleted, RunStarted};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// Observer that reports each run on stderr.
///
/// On a terminal a progress bar tracks completion and finished runs are
/// printed above it; otherwise every start and completion is one plain line.
pub struct LineReporter {
    bar: Option<ProgressBar>,
    total: usize,
    color: bool,
}

impl LineReporter {
    pub fn new(total: usize, show_bar: bool, color: bool) -> Self {
        let bar = show_bar.then(|| {
            let pb = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        Self { bar, total, color }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match &self.bar {
            Some(pb) => pb.println(text),
            None => {
                let _ = writeln!(std::io::stderr(), "{text}");
            }
        }
    }

    fn paint(&self, glyph: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{glyph}\x1b[0m")
        } else {
            glyph.to_string()
        }
    }
}

impl Observer for LineReporter {
    fn on_run_start(&self, event: RunStarted) {
        match &self.bar {
            Some(pb) => pb.set_message(event.combination.to_string()),
            None => self.line(&format!(
                "[{}/{}] started {}",
                event.index + 1,
                self.total,
                event.combination
            )),
        }
    }

    fn on_run_complete(&self, event: RunCompleted) {
        let result = &event.result;
        let label = result.combination();
        let duration = result.duration_ms;
        let text = match &result.error {
            None => format!("  {} {label} ({duration}ms)", self.paint("✓", "32")),
            Some(err) => format!("  {} {label} ({duration}ms): {err}", self.paint("✗", "31")),
        };
        self.line(&text);
        if let Some(pb) = &self.bar {
            pb.inc(1);
        }
    }

    fn on_log(&self, event: LogLine) {
        self.line(&format!("  {} {}", event.level, event.text));
    }
}
