//! Presentation mode selection.

/// Smallest terminal the dashboard is laid out for.
pub const MIN_WIDTH: u16 = 80;
pub const MIN_HEIGHT: u16 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Full-screen dashboard.
    Interactive,
    /// Line-oriented output, no terminal control.
    Headless,
}

/// Chosen mode, plus why the dashboard was not used when it was wanted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: Mode,
    pub fallback_reason: Option<String>,
}

impl ModeSelection {
    fn headless(reason: Option<String>) -> Self {
        Self {
            mode: Mode::Headless,
            fallback_reason: reason,
        }
    }
}

/// Source of the current terminal size.
pub trait TerminalProbe {
    /// `None` when stdout is not a terminal or the size is unknown.
    fn size(&self) -> Option<(u16, u16)>;
}

/// Probe returning a fixed answer.
#[derive(Clone, Copy, Debug)]
pub struct FixedProbe(pub Option<(u16, u16)>);

impl TerminalProbe for FixedProbe {
    fn size(&self) -> Option<(u16, u16)> {
        self.0
    }
}

/// Decide the presentation mode once, before execution starts.
pub fn select_mode(ci_mode: bool, probe: &dyn TerminalProbe) -> ModeSelection {
    if ci_mode {
        return ModeSelection::headless(None);
    }
    match probe.size() {
        None => ModeSelection::headless(Some(
            "unable to detect terminal size (not a TTY)".to_string(),
        )),
        Some((width, height)) if width < MIN_WIDTH || height < MIN_HEIGHT => {
            ModeSelection::headless(Some(format!(
                "terminal too small ({width}x{height}, minimum {MIN_WIDTH}x{MIN_HEIGHT} required)"
            )))
        }
        Some(_) => ModeSelection {
            mode: Mode::Interactive,
            fallback_reason: None,
        },
    }
}
