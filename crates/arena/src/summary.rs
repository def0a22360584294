//! Post-execution summary built from the progress model.

use crate::model::{RunId, RunStatus};
use crate::progress::ProgressModel;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Final state of one run, as seen by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub index: usize,
    pub run_id: RunId,
    pub label: String,
    pub provider: String,
    pub status: RunStatus,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub started: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Every started run, in plan order.
    pub outcomes: Vec<RunOutcome>,
    pub provider_counts: BTreeMap<String, usize>,
    pub scenario_count: usize,
    pub regions: Vec<String>,
    pub elapsed: Duration,
    pub average_duration: Option<Duration>,
    pub out_dir: PathBuf,
    pub html_report: Option<PathBuf>,
}

impl Summary {
    pub fn from_model(model: &ProgressModel, out_dir: &Path, html_report: Option<&Path>) -> Self {
        let records = model.records_in_plan_order();
        let mut provider_counts = BTreeMap::new();
        let mut scenarios = BTreeSet::new();
        let mut regions = BTreeSet::new();
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let combination = &record.combination;
            *provider_counts
                .entry(combination.provider.clone())
                .or_insert(0) += 1;
            scenarios.insert(combination.scenario.as_str());
            regions.insert(combination.region.clone());
            outcomes.push(RunOutcome {
                index: record.index,
                run_id: record.run_id,
                label: combination.to_string(),
                provider: combination.provider.clone(),
                status: record.status,
                duration: record.duration,
                error: record.error.clone(),
            });
        }

        Self {
            total: model.total(),
            started: model.started_count(),
            completed: model.completed_count(),
            succeeded: model.succeeded_count(),
            failed: model.failed_count(),
            outcomes,
            provider_counts,
            scenario_count: scenarios.len(),
            regions: regions.into_iter().collect(),
            elapsed: model.elapsed(),
            average_duration: model.average_duration(),
            out_dir: out_dir.to_path_buf(),
            html_report: html_report.map(Path::to_path_buf),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == RunStatus::Failed)
    }

    /// True when the dashboard was left before every run finished.
    pub fn is_partial(&self) -> bool {
        self.completed < self.total
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryStyle {
    /// Bare lines for CI logs.
    Plain,
    /// Boxed, with status glyphs, for printing after the dashboard exits.
    Decorated { width: u16 },
}

const MIN_BOX_WIDTH: usize = 40;

/// Render the summary. Both styles carry the same fact lines.
pub fn render_summary(summary: &Summary, style: SummaryStyle) -> String {
    let lines = fact_lines(summary);
    match style {
        SummaryStyle::Plain => {
            let mut out = String::new();
            for line in &lines {
                out.push_str(&line.text);
                out.push('\n');
            }
            out
        }
        SummaryStyle::Decorated { width } => decorate(&lines, usize::from(width)),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tone {
    Neutral,
    Good,
    Bad,
}

struct FactLine {
    tone: Tone,
    text: String,
}

impl FactLine {
    fn new(tone: Tone, text: String) -> Self {
        Self { tone, text }
    }
}

fn fact_lines(summary: &Summary) -> Vec<FactLine> {
    let mut lines = vec![
        FactLine::new(
            Tone::Neutral,
            if summary.is_partial() {
                "Execution incomplete".to_string()
            } else {
                "Execution complete".to_string()
            },
        ),
        FactLine::new(Tone::Neutral, format!("Total runs: {}", summary.total)),
        FactLine::new(Tone::Neutral, format!("Started: {}", summary.started)),
        FactLine::new(
            Tone::Neutral,
            format!("Completed: {}/{}", summary.completed, summary.total),
        ),
        FactLine::new(Tone::Good, format!("Successful: {}", summary.succeeded)),
        FactLine::new(
            if summary.failed > 0 {
                Tone::Bad
            } else {
                Tone::Neutral
            },
            format!("Errors: {}", summary.failed),
        ),
    ];

    let providers = summary
        .provider_counts
        .iter()
        .map(|(provider, count)| format!("{provider} ({count})"))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(FactLine::new(Tone::Neutral, format!("Providers: {providers}")));
    lines.push(FactLine::new(
        Tone::Neutral,
        format!("Scenarios: {}", summary.scenario_count),
    ));
    lines.push(FactLine::new(
        Tone::Neutral,
        format!("Regions: {}", summary.regions.join(", ")),
    ));
    lines.push(FactLine::new(
        Tone::Neutral,
        format!("Elapsed: {}", format_duration(summary.elapsed)),
    ));
    if let Some(average) = summary.average_duration {
        lines.push(FactLine::new(
            Tone::Neutral,
            format!("Average run: {}", format_duration(average)),
        ));
    }
    lines.push(FactLine::new(
        Tone::Neutral,
        format!("Output: {}", summary.out_dir.display()),
    ));
    if let Some(report) = &summary.html_report {
        lines.push(FactLine::new(
            Tone::Neutral,
            format!("HTML report: {}", report.display()),
        ));
    }

    let failures: Vec<&RunOutcome> = summary.failures().collect();
    if !failures.is_empty() {
        lines.push(FactLine::new(Tone::Bad, "Failed runs:".to_string()));
        for outcome in failures {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            lines.push(FactLine::new(
                Tone::Bad,
                format!("  {}: {error}", outcome.label),
            ));
        }
    }
    lines
}

fn decorate(lines: &[FactLine], width: usize) -> String {
    let width = width.max(MIN_BOX_WIDTH);
    let inner = width - 4;
    let mut out = String::new();

    let title = " Arena Summary ";
    let fill = (width - 2).saturating_sub(title.chars().count() + 1);
    let _ = writeln!(out, "╭─{title}{}╮", "─".repeat(fill));
    for line in lines {
        let glyph = match line.tone {
            Tone::Good => "✓ ",
            Tone::Bad => "✗ ",
            Tone::Neutral => "  ",
        };
        let chunks = wrap_chars(&line.text, inner - 2);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let lead = if i == 0 { glyph } else { "  " };
            let body = format!("{lead}{chunk}");
            let pad = inner.saturating_sub(body.chars().count());
            let _ = writeln!(out, "│ {body}{} │", " ".repeat(pad));
        }
    }
    let _ = writeln!(out, "╰{}╯", "─".repeat(width - 2));
    out
}

/// Split `text` into pieces of at most `width` characters.
fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Human-readable duration: milliseconds below one second, else seconds.
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn empty_model_renders_without_failures() {
        let model = ProgressModel::new(0);
        let summary = Summary::from_model(&model, Path::new("out"), None);
        let plain = render_summary(&summary, SummaryStyle::Plain);
        assert!(plain.starts_with("Execution complete\n"));
        assert!(!plain.contains("Failed runs:"));
    }

    #[test]
    fn long_lines_wrap_inside_the_box() {
        let lines = vec![
            FactLine::new(Tone::Neutral, "Total runs: 1".to_string()),
            FactLine::new(Tone::Bad, format!("  us/mock/refund: {}END", "x".repeat(150))),
        ];
        let boxed = decorate(&lines, 50);

        for line in boxed.lines() {
            assert_eq!(line.chars().count(), 50, "line escapes the border: {line}");
        }
        assert!(boxed.lines().count() > lines.len() + 2);
        assert!(boxed.contains("END"));
    }

    #[test]
    fn wrapping_keeps_every_character() {
        let pieces = wrap_chars("abcdefg", 3);
        assert_eq!(pieces, vec!["abc", "def", "g"]);
        assert_eq!(wrap_chars("", 3), vec![String::new()]);
    }
}
