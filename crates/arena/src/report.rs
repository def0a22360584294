//! Output index and static HTML report.
//!
//! After a run the output directory holds one `<run_id>.json` per run plus an
//! `index.json` listing them. The HTML report is regenerated from that index
//! at any time, so a crashed or partial run can still be reported on.

use crate::error::{ArenaError, ArenaResult};
use crate::model::{RunId, RunResult};
use crate::store::read_result_file;
use crate::summary::format_duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const INDEX_FILE: &str = "index.json";
pub const DEFAULT_REPORT_FILE: &str = "report.html";

/// Contents of `index.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIndex {
    pub total_runs: usize,
    pub successful: usize,
    pub errors: usize,
    /// Unix time in milliseconds.
    pub timestamp: u64,
    pub run_ids: Vec<RunId>,
}

impl RunIndex {
    pub fn new(run_ids: Vec<RunId>, successful: usize, errors: usize) -> Self {
        Self {
            total_runs: run_ids.len(),
            successful,
            errors,
            timestamp: unix_millis(),
            run_ids,
        }
    }
}

pub fn index_path(out_dir: &Path) -> PathBuf {
    out_dir.join(INDEX_FILE)
}

pub fn write_index(out_dir: &Path, index: &RunIndex) -> ArenaResult<PathBuf> {
    let path = index_path(out_dir);
    write_json(&path, index)?;
    Ok(path)
}

pub fn read_index(out_dir: &Path) -> ArenaResult<RunIndex> {
    let path = index_path(out_dir);
    let content = fs::read_to_string(&path).map_err(|err| {
        ArenaError::io("failed to read index", &err)
            .with_context(serde_json::json!({ "path": path, "source": err.to_string() }))
    })?;
    serde_json::from_str(&content).map_err(|err| {
        ArenaError::io("failed to parse index", &err)
            .with_context(serde_json::json!({ "path": path, "source": err.to_string() }))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ArenaResult<()> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|err| ArenaError::io("failed to serialize json", err))?;
    fs::write(path, data).map_err(|err| {
        ArenaError::io("failed to write file", &err)
            .with_context(serde_json::json!({ "path": path, "source": err.to_string() }))
    })
}

/// One provider × region cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub provider: String,
    pub region: String,
    pub scenarios: usize,
    pub successful: usize,
    pub errors: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub error_runs: usize,
    pub avg_latency: String,
}

/// Everything the HTML page shows; also written as the companion JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub title: String,
    pub generated_at: u64,
    pub summary: ReportSummary,
    pub results: Vec<RunResult>,
    pub providers: Vec<String>,
    pub regions: Vec<String>,
    pub scenarios: Vec<String>,
    /// Rows follow `providers`, columns follow `regions`.
    pub matrix: Vec<Vec<MatrixCell>>,
}

impl ReportData {
    pub fn from_results(results: Vec<RunResult>) -> Self {
        let providers: Vec<String> = distinct(&results, |r| &r.provider_id);
        let regions: Vec<String> = distinct(&results, |r| &r.region);
        let scenarios: Vec<String> = distinct(&results, |r| &r.scenario_id);

        let successful_runs = results.iter().filter(|r| r.is_success()).count();
        let timed: Vec<u64> = results
            .iter()
            .map(|r| r.duration_ms)
            .filter(|ms| *ms > 0)
            .collect();
        let avg_latency = if timed.is_empty() {
            "N/A".to_string()
        } else {
            let count = u64::try_from(timed.len()).unwrap_or(u64::MAX);
            format_duration(Duration::from_millis(timed.iter().sum::<u64>() / count))
        };

        let matrix = providers
            .iter()
            .map(|provider| {
                regions
                    .iter()
                    .map(|region| matrix_cell(&results, provider, region))
                    .collect()
            })
            .collect();

        Self {
            title: "Arena Report".to_string(),
            generated_at: unix_millis(),
            summary: ReportSummary {
                total_runs: results.len(),
                successful_runs,
                error_runs: results.len() - successful_runs,
                avg_latency,
            },
            results,
            providers,
            regions,
            scenarios,
            matrix,
        }
    }
}

fn distinct(results: &[RunResult], key: impl Fn(&RunResult) -> &String) -> Vec<String> {
    results
        .iter()
        .map(|r| key(r).clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn matrix_cell(results: &[RunResult], provider: &str, region: &str) -> MatrixCell {
    let mut cell = MatrixCell {
        provider: provider.to_string(),
        region: region.to_string(),
        scenarios: 0,
        successful: 0,
        errors: 0,
    };
    for result in results
        .iter()
        .filter(|r| r.provider_id == provider && r.region == region)
    {
        cell.scenarios += 1;
        if result.is_success() {
            cell.successful += 1;
        } else {
            cell.errors += 1;
        }
    }
    cell
}

/// Paths written by [`generate_html_report`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportOutput {
    pub html: PathBuf,
    pub data: PathBuf,
    pub results: usize,
    pub skipped: usize,
}

/// Companion data file: `report.html` -> `report-data.json`.
pub fn data_file_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output.with_file_name(format!("{stem}-data.json"))
}

/// Build the HTML report for the runs listed in `out_dir/index.json`.
///
/// Result files that are missing or unparsable are skipped with a warning.
/// Fails with `E_NO_VALID_RESULTS` when none of them can be loaded.
pub fn generate_html_report(out_dir: &Path, output: &Path) -> ArenaResult<ReportOutput> {
    let index = read_index(out_dir)?;
    let mut results = Vec::with_capacity(index.run_ids.len());
    let mut skipped = 0;
    for run_id in &index.run_ids {
        let path = out_dir.join(run_id.result_file_name());
        match read_result_file(&path) {
            Ok(result) => results.push(result),
            Err(err) => {
                skipped += 1;
                tracing::warn!(path = %path.display(), error = %err, "skipping result file");
            }
        }
    }
    if results.is_empty() {
        return Err(ArenaError::no_valid_results(index_path(out_dir).display()));
    }

    let data = ReportData::from_results(results);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            ArenaError::io("failed to create report dir", &err)
                .with_context(serde_json::json!({ "dir": parent, "source": err.to_string() }))
        })?;
    }
    fs::write(output, render_html(&data)).map_err(|err| {
        ArenaError::io("failed to write report", &err)
            .with_context(serde_json::json!({ "path": output, "source": err.to_string() }))
    })?;
    let data_path = data_file_for(output);
    write_json(&data_path, &data)?;

    tracing::info!(path = %output.display(), runs = data.results.len(), "html report written");
    Ok(ReportOutput {
        html: output.to_path_buf(),
        data: data_path,
        results: data.results.len(),
        skipped,
    })
}

fn render_html(data: &ReportData) -> String {
    let summary = &data.summary;
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
{CSS}
    </style>
</head>
<body>
    <header>
        <h1>{title}</h1>
        <span class="generated">generated {generated_at}</span>
    </header>

    <section class="cards">
        <div class="card"><span class="value">{total}</span><span class="label">Total runs</span></div>
        <div class="card ok"><span class="value">{successful}</span><span class="label">Successful</span></div>
        <div class="card err"><span class="value">{errors}</span><span class="label">Errors</span></div>
        <div class="card"><span class="value">{avg_latency}</span><span class="label">Avg latency</span></div>
        <div class="card"><span class="value">{scenarios}</span><span class="label">Scenarios</span></div>
    </section>

    <section>
        <h2>Provider &times; Region</h2>
{matrix}
    </section>

    <section>
        <h2>Runs</h2>
{runs}
    </section>
</body>
</html>
"#,
        title = html_escape(&data.title),
        generated_at = data.generated_at,
        total = summary.total_runs,
        successful = summary.successful_runs,
        errors = summary.error_runs,
        avg_latency = html_escape(&summary.avg_latency),
        scenarios = data.scenarios.len(),
        matrix = render_matrix(data),
        runs = render_runs(&data.results),
        CSS = CSS,
    )
}

fn render_matrix(data: &ReportData) -> String {
    let mut html = String::from("        <table class=\"matrix\">\n            <tr><th></th>");
    for region in &data.regions {
        let _ = write!(html, "<th>{}</th>", html_escape(region));
    }
    html.push_str("</tr>\n");
    for (provider, row) in data.providers.iter().zip(&data.matrix) {
        let _ = write!(html, "            <tr><th>{}</th>", html_escape(provider));
        for cell in row {
            let class = match (cell.scenarios, cell.errors) {
                (0, _) => "empty",
                (_, 0) => "ok",
                _ => "err",
            };
            let _ = write!(
                html,
                "<td class=\"{class}\">{}/{}</td>",
                cell.successful, cell.scenarios
            );
        }
        html.push_str("</tr>\n");
    }
    html.push_str("        </table>");
    html
}

fn render_runs(results: &[RunResult]) -> String {
    let mut html = String::from(
        "        <table class=\"runs\">\n            <tr><th>Run</th><th>Provider</th><th>Scenario</th><th>Region</th><th>Status</th><th>Duration</th><th>Detail</th></tr>\n",
    );
    for result in results {
        let (status, class, detail) = match &result.error {
            Some(error) => ("error", "err", error.clone()),
            None => (
                "ok",
                "ok",
                result
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
            ),
        };
        let _ = writeln!(
            html,
            "            <tr><td class=\"mono\">{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{class}\">{status}</td><td>{}</td><td><pre>{}</pre></td></tr>",
            result.run_id,
            html_escape(&result.provider_id),
            html_escape(&result.scenario_id),
            html_escape(&result.region),
            format_duration(Duration::from_millis(result.duration_ms)),
            html_escape(&detail),
        );
    }
    html.push_str("        </table>");
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

const CSS: &str = r"
:root {
    --bg-primary: #1a1a2e;
    --bg-secondary: #16213e;
    --text-primary: #eee;
    --text-secondary: #aaa;
    --border-color: #333;
    --ok: #4caf50;
    --err: #f44336;
    --accent: #00bcd4;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    background: var(--bg-primary);
    color: var(--text-primary);
    padding: 1.5rem;
}

header {
    display: flex;
    justify-content: space-between;
    align-items: baseline;
    border-bottom: 1px solid var(--border-color);
    padding-bottom: 1rem;
    margin-bottom: 1.5rem;
}

header h1 { font-size: 1.3rem; font-weight: 500; }
.generated { color: var(--text-secondary); font-size: 0.85rem; }

h2 { font-size: 1rem; font-weight: 500; margin: 1.5rem 0 0.75rem; color: var(--accent); }

.cards { display: flex; gap: 1rem; flex-wrap: wrap; }
.card {
    background: var(--bg-secondary);
    border: 1px solid var(--border-color);
    border-radius: 6px;
    padding: 1rem 1.25rem;
    min-width: 140px;
    display: flex;
    flex-direction: column;
}
.card .value { font-size: 1.6rem; font-weight: 600; }
.card .label { color: var(--text-secondary); font-size: 0.8rem; }
.card.ok .value { color: var(--ok); }
.card.err .value { color: var(--err); }

table { border-collapse: collapse; width: 100%; background: var(--bg-secondary); }
th, td { border: 1px solid var(--border-color); padding: 0.4rem 0.6rem; text-align: left; font-size: 0.85rem; vertical-align: top; }
th { color: var(--text-secondary); font-weight: 500; }
td.ok { color: var(--ok); }
td.err { color: var(--err); }
td.empty { color: var(--text-secondary); }
.mono { font-family: monospace; font-size: 0.75rem; }
pre { white-space: pre-wrap; font-family: monospace; }
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn companion_data_file_sits_next_to_report() {
        assert_eq!(
            data_file_for(Path::new("out/report.html")),
            PathBuf::from("out/report-data.json")
        );
    }
}
