//! HTML run report
//!
//! Entries are appended to while tests run and written to disk once, when the
//! run finishes. The report is shared by every test thread; each test appends
//! through its own [`EntryHandle`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::HarnessResult;

/// Severity of a report line, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Info,
    Pass,
    Skip,
    Fail,
}

impl LogStatus {
    fn css_class(&self) -> &'static str {
        match self {
            LogStatus::Info => "info",
            LogStatus::Pass => "pass",
            LogStatus::Skip => "skip",
            LogStatus::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub status: LogStatus,
    /// HTML fragment
    pub message: String,
    /// Path of an embedded image, relative to the report file
    pub media: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// Per-test log, in the order lines were appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub categories: Vec<String>,
    pub records: Vec<ReportRecord>,
    pub started_at: DateTime<Utc>,
}

impl ReportEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            categories: Vec::new(),
            records: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Most severe status logged so far
    pub fn status(&self) -> LogStatus {
        self.records
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(LogStatus::Info)
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.message.as_str())
    }
}

/// Shared handle to one entry
#[derive(Debug, Clone)]
pub struct EntryHandle {
    inner: Arc<Mutex<ReportEntry>>,
}

impl EntryHandle {
    fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ReportEntry::new(name))),
        }
    }

    pub fn log(&self, status: LogStatus, text: impl Into<String>) {
        self.push(status, text.into(), None);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogStatus::Info, text);
    }

    pub fn pass(&self, text: impl Into<String>) {
        self.log(LogStatus::Pass, text);
    }

    pub fn skip(&self, text: impl Into<String>) {
        self.log(LogStatus::Skip, text);
    }

    pub fn fail(&self, text: impl Into<String>, media: Option<String>) {
        self.push(LogStatus::Fail, text.into(), media);
    }

    pub fn assign_category(&self, category: impl Into<String>) {
        let category = category.into();
        let mut entry = self.inner.lock();
        if !entry.categories.contains(&category) {
            entry.categories.push(category);
        }
    }

    pub fn snapshot(&self) -> ReportEntry {
        self.inner.lock().clone()
    }

    fn push(&self, status: LogStatus, message: String, media: Option<String>) {
        self.inner.lock().records.push(ReportRecord {
            status,
            message,
            media,
            logged_at: Utc::now(),
        });
    }
}

/// Counts written next to the HTML page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub title: String,
    pub report_name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

pub struct HtmlReport {
    title: String,
    report_name: String,
    output_dir: PathBuf,
    entries: Mutex<Vec<EntryHandle>>,
}

impl HtmlReport {
    pub fn new(output_dir: impl Into<PathBuf>, report_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            report_name: report_name.into(),
            output_dir: output_dir.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    /// `<output>/<report name>.html`
    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.html", self.report_name))
    }

    /// `<output>/<report name>.json`
    pub fn json_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.json", self.report_name))
    }

    /// Folder holding images referenced by the report
    pub fn asset_dir(&self) -> PathBuf {
        self.output_dir.join(&self.report_name)
    }

    /// Path of an asset as referenced from the HTML page
    pub fn asset_link(&self, file_name: &str) -> String {
        format!("{}/{}", self.report_name, file_name)
    }

    pub fn create_entry(&self, name: &str) -> EntryHandle {
        let handle = EntryHandle::new(name);
        self.entries.lock().push(handle.clone());
        handle
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().iter().map(EntryHandle::snapshot).collect()
    }

    pub fn entry(&self, name: &str) -> Option<ReportEntry> {
        self.entries
            .lock()
            .iter()
            .map(EntryHandle::snapshot)
            .find(|e| e.name == name)
    }

    pub fn summary(&self) -> ReportSummary {
        let entries = self.entries();
        let count = |status: LogStatus| entries.iter().filter(|e| e.status() == status).count();
        ReportSummary {
            title: self.title.clone(),
            report_name: self.report_name.clone(),
            total: entries.len(),
            passed: count(LogStatus::Pass),
            failed: count(LogStatus::Fail),
            skipped: count(LogStatus::Skip),
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Write the HTML page and JSON summary, returning the HTML path
    pub fn flush(&self) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let summary = self.summary();
        let html_path = self.html_path();
        std::fs::write(&html_path, render_html(&summary))?;
        std::fs::write(self.json_path(), serde_json::to_string_pretty(&summary)?)?;

        info!(
            "Report written to {} ({} passed, {} failed, {} skipped)",
            html_path.display(),
            summary.passed,
            summary.failed,
            summary.skipped
        );
        Ok(html_path)
    }
}

fn render_html(summary: &ReportSummary) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
.test {{ border: 1px solid #ddd; margin: 1em 0; padding: 0.5em 1em; }}
.category {{ color: #666; font-size: 0.9em; margin-right: 0.5em; }}
.label {{ color: #fff; padding: 2px 6px; border-radius: 3px; }}
.label.green {{ background: #2e7d32; }}
.label.red {{ background: #c62828; }}
.label.orange {{ background: #ef6c00; }}
.fail {{ color: #c62828; }}
.skip {{ color: #ef6c00; }}
.pass {{ color: #2e7d32; }}
img.shot {{ max-width: 320px; border: 1px solid #ccc; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{total} tests: {passed} passed, {failed} failed, {skipped} skipped. Generated {generated}.</p>
"#,
        title = markup::escape(&summary.title),
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        generated = summary.generated_at.to_rfc3339(),
    );

    for entry in &summary.entries {
        let _ = writeln!(
            html,
            r#"<div class="test {status}"><h2>{name}</h2>"#,
            status = entry.status().css_class(),
            name = markup::escape(&entry.name),
        );
        for category in &entry.categories {
            let _ = write!(html, r#"<span class="category">{}</span>"#, markup::escape(category));
        }
        html.push_str("<table>\n");
        for record in &entry.records {
            let _ = write!(
                html,
                r#"<tr class="{status}"><td>{time}</td><td>{status}</td><td>{message}"#,
                status = record.status.css_class(),
                time = record.logged_at.format("%H:%M:%S"),
                message = record.message,
            );
            if let Some(media) = &record.media {
                let _ = write!(
                    html,
                    r#"<br><a href="{src}" target="_blank"><img class="shot" src="{src}"></a>"#,
                    src = markup::escape(media),
                );
            }
            html.push_str("</td></tr>\n");
        }
        html.push_str("</table></div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// HTML fragments used in report lines
pub mod markup {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LabelColor {
        Green,
        Red,
        Orange,
    }

    impl LabelColor {
        fn css(&self) -> &'static str {
            match self {
                LabelColor::Green => "green",
                LabelColor::Red => "red",
                LabelColor::Orange => "orange",
            }
        }
    }

    pub fn label(text: &str, color: LabelColor) -> String {
        format!(r#"<span class="label {}">{}</span>"#, color.css(), escape(text))
    }

    /// Collapsible block with the failure message and stack trace.
    ///
    /// Commas become line breaks so long messages wrap in the page.
    pub fn failure_details(message: &str, stack_trace: &str) -> String {
        let message = escape(message).replace(',', "<br>");
        let stack_trace = escape(stack_trace).replace(',', "<br>");
        format!(
            "<details><summary><b><span class=\"fail\">Exception occurred, click to see details:</span></b></summary>{}<br><pre>{}</pre></details>",
            message, stack_trace
        )
    }

    /// Caption shown above an embedded failure screenshot
    pub fn screenshot_caption(session: Option<usize>) -> String {
        match session {
            Some(index) => format!("<b>Failure screenshot (Session {})</b>, click to expand", index),
            None => "<b>Failure screenshot</b>, click to expand".to_string(),
        }
    }

    pub fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}
