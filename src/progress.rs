use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8Path;
use crossterm::style::Stylize;
use tracing::debug;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::download::{DownloadReport, LinkOutcome};
use crate::fetch::{ChannelResult, FetchSummary};

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    ChannelAttempt {
        channel: &'a str,
        config: &'a Utf8Path,
        attempt: u32,
    },
    ChannelFinished(&'a ChannelResult),
    ItemStarted {
        title: &'a str,
        link: &'a Utf8Path,
    },
    ItemFinished {
        title: &'a str,
        link: &'a Utf8Path,
        outcome: &'a LinkOutcome,
    },
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent<'_>);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent<'_>) {}
}

pub struct ProgressHandle {
    quiet: bool,
    multi: MultiProgress,
    overall: ProgressBar,
    active: Mutex<HashMap<String, ProgressBar>>,
}

pub fn create_progress(total: usize, quiet: bool) -> ProgressHandle {
    let multi = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    let overall = multi.add(ProgressBar::new(total as u64));
    overall.set_style(overall_style());
    ProgressHandle {
        quiet,
        multi,
        overall,
        active: Mutex::new(HashMap::new()),
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg:.bold.blue} [{wide_bar:.cyan/blue}] {pos}/{len} • {elapsed_precise} • {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}

fn status_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressHandle {
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn set_title(&self, title: &str) {
        self.overall.set_message(title.to_string());
    }

    fn status(&self, key: &str, message: String) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let bar = active.entry(key.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(status_style());
            if !self.quiet {
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            bar
        });
        bar.set_message(message);
    }

    fn complete(&self, key: &str, line: String) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(bar) = active.remove(key) {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }
        self.overall.inc(1);
        self.line(&line);
    }

    fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        if self.multi.is_hidden() {
            println!("{text}");
        } else if let Err(err) = self.multi.println(text) {
            debug!("progress line not drawn: {err}");
        }
    }

    pub fn finish(&self) {
        if let Ok(mut active) = self.active.lock() {
            for (_, bar) in active.drain() {
                bar.finish_and_clear();
            }
        }
        self.overall.finish_and_clear();
    }

    pub fn print_summary(&self, summary: &FetchSummary) {
        self.print_rows(&fetch_summary_rows(summary));
    }

    pub fn print_report(&self, report: &DownloadReport) {
        self.print_rows(&download_report_rows(report));
    }

    fn print_rows(&self, rows: &[SummaryRow]) {
        if self.quiet {
            return;
        }
        let width = rows.iter().map(|row| row.label.len()).max().unwrap_or(0);
        println!();
        for row in rows {
            let label = format!("{:<width$}", row.label);
            match row.tone {
                Tone::Plain => println!("{} {}", label.bold(), row.value),
                Tone::Warning => println!("{} {}", label.yellow(), row.value.clone().yellow()),
                Tone::Failure => println!("{} {}", label.red(), row.value.clone().dim()),
            }
        }
        println!();
    }
}

impl ProgressSink for ProgressHandle {
    fn event(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::ChannelAttempt {
                channel,
                config,
                attempt,
            } => {
                let retry = if attempt > 0 {
                    format!(" (retry {attempt})")
                } else {
                    String::new()
                };
                self.status(config.as_str(), format!("Fetching: {channel}{retry}"));
            }
            ProgressEvent::ChannelFinished(result) => {
                let line = if result.success {
                    format!(
                        "{} {}: {} new videos",
                        "✓".green(),
                        result.channel_name,
                        result.new_item_count
                    )
                } else {
                    format!(
                        "{} {}: {}",
                        "✗".red(),
                        result.channel_name,
                        result.error.as_deref().unwrap_or("unknown error")
                    )
                };
                self.complete(result.config_ref.as_str(), line);
            }
            ProgressEvent::ItemStarted { title, link } => {
                self.status(link.as_str(), format!("Downloading: {title}"));
            }
            ProgressEvent::ItemFinished {
                title,
                link,
                outcome,
            } => {
                let line = match outcome {
                    LinkOutcome::Completed { output: Some(path) } => {
                        format!("{} {title} → {path}", "✓".green())
                    }
                    LinkOutcome::Completed { output: None } => {
                        format!("{} {title} (output path unknown)", "✓".green())
                    }
                    LinkOutcome::Broken { kind, message, .. } => {
                        format!("{} {title}: {kind}: {message}", "✗".red())
                    }
                    LinkOutcome::Skipped => format!("{} {title}: already taken", "-".dim()),
                    LinkOutcome::Stuck { message } => {
                        format!("{} {title}: left queued: {message}", "✗".red())
                    }
                };
                self.complete(link.as_str(), line);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub label: String,
    pub value: String,
    pub tone: Tone,
}

impl SummaryRow {
    fn new(label: impl Into<String>, value: impl Into<String>, tone: Tone) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            tone,
        }
    }
}

pub fn fetch_summary_rows(summary: &FetchSummary) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow::new(
            "Channels processed:",
            format!("{}/{}", summary.successful, summary.total_channels),
            Tone::Plain,
        ),
        SummaryRow::new(
            "New videos queued:",
            summary.total_new_items.to_string(),
            Tone::Plain,
        ),
        SummaryRow::new(
            "Elapsed time:",
            format_duration(summary.elapsed_time),
            Tone::Plain,
        ),
    ];
    if summary.total_retries > 0 {
        rows.push(SummaryRow::new(
            "Total retries:",
            summary.total_retries.to_string(),
            Tone::Plain,
        ));
    }
    if summary.failed > 0 {
        rows.push(SummaryRow::new(
            "Failed channels:",
            summary.failed.to_string(),
            Tone::Warning,
        ));
        for failed in &summary.failed_channel_details {
            rows.push(SummaryRow::new(
                format!("  • {}", failed.channel_name),
                failed.error.clone().unwrap_or_default(),
                Tone::Failure,
            ));
        }
    }
    rows
}

pub fn download_report_rows(report: &DownloadReport) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow::new(
            "Downloaded:",
            (report.completed + report.completed_unknown_path).to_string(),
            Tone::Plain,
        ),
        SummaryRow::new(
            "Elapsed time:",
            format_duration(report.elapsed),
            Tone::Plain,
        ),
    ];
    if report.skipped > 0 {
        rows.push(SummaryRow::new(
            "Skipped:",
            report.skipped.to_string(),
            Tone::Plain,
        ));
    }
    if !report.stuck.is_empty() {
        rows.push(SummaryRow::new(
            "Left queued:",
            report.stuck.len().to_string(),
            Tone::Warning,
        ));
    }
    if !report.broken.is_empty() {
        rows.push(SummaryRow::new(
            "Marked broken:",
            report.broken.len().to_string(),
            Tone::Warning,
        ));
        for broken in &report.broken {
            rows.push(SummaryRow::new(
                format!("  • {}", broken.title),
                format!("{}: {}", broken.kind, broken.message),
                Tone::Failure,
            ));
        }
    }
    rows
}

pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let minutes = (seconds / 60.0).floor();
    format!("{}m {:.1}s", minutes as u64, seconds - minutes * 60.0)
}
