use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::domain::ItemDescriptor;
use crate::download::{DownloadRequest, Downloader};
use crate::error::QueueError;
use crate::fs_util::find_in_path;
use crate::source::PlaylistClient;

pub const TOOL_NAME: &str = "yt-dlp";

static ERROR_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^ERROR:\s*(.+?)\s*$").ok());

#[derive(Debug, Clone)]
pub enum ToolStatus {
    Ready,
    Missing { message: String },
}

#[derive(Debug, Clone)]
pub struct YtDlpClient {
    program: Option<PathBuf>,
    cookies_from_browser: Option<String>,
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self {
            program: find_in_path(TOOL_NAME),
            cookies_from_browser: Some("firefox".to_string()),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            cookies_from_browser: Some("firefox".to_string()),
        }
    }

    pub fn cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    pub fn tool_status(&self) -> ToolStatus {
        match &self.program {
            Some(_) => ToolStatus::Ready,
            None => ToolStatus::Missing {
                message: format!("{TOOL_NAME} not found on PATH"),
            },
        }
    }

    pub fn require(&self) -> Result<&Path, QueueError> {
        self.program
            .as_deref()
            .ok_or_else(|| QueueError::MissingTool(TOOL_NAME.to_string()))
    }

    fn run(&self, args: &[String]) -> Result<Output, QueueError> {
        let program = self.require()?;
        debug!(program = %program.display(), ?args, "running");
        Command::new(program).args(args).output().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                QueueError::MissingTool(TOOL_NAME.to_string())
            } else {
                QueueError::Filesystem(format!("run {}: {err}", program.display()))
            }
        })
    }
}

pub fn listing_args(
    source_url: &str,
    limit: Option<usize>,
    cookies_from_browser: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
    ];
    if let Some(limit) = limit {
        args.push("--playlist-items".to_string());
        args.push(format!("1:{limit}"));
    }
    if let Some(browser) = cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.to_string());
    }
    args.push(source_url.to_string());
    args
}

pub fn format_selector(max_height: u32) -> String {
    format!("bestvideo[height<={max_height}][vcodec!~='vp0?9']+bestaudio/best")
}

pub fn download_args(request: &DownloadRequest<'_>) -> Vec<String> {
    let media = request.media;
    let template = request.target_dir.join("%(upload_date)s %(title)s.%(ext)s");
    let mut args = vec![
        "-f".to_string(),
        format_selector(request.max_height),
        "-o".to_string(),
        template.into_string(),
        "--no-progress".to_string(),
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
    ];
    if media.write_subtitles && !media.subtitle_langs.is_empty() {
        args.push("--write-subs".to_string());
        args.push("--sub-langs".to_string());
        args.push(media.subtitle_langs.join(","));
    }
    if media.write_thumbnail {
        args.push("--write-thumbnail".to_string());
    }
    if media.write_description {
        args.push("--write-description".to_string());
    }
    match (request.cookies_file, media.cookies_from_browser.as_deref()) {
        (Some(file), _) => {
            args.push("--cookies".to_string());
            args.push(file.to_string());
        }
        (None, Some(browser)) => {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.to_string());
        }
        (None, None) => {}
    }
    args.push(request.url.to_string());
    args
}

pub fn parse_listing(json: &str) -> Result<Vec<ItemDescriptor>, QueueError> {
    let document: Value =
        serde_json::from_str(json).map_err(|err| QueueError::Serialization(err.to_string()))?;
    let Some(entries) = document.get("entries").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.get("entries").and_then(Value::as_array) {
            Some(nested) => {
                for inner in nested {
                    out.push(ItemDescriptor::from_value(inner)?);
                }
            }
            None => out.push(ItemDescriptor::from_value(entry)?),
        }
    }
    Ok(out)
}

pub fn error_message(stderr: &str) -> String {
    let lines: Vec<&str> = match ERROR_LINE.as_ref() {
        Some(re) => re
            .captures_iter(stderr)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect(),
        None => Vec::new(),
    };
    if lines.is_empty() {
        stderr.trim().to_string()
    } else {
        lines.join("; ")
    }
}

fn failure_message(output: &Output) -> String {
    let message = error_message(&String::from_utf8_lossy(&output.stderr));
    if message.is_empty() {
        format!("{TOOL_NAME} exited with {}", output.status)
    } else {
        message
    }
}

pub fn reported_path(stdout: &str) -> Option<Utf8PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(Utf8PathBuf::from)
}

impl PlaylistClient for YtDlpClient {
    fn list_entries(
        &self,
        source_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ItemDescriptor>, QueueError> {
        let args = listing_args(source_url, limit, self.cookies_from_browser.as_deref());
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(QueueError::Enumeration(failure_message(&output)));
        }
        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Downloader for YtDlpClient {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<Option<Utf8PathBuf>, QueueError> {
        let output = self.run(&download_args(request))?;
        if !output.status.success() {
            return Err(QueueError::download(failure_message(&output)));
        }
        Ok(reported_path(&String::from_utf8_lossy(&output.stdout)))
    }
}
