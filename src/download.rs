use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Serialize, Serializer};
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::domain::WorkItem;
use crate::error::{FailureKind, QueueError};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::LinkQueue;

pub const DEFAULT_DOWNLOAD_WORKERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOptions {
    pub subtitle_langs: Vec<String>,
    pub write_subtitles: bool,
    pub write_thumbnail: bool,
    pub write_description: bool,
    pub cookies_from_browser: Option<String>,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            subtitle_langs: vec!["pl".to_string(), "en".to_string(), "ru".to_string()],
            write_subtitles: true,
            write_thumbnail: true,
            write_description: true,
            cookies_from_browser: Some("firefox".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub workers: usize,
    pub media: MediaOptions,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_DOWNLOAD_WORKERS,
            media: MediaOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub target_dir: &'a Utf8Path,
    pub max_height: u32,
    pub cookies_file: Option<&'a str>,
    pub media: &'a MediaOptions,
}

pub trait Downloader: Send + Sync {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<Option<Utf8PathBuf>, QueueError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Completed {
        output: Option<Utf8PathBuf>,
    },
    Broken {
        marker: Utf8PathBuf,
        kind: FailureKind,
        message: String,
    },
    Skipped,
    /// The download failed and the link could not be renamed either; it
    /// stays queued as `.link`.
    Stuck {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub link: Utf8PathBuf,
    pub title: String,
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenItem {
    pub title: String,
    pub marker: Utf8PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub completed: usize,
    pub completed_unknown_path: usize,
    pub outputs: Vec<Utf8PathBuf>,
    pub broken: Vec<BrokenItem>,
    pub skipped: usize,
    pub stuck: Vec<String>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl DownloadReport {
    pub fn record(&mut self, report: &LinkReport) {
        match &report.outcome {
            LinkOutcome::Completed { output: Some(path) } => {
                self.completed += 1;
                self.outputs.push(path.clone());
            }
            LinkOutcome::Completed { output: None } => self.completed_unknown_path += 1,
            LinkOutcome::Broken {
                marker,
                kind,
                message,
            } => self.broken.push(BrokenItem {
                title: report.title.clone(),
                marker: marker.clone(),
                kind: *kind,
                message: message.clone(),
            }),
            LinkOutcome::Skipped => self.skipped += 1,
            LinkOutcome::Stuck { message } => self.stuck.push(message.clone()),
        }
    }

    pub fn total(&self) -> usize {
        self.completed
            + self.completed_unknown_path
            + self.broken.len()
            + self.skipped
            + self.stuck.len()
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

pub struct LinkDownloader<D> {
    queue: LinkQueue,
    target_dir: Utf8PathBuf,
    downloader: D,
    options: DownloadOptions,
}

impl<D: Downloader> LinkDownloader<D> {
    pub fn new(
        queue: LinkQueue,
        target_dir: impl Into<Utf8PathBuf>,
        downloader: D,
        options: DownloadOptions,
    ) -> Self {
        Self {
            queue,
            target_dir: target_dir.into(),
            downloader,
            options,
        }
    }

    pub fn from_config(config: &QueueConfig, downloader: D, options: DownloadOptions) -> Self {
        Self::new(
            LinkQueue::new(config.link_queue_dir.clone()),
            config.target_dir.clone(),
            downloader,
            options,
        )
    }

    pub fn queue(&self) -> &LinkQueue {
        &self.queue
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn download_link(&self, link: &Utf8Path, progress: &dyn ProgressSink) -> LinkReport {
        let fallback_title = link.file_stem().unwrap_or(link.as_str()).to_string();
        let item = match LinkQueue::load(link) {
            Ok(item) => item,
            Err(QueueError::NotFound(_)) => {
                warn!(link = %link, "link file no longer exists; skipping");
                return LinkReport {
                    link: link.to_path_buf(),
                    title: fallback_title,
                    outcome: LinkOutcome::Skipped,
                };
            }
            Err(err) => {
                error!(link = %link, "unreadable link file: {err}");
                let outcome = self.mark_broken(link, FailureKind::Generic, err.to_string());
                return LinkReport {
                    link: link.to_path_buf(),
                    title: fallback_title,
                    outcome,
                };
            }
        };

        progress.event(ProgressEvent::ItemStarted {
            title: &item.title,
            link,
        });
        let outcome = self.download_item(link, &item);
        LinkReport {
            link: link.to_path_buf(),
            title: item.title,
            outcome,
        }
    }

    fn download_item(&self, link: &Utf8Path, item: &WorkItem) -> LinkOutcome {
        info!(title = %item.title, "starting download");
        let target_dir = self.target_dir.join(&item.channel_label);
        let request = DownloadRequest {
            url: &item.source_url,
            title: &item.title,
            target_dir: &target_dir,
            max_height: item.max_height,
            cookies_file: item.cookies_file.as_deref(),
            media: &self.options.media,
        };

        match self.downloader.download(&request) {
            Ok(output) => {
                match &output {
                    Some(path) => info!(title = %item.title, "saved to {path}"),
                    None => info!(title = %item.title, "completed; output path not reported"),
                }
                if let Err(err) = LinkQueue::complete(link) {
                    warn!(link = %link, "could not remove link file: {err}");
                }
                LinkOutcome::Completed { output }
            }
            Err(QueueError::Download { kind, message }) => {
                match kind {
                    FailureKind::AccessDenied => error!(
                        title = %item.title,
                        "download refused (403 Forbidden); the host is likely blocking the \
                         client, make sure a JavaScript runtime such as Deno is on PATH and \
                         update yt-dlp: {message}"
                    ),
                    FailureKind::AuthenticationRequired => error!(
                        title = %item.title,
                        "the host requires sign-in; make sure browser cookies are available: \
                         {message}"
                    ),
                    FailureKind::Generic => {
                        error!(title = %item.title, "download failed: {message}")
                    }
                }
                self.mark_broken(link, kind, message)
            }
            Err(err) => {
                error!(title = %item.title, "unexpected error while downloading: {err}");
                self.mark_broken(link, FailureKind::Generic, err.to_string())
            }
        }
    }

    fn mark_broken(&self, link: &Utf8Path, kind: FailureKind, message: String) -> LinkOutcome {
        match LinkQueue::mark_broken(link) {
            Ok(marker) => LinkOutcome::Broken {
                marker,
                kind,
                message,
            },
            Err(err) => {
                error!(link = %link, "could not mark link as broken: {err}");
                LinkOutcome::Stuck {
                    message: format!("{message}; {err}"),
                }
            }
        }
    }

    pub fn download_all_sequential(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadReport, QueueError> {
        let started = Instant::now();
        let mut report = DownloadReport::default();
        for link in self.queue.pending()? {
            let result = self.download_link(&link, progress);
            finish(&result, progress);
            report.record(&result);
        }
        report.elapsed = started.elapsed();
        info!("took {:.1}s", report.elapsed.as_secs_f64());
        Ok(report)
    }

    pub fn download_all(&self, progress: &dyn ProgressSink) -> Result<DownloadReport, QueueError> {
        let started = Instant::now();
        let links = self.queue.pending()?;
        let mut report = DownloadReport::default();
        if links.is_empty() {
            info!("link queue is empty");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let workers = self.options.workers.clamp(1, links.len());
        for link in &links {
            info!(link = %link, "queueing");
        }
        let pending = Mutex::new(links.into_iter().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let pending = &pending;
                scope.spawn(move || {
                    loop {
                        let next = match pending.lock() {
                            Ok(mut queue) => queue.pop_front(),
                            Err(_) => None,
                        };
                        let Some(link) = next else {
                            break;
                        };
                        if tx.send(self.download_link(&link, progress)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for result in rx {
                finish(&result, progress);
                report.record(&result);
            }
        });

        report.elapsed = started.elapsed();
        info!("took {:.1}s", report.elapsed.as_secs_f64());
        Ok(report)
    }
}

fn finish(result: &LinkReport, progress: &dyn ProgressSink) {
    progress.event(ProgressEvent::ItemFinished {
        title: &result.title,
        link: &result.link,
        outcome: &result.outcome,
    });
}
