use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Serialize, Serializer};
use tracing::{error, info, warn};

use crate::config::{ChannelConfig, QueueConfig};
use crate::domain::WorkItem;
use crate::error::QueueError;
use crate::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::source::{self, PlaylistClient};
use crate::store::LinkQueue;

pub const DEFAULT_FETCH_WORKERS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_FETCH_WORKERS,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelResult {
    pub channel_name: String,
    pub config_ref: Utf8PathBuf,
    pub new_item_count: usize,
    pub success: bool,
    pub error: Option<String>,
    pub retry_count: u32,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedChannel {
    pub channel_name: String,
    pub config_ref: Utf8PathBuf,
    pub error: Option<String>,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSummary {
    pub total_channels: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_new_items: usize,
    pub total_retries: u32,
    pub failed_channel_details: Vec<FailedChannel>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed_time: Duration,
}

impl FetchSummary {
    pub fn from_results(results: &[ChannelResult], elapsed_time: Duration) -> Self {
        let successful = results.iter().filter(|result| result.success).count();
        let failed_channel_details = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| FailedChannel {
                channel_name: result.channel_name.clone(),
                config_ref: result.config_ref.clone(),
                error: result.error.clone(),
                retry_count: result.retry_count,
            })
            .collect();
        Self {
            total_channels: results.len(),
            successful,
            failed: results.len() - successful,
            total_new_items: results.iter().map(|result| result.new_item_count).sum(),
            total_retries: results.iter().map(|result| result.retry_count).sum(),
            failed_channel_details,
            elapsed_time,
        }
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Cooperative stop flag shared with whoever may want to end a run early.
/// In-flight attempts are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ParallelFetcher<C, S = ThreadSleeper> {
    config: QueueConfig,
    queue: LinkQueue,
    client: C,
    sleeper: S,
    options: FetchOptions,
    shutdown: ShutdownHandle,
    elapsed: Mutex<Duration>,
}

impl<C: PlaylistClient> ParallelFetcher<C> {
    pub fn new(config: QueueConfig, client: C, options: FetchOptions) -> Self {
        Self {
            queue: LinkQueue::new(config.link_queue_dir.clone()),
            config,
            client,
            sleeper: ThreadSleeper,
            options,
            shutdown: ShutdownHandle::default(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }
}

impl<C: PlaylistClient, S: Sleeper> ParallelFetcher<C, S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> ParallelFetcher<C, T> {
        ParallelFetcher {
            config: self.config,
            queue: self.queue,
            client: self.client,
            sleeper,
            options: self.options,
            shutdown: self.shutdown,
            elapsed: self.elapsed,
        }
    }

    pub fn options(&self) -> FetchOptions {
        self.options
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request();
        info!("shutdown requested; finishing channels already in progress");
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn get_channel_configs(&self) -> Result<Vec<Utf8PathBuf>, QueueError> {
        self.config.channel_configs()
    }

    pub fn fetch_all(&self, progress: &dyn ProgressSink) -> Result<Vec<ChannelResult>, QueueError> {
        let started = Instant::now();
        self.config.ensure_dirs()?;
        let channels = self.get_channel_configs()?;
        let mut results = Vec::with_capacity(channels.len());

        if channels.is_empty() {
            info!("no channel configurations found");
            self.record_elapsed(started.elapsed());
            return Ok(results);
        }

        let workers = self.options.workers.clamp(1, channels.len());
        info!(channels = channels.len(), workers, "fetching links");
        let pending = Mutex::new(channels.into_iter().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let pending = &pending;
                scope.spawn(move || {
                    while !self.shutdown.is_requested() {
                        let next = match pending.lock() {
                            Ok(mut queue) => queue.pop_front(),
                            Err(_) => None,
                        };
                        let Some(config_path) = next else {
                            break;
                        };
                        if let Some(result) = self.process_channel(&config_path, progress) {
                            if tx.send(result).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
            drop(tx);

            for result in rx {
                progress.event(ProgressEvent::ChannelFinished(&result));
                results.push(result);
            }
        });

        self.record_elapsed(started.elapsed());
        Ok(results)
    }

    pub fn get_summary(&self, results: &[ChannelResult]) -> FetchSummary {
        FetchSummary::from_results(results, self.elapsed())
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|elapsed| *elapsed).unwrap_or_default()
    }

    pub fn write_links(&self, config_path: &Utf8Path) -> Result<usize, QueueError> {
        let mut channel_name = channel_stem(config_path);
        self.attempt(config_path, 0, &mut channel_name, &NoProgress)
    }

    fn record_elapsed(&self, elapsed: Duration) {
        if let Ok(mut slot) = self.elapsed.lock() {
            *slot = elapsed;
        }
    }

    fn process_channel(
        &self,
        config_path: &Utf8Path,
        progress: &dyn ProgressSink,
    ) -> Option<ChannelResult> {
        let started = Instant::now();
        let policy = self.options.retry;
        let mut channel_name = channel_stem(config_path);
        let mut last_error: Option<String> = None;
        let mut retry_count = 0;

        for attempt in 0..policy.total_attempts() {
            if self.shutdown.is_requested() {
                if attempt == 0 {
                    info!(channel = %channel_name, "shutdown requested; channel skipped");
                    return None;
                }
                warn!(channel = %channel_name, "shutdown requested; giving up on retries");
                last_error = last_error.map(|err| format!("{err} (retries abandoned on shutdown)"));
                break;
            }

            match self.attempt(config_path, attempt, &mut channel_name, progress) {
                Ok(new_item_count) => {
                    let duration = started.elapsed();
                    info!(
                        channel = %channel_name,
                        new_item_count,
                        retry_count,
                        duration_secs = duration.as_secs_f64(),
                        "channel done"
                    );
                    return Some(ChannelResult {
                        channel_name,
                        config_ref: config_path.to_path_buf(),
                        new_item_count,
                        success: true,
                        error: None,
                        retry_count,
                        duration,
                    });
                }
                Err(err) => {
                    retry_count = attempt + 1;
                    match policy.delay_after(attempt) {
                        Some(delay) => {
                            warn!(
                                channel = %channel_name,
                                "failed (attempt {}/{}): {err}. Retrying in {:.1}s",
                                attempt + 1,
                                policy.total_attempts(),
                                delay.as_secs_f64()
                            );
                            self.sleeper.sleep(delay);
                        }
                        None => {
                            error!(
                                channel = %channel_name,
                                "failed after {} attempts: {err}",
                                policy.total_attempts()
                            );
                        }
                    }
                    last_error = Some(err.to_string());
                }
            }
        }

        Some(ChannelResult {
            channel_name,
            config_ref: config_path.to_path_buf(),
            new_item_count: 0,
            success: false,
            error: last_error,
            retry_count,
            duration: started.elapsed(),
        })
    }

    fn attempt(
        &self,
        config_path: &Utf8Path,
        attempt: u32,
        channel_name: &mut String,
        progress: &dyn ProgressSink,
    ) -> Result<usize, QueueError> {
        let mut channel = ChannelConfig::load(config_path)?;
        *channel_name = channel.label_or(&channel_stem(config_path)).to_string();
        progress.event(ProgressEvent::ChannelAttempt {
            channel: channel_name.as_str(),
            config: config_path,
            attempt,
        });

        let target = self.config.target_dir.join(&channel.target_folder);
        fs::create_dir_all(target.as_std_path())
            .map_err(|err| QueueError::Filesystem(format!("create {target}: {err}")))?;
        self.queue.ensure_root()?;

        let descriptors = source::new_items(&self.client, &channel.source_url, &channel.cursor())
            .map_err(|err| match err {
                QueueError::Enumeration(message) => QueueError::Enumeration(message),
                other => QueueError::Enumeration(other.to_string()),
            })?;
        let count = descriptors.len();

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let item = WorkItem::from_descriptor(
                descriptor,
                index,
                &channel.target_folder,
                channel.max_height,
            );
            self.queue.enqueue(&item)?;
            channel.record_queued(&item.id);
            channel.save(config_path)?;
            info!("new item from {channel_name}: {}", item.title);
        }

        Ok(count)
    }
}

fn channel_stem(config_path: &Utf8Path) -> String {
    config_path
        .file_stem()
        .unwrap_or(config_path.as_str())
        .to_string()
}
