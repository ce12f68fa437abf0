use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidqueue::config::{DEFAULT_CONFIG_FILE, QueueConfig};
use vidqueue::error::QueueError;
use vidqueue::fetch::{DEFAULT_FETCH_WORKERS, FetchOptions, ParallelFetcher};
use vidqueue::output::{JsonOutput, OutputMode};
use vidqueue::progress::create_progress;
use vidqueue::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy};
use vidqueue::ytdlp::{TOOL_NAME, ToolStatus, YtDlpClient};

#[derive(Parser)]
#[command(name = "fetch-links")]
#[command(about = "Queue new videos from every configured channel as link files")]
#[command(version)]
struct Cli {
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: Utf8PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_FETCH_WORKERS)]
    workers: usize,

    #[arg(short, long)]
    quiet: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<QueueError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &QueueError) -> u8 {
    match error {
        QueueError::Config { .. }
        | QueueError::ConfigParse { .. }
        | QueueError::NotFound(_)
        | QueueError::InvalidOption(_) => 2,
        QueueError::MissingTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = OutputMode::from_flag(cli.json);
    let quiet = cli.quiet || output_mode == OutputMode::Json;
    let level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.workers == 0 {
        return Err(QueueError::InvalidOption("--workers must be at least 1".to_string()).into());
    }

    let client = YtDlpClient::new();
    if let ToolStatus::Missing { message } = client.tool_status() {
        tracing::error!("{message}");
        return Err(QueueError::MissingTool(TOOL_NAME.to_string()).into());
    }

    let config = QueueConfig::load(&cli.config)?;
    let options = FetchOptions {
        workers: cli.workers,
        retry: RetryPolicy {
            max_retries: cli.max_retries,
            base_delay: DEFAULT_RETRY_DELAY,
        },
    };
    let fetcher = ParallelFetcher::new(config, client, options);

    let total = fetcher.get_channel_configs()?.len();
    let progress = create_progress(total, quiet);
    progress.set_title("Fetching links");
    let results = fetcher.fetch_all(&progress)?;
    progress.finish();

    let summary = fetcher.get_summary(&results);
    info!(
        channels = summary.total_channels,
        failed = summary.failed,
        queued = summary.total_new_items,
        "fetch finished"
    );
    match output_mode {
        OutputMode::Json => JsonOutput::print_fetch(&summary, &results).into_diagnostic()?,
        OutputMode::Interactive => progress.print_summary(&summary),
    }
    Ok(())
}
