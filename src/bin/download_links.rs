use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidqueue::config::{DEFAULT_CONFIG_FILE, QueueConfig};
use vidqueue::download::{DEFAULT_DOWNLOAD_WORKERS, DownloadOptions, LinkDownloader};
use vidqueue::error::QueueError;
use vidqueue::output::{JsonOutput, OutputMode};
use vidqueue::progress::create_progress;
use vidqueue::ytdlp::{TOOL_NAME, ToolStatus, YtDlpClient};

#[derive(Parser)]
#[command(name = "download-links")]
#[command(about = "Download every queued link file")]
#[command(version)]
struct Cli {
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: Utf8PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_DOWNLOAD_WORKERS)]
    workers: usize,

    #[arg(long)]
    sequential: bool,

    #[arg(short, long)]
    quiet: bool,

    #[arg(long)]
    retry_broken: bool,

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
    config.ensure_dirs()?;
    let options = DownloadOptions {
        workers: cli.workers,
        ..DownloadOptions::default()
    };
    let downloader = LinkDownloader::from_config(&config, client, options);

    if cli.retry_broken {
        let requeued = downloader.queue().requeue_broken()?;
        info!(count = requeued.len(), "moved broken links back into the queue");
    }

    let total = downloader.queue().pending()?.len();
    let progress = create_progress(total, quiet);
    progress.set_title("Downloading");
    let report = if cli.sequential {
        downloader.download_all_sequential(&progress)?
    } else {
        downloader.download_all(&progress)?
    };
    progress.finish();

    info!(
        downloaded = report.completed + report.completed_unknown_path,
        broken = report.broken.len(),
        "download finished"
    );
    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Interactive => progress.print_report(&report),
    }
    Ok(())
}
