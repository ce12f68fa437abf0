use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AccessDenied,
    AuthenticationRequired,
    Generic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::AccessDenied => write!(f, "access denied"),
            FailureKind::AuthenticationRequired => write!(f, "authentication required"),
            FailureKind::Generic => write!(f, "download failed"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum QueueError {
    #[error("missing required configuration key `{key}` in {path}")]
    #[diagnostic(help("channel configs need both `link` and `target_folder`"))]
    Config { path: PathBuf, key: String },

    #[error("failed to parse TOML config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid playlist entry: {0}")]
    InvalidEntry(String),

    #[error("failed to list new items: {0}")]
    Enumeration(String),

    #[error("{kind}: {message}")]
    Download { kind: FailureKind, message: String },

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install yt-dlp and make sure it is on PATH"))]
    MissingTool(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl QueueError {
    pub fn download(message: impl Into<String>) -> Self {
        let message = message.into();
        QueueError::Download {
            kind: classify_failure(&message),
            message,
        }
    }
}

pub fn classify_failure(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    if message.contains("403") || message.contains("Forbidden") {
        FailureKind::AccessDenied
    } else if lowered.contains("sign in") || lowered.contains("bot") {
        FailureKind::AuthenticationRequired
    } else {
        FailureKind::Generic
    }
}
