pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod output;
pub mod progress;
pub mod retry;
pub mod source;
pub mod store;
pub mod ytdlp;
