use std::io::{self, Write};

use serde::Serialize;

use crate::download::DownloadReport;
use crate::fetch::{ChannelResult, FetchSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Interactive }
    }
}

#[derive(Debug, Serialize)]
pub struct FetchOutput<'a> {
    pub summary: &'a FetchSummary,
    pub channels: &'a [ChannelResult],
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(summary: &FetchSummary, channels: &[ChannelResult]) -> io::Result<()> {
        Self::print_json(&FetchOutput { summary, channels })
    }

    pub fn print_report(report: &DownloadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
