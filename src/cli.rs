use std::env;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::report::ReportType;
use crate::store::SummaryGroup;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Ingest chemical spend reports into a queryable store",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest one or more report files into the spend database
    Ingest(IngestArgs),
    /// Detect the report type of files without storing anything
    Detect(DetectArgs),
    /// List stored reports
    Reports(ReportsArgs),
    /// Summarize stored spend, overall or grouped
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// One or more report files (.csv, .txt, .xlsx, .xls)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Spend database file (defaults to $CHEMSPEND_DB, then chemspend.db)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Report type to assume, skipping detection
    #[arg(long = "report-type", value_enum)]
    pub report_type: Option<ReportType>,
    /// Display name for the stored report (defaults to the file stem)
    #[arg(long)]
    pub name: Option<String>,
    /// Free-form description stored with the report
    #[arg(long)]
    pub description: Option<String>,
    /// Text delimiter character (supports ',', 'tab', ';', '|'); probed per
    /// file when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// One or more report files to classify
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Text delimiter character (supports ',', 'tab', ';', '|'); probed per
    /// file when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ReportsArgs {
    /// Spend database file (defaults to $CHEMSPEND_DB, then chemspend.db)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Output rendering
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Spend database file (defaults to $CHEMSPEND_DB, then chemspend.db)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Group totals by this key instead of printing the overall summary
    #[arg(long = "by", value_enum)]
    pub by: Option<SummaryGroup>,
    /// Output rendering
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Table
    }
}

/// Database path precedence: `--db`, then `CHEMSPEND_DB`, then the default.
pub fn resolve_db_path(explicit: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path.clone();
    }
    if let Some(value) = env::var_os("CHEMSPEND_DB") {
        return PathBuf::from(value);
    }
    PathBuf::from("chemspend.db")
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
