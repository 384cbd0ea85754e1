pub mod cli;
pub mod data;
pub mod ingest;
pub mod mapping;
pub mod normalize;
pub mod report;
pub mod store;
pub mod summary;
pub mod table;
pub mod upload;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};
use crate::ingest::IngestionResult;
use crate::store::SpendStore;
use crate::upload::{UploadFile, file_label};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("chemspend", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Detect(args) => handle_detect(&args),
        Commands::Reports(args) => handle_reports(&args),
        Commands::Summary(args) => handle_summary(&args),
    }
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    let db = cli::resolve_db_path(args.db.as_ref());
    info!("Ingesting {} file(s) into {db:?}", args.inputs.len());
    let mut store = SpendStore::open(&db)?;
    let options = ingest::IngestOptions {
        report_type: args.report_type,
        name: args.name.clone(),
        description: args.description.clone(),
        delimiter: args.delimiter,
    };

    let mut failed = 0usize;
    for path in &args.inputs {
        let result = ingest::ingest_path(path, &options, &mut store);
        render_result(&result);
        if !result.succeeded() {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} file(s) failed to ingest", args.inputs.len());
    }
    Ok(())
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    for path in &args.inputs {
        let file_name = file_label(path);
        let bytes =
            fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
        let upload =
            upload::parse_upload(&UploadFile::new(file_name.clone(), bytes), args.delimiter)
                .with_context(|| format!("Parsing {}", path.display()))?;
        let detection = report::detect(&file_name, &upload.headers);
        match detection.report_type {
            Some(report_type) => {
                let matches = detection
                    .scores
                    .iter()
                    .find(|&&(candidate, _)| candidate == report_type)
                    .map(|&(_, count)| count)
                    .unwrap_or(0);
                println!(
                    "{file_name}: {report_type} ({matches} of {} signature column(s))",
                    report_type.signature().len()
                );
            }
            None => {
                let best = detection
                    .scores
                    .iter()
                    .map(|&(_, count)| count)
                    .max()
                    .unwrap_or(0);
                println!(
                    "{file_name}: unrecognized (best overlap {best} column(s), need {})",
                    report::MIN_SIGNATURE_MATCHES
                );
            }
        }
    }
    Ok(())
}

fn handle_reports(args: &cli::ReportsArgs) -> Result<()> {
    let store = SpendStore::open(&cli::resolve_db_path(args.db.as_ref()))?;
    summary::list_reports(&store, args.format)
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let store = SpendStore::open(&cli::resolve_db_path(args.db.as_ref()))?;
    summary::spend_summary(&store, args.by, args.format)
}

const REJECTION_DISPLAY_LIMIT: usize = 20;

fn render_result(result: &IngestionResult) {
    if let Some(failure) = &result.failure {
        println!("{}: failed: {failure}", result.file_name);
    } else if let Some(report_id) = result.report_id {
        let report_type = result
            .report_type
            .map(|ty| ty.to_string())
            .unwrap_or_default();
        let override_note = if result.type_overridden {
            ", type overridden"
        } else {
            ""
        };
        println!(
            "{}: stored as report #{report_id} ({report_type}{override_note}), {} row(s) accepted, {} rejected",
            result.file_name,
            result.accepted,
            result.rejections.len()
        );
    } else {
        println!("{}: nothing stored", result.file_name);
    }

    for rejection in result.rejections.iter().take(REJECTION_DISPLAY_LIMIT) {
        println!("  {rejection}");
    }
    if result.rejections.len() > REJECTION_DISPLAY_LIMIT {
        println!(
            "  ... and {} more rejected row(s)",
            result.rejections.len() - REJECTION_DISPLAY_LIMIT
        );
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
}
