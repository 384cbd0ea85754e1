//! Ingestion pipeline: one uploaded file in, one result out.
//!
//! The pipeline runs reader, detector, mapper, normalizer, and the
//! persistence collaborator in order, and never lets a failure escape as
//! control flow. Whatever goes wrong (unreadable bytes, an unrecognized
//! layout, a broken store) is captured in the [`IngestionResult`] for the
//! caller to render.

use std::fs;
use std::path::Path;

use chrono::Local;
use log::{info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::mapping::ColumnPlan;
use crate::normalize::{self, RowCoercionFailure};
use crate::report::{self, MIN_SIGNATURE_MATCHES, ReportType};
use crate::store::{NewReport, SpendWriter};
use crate::upload::{UploadFile, file_label, parse_upload};

/// Whole-file failure kinds. Per-row problems are [`RowCoercionFailure`]s
/// on the result and never fail the file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(
        "no known report signature matches the header row \
         (best overlap {best_overlap} column(s), need {needed})"
    )]
    UnrecognizedReportType { best_overlap: usize, needed: usize },
    #[error("none of the columns belong to a {report_type} report")]
    UnmappableSchema { report_type: ReportType },
    #[error("could not read upload: {0:#}")]
    UnreadableUpload(anyhow::Error),
    #[error("could not store report: {0:#}")]
    PersistenceFailure(anyhow::Error),
}

/// Outcome of ingesting one file. A set `failure` means nothing was stored;
/// warnings and row rejections can accompany a stored report.
#[derive(Debug)]
pub struct IngestionResult {
    pub file_name: String,
    pub report_type: Option<ReportType>,
    pub type_overridden: bool,
    pub report_id: Option<i64>,
    pub accepted: usize,
    pub rejections: Vec<RowCoercionFailure>,
    pub warnings: Vec<String>,
    pub failure: Option<IngestError>,
}

impl IngestionResult {
    fn new(file_name: &str) -> IngestionResult {
        IngestionResult {
            file_name: file_name.to_string(),
            report_type: None,
            type_overridden: false,
            report_id: None,
            accepted: 0,
            rejections: Vec::new(),
            warnings: Vec::new(),
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Caller-supplied knobs for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Skips detection when set; recorded on the result.
    pub report_type: Option<ReportType>,
    /// Display name for the stored report. Defaults to the file stem.
    pub name: Option<String>,
    pub description: Option<String>,
    /// Forced text delimiter; probed per file when unset.
    pub delimiter: Option<u8>,
}

pub fn ingest_path(
    path: &Path,
    options: &IngestOptions,
    writer: &mut dyn SpendWriter,
) -> IngestionResult {
    let file_name = file_label(path);
    match fs::read(path) {
        Ok(bytes) => ingest_bytes(&file_name, bytes, options, writer),
        Err(err) => {
            let mut result = IngestionResult::new(&file_name);
            result.failure = Some(IngestError::UnreadableUpload(
                anyhow::Error::new(err).context(format!("Reading {}", path.display())),
            ));
            result
        }
    }
}

pub fn ingest_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    options: &IngestOptions,
    writer: &mut dyn SpendWriter,
) -> IngestionResult {
    let mut result = IngestionResult::new(file_name);
    let fingerprint = fingerprint(&bytes);

    let upload = match parse_upload(&UploadFile::new(file_name, bytes), options.delimiter) {
        Ok(upload) => upload,
        Err(err) => {
            result.failure = Some(IngestError::UnreadableUpload(err));
            return result;
        }
    };

    let report_type = match options.report_type {
        Some(overridden) => {
            result.type_overridden = true;
            overridden
        }
        None => {
            let detection = report::detect(file_name, &upload.headers);
            match detection.report_type {
                Some(detected) => detected,
                None => {
                    let best_overlap = detection
                        .scores
                        .iter()
                        .map(|&(_, matches)| matches)
                        .max()
                        .unwrap_or(0);
                    result.failure = Some(IngestError::UnrecognizedReportType {
                        best_overlap,
                        needed: MIN_SIGNATURE_MATCHES,
                    });
                    return result;
                }
            }
        }
    };
    result.report_type = Some(report_type);

    let plan = ColumnPlan::resolve(report_type, &upload.headers);
    if plan.is_unmappable() {
        result.failure = Some(IngestError::UnmappableSchema { report_type });
        return result;
    }

    if upload.rows.is_empty() {
        result
            .warnings
            .push("the file has a header row but no data rows; nothing was stored".to_string());
        return result;
    }

    let normalized = normalize::normalize_with_plan(&upload, report_type, &plan);
    result.warnings.extend(normalized.warnings);
    result.rejections = normalized.rejections;

    if normalized.rows.is_empty() {
        result.warnings.push(format!(
            "all {} data row(s) were rejected; nothing was stored",
            result.rejections.len()
        ));
        return result;
    }

    match writer.find_duplicate(&fingerprint) {
        Ok(Some(earlier)) => {
            warn!(
                "'{file_name}' has the same content as report #{} '{}'",
                earlier.id, earlier.name
            );
            result.warnings.push(format!(
                "identical content was already ingested as report #{} '{}' on {}",
                earlier.id, earlier.name, earlier.uploaded_at
            ));
        }
        Ok(None) => {}
        Err(err) => {
            result.failure = Some(IngestError::PersistenceFailure(err));
            return result;
        }
    }

    let name = options
        .name
        .clone()
        .unwrap_or_else(|| report_name(file_name));
    let meta = NewReport {
        name: &name,
        original_filename: file_name,
        report_type,
        uploaded_at: Local::now().naive_local(),
        fingerprint: &fingerprint,
        description: options.description.as_deref(),
    };
    match writer.persist(&meta, &normalized.rows) {
        Ok(report_id) => {
            result.report_id = Some(report_id);
            result.accepted = normalized.rows.len();
            info!(
                "Ingested '{file_name}' as report #{report_id}: {} row(s) stored, {} rejected",
                result.accepted,
                result.rejections.len()
            );
        }
        Err(err) => {
            result.failure = Some(IngestError::PersistenceFailure(err));
        }
    }
    result
}

fn report_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
