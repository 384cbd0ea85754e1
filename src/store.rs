//! SQLite persistence for ingested reports and their spend lines.
//!
//! Money lands as exact decimal strings and dates as ISO `%Y-%m-%d` text, so
//! aggregation reads values back through [`Decimal`] instead of trusting
//! SQLite's float arithmetic. Each upload is written in one transaction:
//! the metadata row and every spend line land together or not at all.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use log::info;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::normalize::CanonicalRow;
use crate::report::ReportType;

/// Persistence collaborator seam for the ingestion pipeline. The SQLite
/// store is the production implementation; tests substitute their own.
pub trait SpendWriter {
    /// Writes one upload atomically, returning the stored report id.
    fn persist(&mut self, report: &NewReport<'_>, rows: &[CanonicalRow]) -> Result<i64>;

    /// Looks up an earlier upload with the same content fingerprint.
    fn find_duplicate(&self, fingerprint: &str) -> Result<Option<ReportRecord>>;
}

/// Metadata for an upload about to be persisted.
#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub name: &'a str,
    pub original_filename: &'a str,
    pub report_type: ReportType,
    pub uploaded_at: NaiveDateTime,
    pub fingerprint: &'a str,
    pub description: Option<&'a str>,
}

/// One stored upload, as listed back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    pub id: i64,
    pub name: String,
    pub original_filename: String,
    pub report_type: String,
    pub uploaded_at: String,
    pub record_count: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpendTotals {
    pub report_count: i64,
    pub line_count: i64,
    pub supplier_count: i64,
    pub total_spend: Decimal,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// One row of a grouped spend summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpendGroup {
    pub key: String,
    pub line_count: i64,
    pub total_spend: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryGroup {
    Supplier,
    Region,
    Month,
    PoType,
}

impl SummaryGroup {
    pub fn label(&self) -> &'static str {
        match self {
            SummaryGroup::Supplier => "supplier",
            SummaryGroup::Region => "region",
            SummaryGroup::Month => "month",
            SummaryGroup::PoType => "po type",
        }
    }

    fn key_expr(&self) -> &'static str {
        match self {
            SummaryGroup::Supplier => "supplier",
            SummaryGroup::Region => "region",
            SummaryGroup::Month => "substr(spend_date, 1, 7)",
            SummaryGroup::PoType => "po_type",
        }
    }
}

pub struct SpendStore {
    conn: Connection,
}

impl SpendStore {
    pub fn open(path: &Path) -> Result<SpendStore> {
        let conn = Connection::open(path)
            .with_context(|| format!("Opening spend database {path:?}"))?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<SpendStore> {
        Self::from_connection(Connection::open_in_memory().context("Opening in-memory database")?)
    }

    fn from_connection(conn: Connection) -> Result<SpendStore> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                report_type TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                description TEXT
            )",
            [],
        )
        .context("Creating reports table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS spend_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL REFERENCES reports(id),
                supplier TEXT NOT NULL,
                item_number TEXT,
                description TEXT NOT NULL,
                order_id TEXT,
                spend TEXT NOT NULL,
                spend_date TEXT NOT NULL,
                region TEXT NOT NULL,
                quantity TEXT NOT NULL,
                unit TEXT NOT NULL,
                unit_price TEXT,
                po_type TEXT NOT NULL,
                extras TEXT NOT NULL
            )",
            [],
        )
        .context("Creating spend_lines table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_spend_lines_report ON spend_lines(report_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_spend_lines_supplier ON spend_lines(supplier)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reports_fingerprint ON reports(fingerprint)",
            [],
        )?;

        Ok(SpendStore { conn })
    }

    pub fn save_report(&mut self, report: &NewReport<'_>, rows: &[CanonicalRow]) -> Result<i64> {
        let tx = self
            .conn
            .transaction()
            .context("Starting upload transaction")?;

        tx.execute(
            "INSERT INTO reports
                (name, original_filename, report_type, uploaded_at, record_count, fingerprint, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                report.name,
                report.original_filename,
                report.report_type.slug(),
                report.uploaded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                rows.len() as i64,
                report.fingerprint,
                report.description,
            ],
        )
        .context("Inserting report metadata")?;
        let report_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO spend_lines
                        (report_id, supplier, item_number, description, order_id, spend,
                         spend_date, region, quantity, unit, unit_price, po_type, extras)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .context("Preparing spend line insert")?;
            for row in rows {
                let extras = serde_json::to_string(&row.extras)
                    .context("Encoding passthrough columns")?;
                stmt.execute(params![
                    report_id,
                    row.supplier,
                    row.item_number,
                    row.description,
                    row.order_id,
                    row.spend.to_string(),
                    row.date.format("%Y-%m-%d").to_string(),
                    row.region,
                    row.quantity.to_string(),
                    row.unit,
                    row.unit_price.as_ref().map(Decimal::to_string),
                    row.po_type,
                    extras,
                ])
                .context("Inserting spend line")?;
            }
        }

        tx.commit().context("Committing upload transaction")?;
        info!(
            "Stored report #{report_id} '{}' with {} spend line(s)",
            report.name,
            rows.len()
        );
        Ok(report_id)
    }

    /// Stored uploads, newest first.
    pub fn list_reports(&self) -> Result<Vec<ReportRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, original_filename, report_type, uploaded_at, record_count, description
                 FROM reports
                 ORDER BY id DESC",
            )
            .context("Preparing report listing")?;
        let records = stmt
            .query_map([], row_to_report)
            .context("Listing reports")?;
        records.collect::<rusqlite::Result<Vec<_>>>().context("Reading report rows")
    }

    pub fn find_report_by_fingerprint(&self, fingerprint: &str) -> Result<Option<ReportRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, original_filename, report_type, uploaded_at, record_count, description
                 FROM reports
                 WHERE fingerprint = ?1
                 ORDER BY id
                 LIMIT 1",
            )
            .context("Preparing fingerprint lookup")?;
        let mut rows = stmt
            .query(params![fingerprint])
            .context("Querying fingerprint")?;
        match rows.next().context("Reading fingerprint row")? {
            Some(row) => Ok(Some(row_to_report(row).context("Decoding report row")?)),
            None => Ok(None),
        }
    }

    pub fn totals(&self) -> Result<SpendTotals> {
        let report_count = self
            .conn
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))
            .context("Counting reports")?;
        let (line_count, supplier_count, first, last) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT supplier), MIN(spend_date), MAX(spend_date)
                 FROM spend_lines",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .context("Reading spend totals")?;

        let mut stmt = self
            .conn
            .prepare("SELECT spend FROM spend_lines")
            .context("Preparing spend scan")?;
        let mut total_spend = Decimal::ZERO;
        let amounts = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Scanning spend amounts")?;
        for amount in amounts {
            let amount = amount.context("Reading spend amount")?;
            total_spend += parse_stored_decimal(&amount)?;
        }

        Ok(SpendTotals {
            report_count,
            line_count,
            supplier_count,
            total_spend,
            first_date: first.as_deref().map(parse_stored_date).transpose()?,
            last_date: last.as_deref().map(parse_stored_date).transpose()?,
        })
    }

    /// Spend grouped by the chosen key, largest spend first.
    pub fn spend_by(&self, group: SummaryGroup) -> Result<Vec<SpendGroup>> {
        let sql = format!(
            "SELECT {} AS grouping_key, spend FROM spend_lines",
            group.key_expr()
        );
        let mut stmt = self.conn.prepare(&sql).context("Preparing spend summary")?;
        let pairs = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("Scanning spend lines")?;

        let mut groups: BTreeMap<String, (i64, Decimal)> = BTreeMap::new();
        for pair in pairs {
            let (key, amount) = pair.context("Reading spend line")?;
            let amount = parse_stored_decimal(&amount)?;
            let entry = groups.entry(key).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += amount;
        }

        let mut out: Vec<SpendGroup> = groups
            .into_iter()
            .map(|(key, (line_count, total_spend))| SpendGroup {
                key,
                line_count,
                total_spend,
            })
            .collect();
        out.sort_by(|a, b| {
            b.total_spend
                .cmp(&a.total_spend)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(out)
    }
}

impl SpendWriter for SpendStore {
    fn persist(&mut self, report: &NewReport<'_>, rows: &[CanonicalRow]) -> Result<i64> {
        self.save_report(report, rows)
    }

    fn find_duplicate(&self, fingerprint: &str) -> Result<Option<ReportRecord>> {
        self.find_report_by_fingerprint(fingerprint)
    }
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRecord> {
    Ok(ReportRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        original_filename: row.get(2)?,
        report_type: row.get(3)?,
        uploaded_at: row.get(4)?,
        record_count: row.get(5)?,
        description: row.get(6)?,
    })
}

fn parse_stored_decimal(value: &str) -> Result<Decimal> {
    value
        .parse()
        .with_context(|| format!("Stored spend '{value}' is not a decimal"))
}

fn parse_stored_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Stored date '{value}' is not ISO formatted"))
}
