//! Stored-report listings and spend summaries.

use anyhow::{Context, Result};
use log::info;

use crate::cli::OutputFormat;
use crate::data::display_money;
use crate::report::ReportType;
use crate::store::{SpendStore, SummaryGroup};
use crate::table::{self, Align};

pub fn list_reports(store: &SpendStore, format: OutputFormat) -> Result<()> {
    let reports = store.list_reports()?;
    if format == OutputFormat::Json {
        println!("{}", to_json(&reports)?);
        return Ok(());
    }
    if reports.is_empty() {
        println!("No reports stored yet.");
        return Ok(());
    }

    let headers = ["id", "name", "type", "uploaded", "rows"]
        .map(String::from)
        .to_vec();
    let aligns = [
        Align::Right,
        Align::Left,
        Align::Left,
        Align::Left,
        Align::Right,
    ];
    let rows = reports
        .iter()
        .map(|report| {
            vec![
                report.id.to_string(),
                report.name.clone(),
                type_display(&report.report_type),
                report.uploaded_at.clone(),
                report.record_count.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &aligns, &rows);
    info!("Listed {} report(s)", reports.len());
    Ok(())
}

pub fn spend_summary(
    store: &SpendStore,
    group: Option<SummaryGroup>,
    format: OutputFormat,
) -> Result<()> {
    match group {
        Some(group) => grouped_summary(store, group, format),
        None => overall_summary(store, format),
    }
}

fn overall_summary(store: &SpendStore, format: OutputFormat) -> Result<()> {
    let totals = store.totals()?;
    if format == OutputFormat::Json {
        println!("{}", to_json(&totals)?);
        return Ok(());
    }
    if totals.line_count == 0 {
        println!("No spend lines stored yet.");
        return Ok(());
    }

    println!("reports:      {}", totals.report_count);
    println!("spend lines:  {}", totals.line_count);
    println!("suppliers:    {}", totals.supplier_count);
    println!("total spend:  {}", display_money(&totals.total_spend));
    if let (Some(first), Some(last)) = (totals.first_date, totals.last_date) {
        println!("date range:   {first} to {last}");
    }
    Ok(())
}

fn grouped_summary(store: &SpendStore, group: SummaryGroup, format: OutputFormat) -> Result<()> {
    let groups = store.spend_by(group)?;
    if format == OutputFormat::Json {
        println!("{}", to_json(&groups)?);
        return Ok(());
    }
    if groups.is_empty() {
        println!("No spend lines stored yet.");
        return Ok(());
    }

    let headers = [group.label(), "rows", "total spend"]
        .map(String::from)
        .to_vec();
    let aligns = [Align::Left, Align::Right, Align::Right];
    let rows = groups
        .iter()
        .map(|entry| {
            vec![
                entry.key.clone(),
                entry.line_count.to_string(),
                display_money(&entry.total_spend),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &aligns, &rows);
    info!(
        "Summarized spend across {} {} group(s)",
        groups.len(),
        group.label()
    );
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Encoding output as JSON")
}

fn type_display(slug: &str) -> String {
    ReportType::from_slug(slug)
        .map(|ty| ty.to_string())
        .unwrap_or_else(|| slug.to_string())
}
