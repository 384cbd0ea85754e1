//! Schema normalization: raw upload rows into canonical spend lines.
//!
//! Every cell goes through an explicit typed parse with a success/failure
//! outcome. A row missing its required fields (spend amount, date) is
//! rejected with a reason naming the field and file line, never silently
//! skipped; remaining rows are unaffected. Emitted rows always satisfy the
//! canonical invariants: spend is non-negative and the date is a valid
//! calendar date.

use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::{parse_money, parse_quantity, parse_report_date};
use crate::mapping::{CanonicalField, ColumnPlan};
use crate::report::ReportType;
use crate::upload::RawUpload;

/// A spend line in the unified schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    pub supplier: String,
    pub item_number: Option<String>,
    pub description: String,
    pub order_id: Option<String>,
    pub spend: Decimal,
    pub date: NaiveDate,
    pub region: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Option<Decimal>,
    pub po_type: String,
    /// Source columns that mapped to no canonical field, in header order.
    pub extras: Vec<(String, String)>,
}

/// One rejected row: the 1-based file line (header is line 1) and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {line}: {reason}")]
pub struct RowCoercionFailure {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    pub rejections: Vec<RowCoercionFailure>,
    pub warnings: Vec<String>,
}

/// Normalizes an upload under the given report type. Pure: the same input
/// always produces the same rows, rejections, and warnings.
pub fn normalize(upload: &RawUpload, report_type: ReportType) -> Normalized {
    let plan = ColumnPlan::resolve(report_type, &upload.headers);
    normalize_with_plan(upload, report_type, &plan)
}

pub fn normalize_with_plan(
    upload: &RawUpload,
    report_type: ReportType,
    plan: &ColumnPlan,
) -> Normalized {
    let mut normalized = Normalized::default();
    let mut unknown_suppliers = 0usize;

    for (ordinal, row) in upload.rows.iter().enumerate() {
        let line = ordinal + 2;
        match normalize_row(row, report_type, plan, &upload.headers) {
            Ok(row) => {
                if row.supplier == UNKNOWN_SUPPLIER {
                    unknown_suppliers += 1;
                }
                normalized.rows.push(row);
            }
            Err(reason) => {
                debug!("'{}' line {line} rejected: {reason}", upload.file_name);
                normalized
                    .rejections
                    .push(RowCoercionFailure { line, reason });
            }
        }
    }

    if unknown_suppliers > 0 {
        warn!(
            "'{}': {unknown_suppliers} row(s) without a supplier name",
            upload.file_name
        );
        normalized.warnings.push(format!(
            "{unknown_suppliers} row(s) had no supplier name and were recorded as '{UNKNOWN_SUPPLIER}'"
        ));
    }

    normalized
}

const UNKNOWN_SUPPLIER: &str = "Unknown Supplier";
const UNKNOWN_ITEM: &str = "Unknown Item";
const UNKNOWN_REGION: &str = "Unknown";

fn normalize_row(
    row: &[String],
    report_type: ReportType,
    plan: &ColumnPlan,
    headers: &[String],
) -> Result<CanonicalRow, String> {
    let cell = |field: CanonicalField| -> &str {
        plan.column(field)
            .map(|idx| row[idx].trim())
            .unwrap_or("")
    };

    let raw_date = cell(CanonicalField::Date);
    let date = match parse_report_date(raw_date) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return Err("missing required date".to_string()),
        Err(_) => return Err(format!("invalid date '{raw_date}'")),
    };

    let raw_quantity = cell(CanonicalField::Quantity);
    let quantity = parse_quantity(raw_quantity)
        .map_err(|_| format!("invalid quantity '{raw_quantity}'"))?;

    let raw_price = cell(CanonicalField::UnitPrice);
    let unit_price =
        parse_money(raw_price).map_err(|_| format!("invalid unit price '{raw_price}'"))?;

    let spend = match plan.column(CanonicalField::Spend) {
        Some(idx) => {
            let raw = row[idx].trim();
            match parse_money(raw) {
                Ok(Some(amount)) => amount,
                Ok(None) => return Err("missing required spend amount".to_string()),
                Err(_) => return Err(format!("invalid spend amount '{raw}'")),
            }
        }
        // No direct spend column: derived from quantity and unit price,
        // which become required inputs.
        None => {
            let quantity =
                quantity.ok_or_else(|| "missing quantity for spend derivation".to_string())?;
            let unit_price =
                unit_price.ok_or_else(|| "missing unit price for spend derivation".to_string())?;
            quantity
                .checked_mul(unit_price)
                .ok_or_else(|| format!("derived spend overflows ({quantity} x {unit_price})"))?
        }
    };
    if spend < Decimal::ZERO {
        return Err(format!("negative spend {spend} (credit)"));
    }

    let supplier = match cell(CanonicalField::Supplier) {
        "" => UNKNOWN_SUPPLIER.to_string(),
        value => value.to_string(),
    };
    // Blank descriptions take the category column's value before falling
    // back to the unknown-item label.
    let description = match cell(CanonicalField::Description) {
        "" => plan
            .description_fallback()
            .map(|idx| row[idx].trim())
            .filter(|category| !category.is_empty())
            .unwrap_or(UNKNOWN_ITEM)
            .to_string(),
        value => value.to_string(),
    };
    let item_number = optional(cell(CanonicalField::ItemNumber));
    let order_id = optional(cell(CanonicalField::OrderId));
    let unit = match cell(CanonicalField::Unit) {
        "" => "unit".to_string(),
        value => value.to_string(),
    };

    let extras = plan
        .extras()
        .iter()
        .map(|&idx| (headers[idx].clone(), row[idx].clone()))
        .collect();

    Ok(CanonicalRow {
        supplier,
        item_number,
        description,
        order_id,
        spend,
        date,
        region: consolidate_region(cell(CanonicalField::Region)),
        quantity: quantity.unwrap_or(Decimal::ONE),
        unit,
        unit_price,
        po_type: normalize_po_type(cell(CanonicalField::PoType), report_type),
        extras,
    })
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Collapses a raw region or buyer-reference value to one of the main
/// regions where possible. Sub-region forms like "Mid-Atlantic : Bristol"
/// keep the part before the colon; buyer references carrying an email
/// address are stripped to the name part first.
pub fn consolidate_region(raw: &str) -> String {
    let cleaned = strip_region_email(raw.trim());
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return UNKNOWN_REGION.to_string();
    }

    if let Some((main, _)) = cleaned.split_once(':') {
        let main = main.trim();
        if !main.is_empty() {
            return main.to_string();
        }
        return UNKNOWN_REGION.to_string();
    }

    const MAIN_REGIONS: [(&str, &str); 5] = [
        ("south", "South"),
        ("mid-atlantic", "Mid-Atlantic"),
        ("midatlantic", "Mid-Atlantic"),
        ("central", "Central"),
        ("west", "West"),
    ];
    let lowered = cleaned.to_ascii_lowercase();
    for (prefix, main) in MAIN_REGIONS {
        if lowered.starts_with(prefix) {
            return main.to_string();
        }
    }
    cleaned.to_string()
}

// Buyer references arrive as "Jane Doe (jane@utility.example)" or as a bare
// address; only the name part is a region hint.
fn strip_region_email(value: &str) -> String {
    if !value.contains('@') {
        return value.to_string();
    }
    if let Some((name, rest)) = value.split_once('(') {
        if rest.contains(')') {
            return name.trim().to_string();
        }
    }
    String::new()
}

/// Normalizes a purchase-order type label. Unrecognized labels keep their
/// text; a blank label takes the report type's default.
pub fn normalize_po_type(raw: &str, report_type: ReportType) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default_po_type(report_type).to_string();
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "catalog" => "Catalog".to_string(),
        "free text" | "punch out" | "punchout" => "Free Text".to_string(),
        "non-po" | "non po" => "Non-PO".to_string(),
        _ => trimmed.to_string(),
    }
}

fn default_po_type(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::PoLineDetail => "Catalog",
        ReportType::NonPoInvoice => "Non-PO",
        ReportType::ChemicalSpendBySupplier => "Free Text",
    }
}
