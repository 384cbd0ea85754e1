//! Report type classification.
//!
//! Each supported report format carries a header signature: the column set
//! its exporting system emits. Detection scores the observed header row
//! against every signature and picks the best match above a minimum
//! threshold, with ties broken by a fixed priority order.

use std::collections::HashSet;
use std::fmt;

use clap::ValueEnum;
use log::debug;

use crate::data::normalize_header;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ReportType {
    ChemicalSpendBySupplier,
    PoLineDetail,
    NonPoInvoice,
}

const PO_LINE_SIGNATURE: &[&str] = &[
    "Purchase Order: Confirmation Date",
    "Line Number",
    "Purchase Requisition: Number",
    "Order Identifier",
    "Order_ID",
    "Purchase Order: Supplier",
    "Item Description",
    "Category",
    "Confirmed Unit Price",
    "Connected Quantity",
    "Confirmed Quantity",
    "Purchase Requisition: Buyer",
    "Purchase Requisition: Our Reference",
    "Purchase Order: Processing Status",
    "Purchase Order: Received By",
    "Type",
];

const NON_PO_SIGNATURE: &[&str] = &[
    "Invoice: Type",
    "Invoice: Created Date",
    "Supplier: Name",
    "Invoice: Number",
    "Coding Line Number",
    "Dimension1 Value",
    "Dimension1 Description",
    "Dimension2 Value",
    "Net Amount",
    "Dimension3 Description",
    "Dimension4 Description",
    "Dimension5 Description",
    "Dimension5 Value",
];

const CHEMICAL_SPEND_SIGNATURE: &[&str] = &[
    "Vendor ID",
    "Vendor Name",
    "Supplier Category",
    "Line of Service",
    "Project Region",
    "Department",
    "Department ID",
    "Bill #",
    "Bill Date",
    "Description",
    "Quantity",
    "Units",
    "Rate",
    "Amount",
    "Purchase Order Type",
];

impl ReportType {
    /// Detection priority order: on equal signature overlap the earliest
    /// entry wins.
    pub const ALL: [ReportType; 3] = [
        ReportType::ChemicalSpendBySupplier,
        ReportType::PoLineDetail,
        ReportType::NonPoInvoice,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ReportType::ChemicalSpendBySupplier => "Chemical Spend by Supplier",
            ReportType::PoLineDetail => "PO Line Detail",
            ReportType::NonPoInvoice => "Non-PO Invoice",
        }
    }

    /// Stable identifier used in stored metadata.
    pub fn slug(&self) -> &'static str {
        match self {
            ReportType::ChemicalSpendBySupplier => "chemical_spend_by_supplier",
            ReportType::PoLineDetail => "po_line_detail",
            ReportType::NonPoInvoice => "non_po_invoice",
        }
    }

    pub fn from_slug(slug: &str) -> Option<ReportType> {
        ReportType::ALL.into_iter().find(|ty| ty.slug() == slug)
    }

    pub fn signature(&self) -> &'static [&'static str] {
        match self {
            ReportType::ChemicalSpendBySupplier => CHEMICAL_SPEND_SIGNATURE,
            ReportType::PoLineDetail => PO_LINE_SIGNATURE,
            ReportType::NonPoInvoice => NON_PO_SIGNATURE,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Minimum signature columns that must appear in the header row before a
/// type is considered recognized.
pub const MIN_SIGNATURE_MATCHES: usize = 3;

// NetSuite exports are routinely renamed by hand; these filename fragments
// identify them even when the header row alone would be ambiguous.
const CHEMICAL_SPEND_FILENAME_HINTS: &[&str] =
    &["chemical_spend", "chem_spend", "chemsupplier", "chemical-supplier"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub report_type: Option<ReportType>,
    /// Signature overlap per type, in priority order.
    pub scores: Vec<(ReportType, usize)>,
}

/// Counts how many of the type's signature columns appear in the observed
/// header row. Comparison is case-insensitive on whitespace-trimmed names.
pub fn signature_matches(report_type: ReportType, headers: &[String]) -> usize {
    let observed: HashSet<String> = headers.iter().map(|h| normalize_header(h)).collect();
    report_type
        .signature()
        .iter()
        .filter(|column| observed.contains(&normalize_header(column)))
        .count()
}

/// Classifies an upload from its file name and header row. Returns the
/// per-type overlap scores alongside the outcome so callers can surface why
/// a file was not recognized.
pub fn detect(file_name: &str, headers: &[String]) -> Detection {
    let scores: Vec<(ReportType, usize)> = ReportType::ALL
        .into_iter()
        .map(|ty| (ty, signature_matches(ty, headers)))
        .collect();

    let lowered = file_name.to_ascii_lowercase();
    if CHEMICAL_SPEND_FILENAME_HINTS
        .iter()
        .any(|hint| lowered.contains(hint))
    {
        debug!("'{file_name}' classified as chemical spend from its file name");
        return Detection {
            report_type: Some(ReportType::ChemicalSpendBySupplier),
            scores,
        };
    }

    let mut best: Option<(ReportType, usize)> = None;
    for &(ty, matches) in &scores {
        if matches >= MIN_SIGNATURE_MATCHES && best.is_none_or(|(_, n)| matches > n) {
            best = Some((ty, matches));
        }
    }

    Detection {
        report_type: best.map(|(ty, _)| ty),
        scores,
    }
}
