//! Column mapping from source headers to the canonical schema.
//!
//! Every report type carries a static table of known source-column synonyms
//! per canonical field, ordered so the exporting system's primary column is
//! tried before generic fallbacks. Lookup is case-insensitive on
//! whitespace-normalized names. Source columns that map to nothing are kept
//! as passthrough extras, never dropped.

use crate::data::normalize_header;
use crate::report::ReportType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    Supplier,
    ItemNumber,
    Description,
    OrderId,
    Spend,
    Quantity,
    Unit,
    UnitPrice,
    Region,
    PoType,
}

impl CanonicalField {
    pub const COUNT: usize = 11;

    pub const ALL: [CanonicalField; CanonicalField::COUNT] = [
        CanonicalField::Date,
        CanonicalField::Supplier,
        CanonicalField::ItemNumber,
        CanonicalField::Description,
        CanonicalField::OrderId,
        CanonicalField::Spend,
        CanonicalField::Quantity,
        CanonicalField::Unit,
        CanonicalField::UnitPrice,
        CanonicalField::Region,
        CanonicalField::PoType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Supplier => "supplier",
            CanonicalField::ItemNumber => "item_number",
            CanonicalField::Description => "description",
            CanonicalField::OrderId => "order_id",
            CanonicalField::Spend => "spend",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Unit => "unit",
            CanonicalField::UnitPrice => "unit_price",
            CanonicalField::Region => "region",
            CanonicalField::PoType => "po_type",
        }
    }
}

type SynonymRow = (CanonicalField, &'static [&'static str]);

const PO_LINE_MAPPINGS: &[SynonymRow] = &[
    (
        CanonicalField::Date,
        &[
            "Purchase Order: Confirmation Date",
            "Date",
            "Date Created",
            "Date Due",
        ],
    ),
    (
        CanonicalField::Supplier,
        &[
            "Purchase Order: Supplier",
            "Supplier",
            "Supplier: Name",
            "Vendor",
        ],
    ),
    (
        CanonicalField::ItemNumber,
        &["Line Number", "Item Number", "Item #"],
    ),
    (
        CanonicalField::Description,
        &[
            "Item Description",
            "Description",
            "Chemical",
            "Item: Category",
            "Category",
        ],
    ),
    (
        CanonicalField::OrderId,
        &[
            "Order Identifier",
            "Order_ID",
            "Order ID",
            "Bill # (Supplier Invoice #)",
        ],
    ),
    (
        CanonicalField::Spend,
        &["Total_Cost", "Total Cost", "Total"],
    ),
    (
        CanonicalField::Quantity,
        &[
            "Connected",
            "Connected Quantity",
            "Confirmed Quantity",
            "Quantity",
            "QTY",
        ],
    ),
    (CanonicalField::Unit, &["Unit", "Units", "UOM"]),
    (
        CanonicalField::UnitPrice,
        &["Confirmed Unit Price", "Unit Price", "Unit_Price"],
    ),
    (
        CanonicalField::Region,
        &["Purchase Requisition: Our Reference", "Region", "Department"],
    ),
    (CanonicalField::PoType, &["Type", "Transaction Type"]),
];

const NON_PO_MAPPINGS: &[SynonymRow] = &[
    (
        CanonicalField::Date,
        &["Invoice: Created Date", "Date", "Date Created", "Date Due"],
    ),
    (
        CanonicalField::Supplier,
        &["Supplier: Name", "Supplier", "Vendor"],
    ),
    (
        CanonicalField::ItemNumber,
        &["Coding Line Number", "Line Number", "Item Number", "Item #"],
    ),
    (
        CanonicalField::Description,
        &[
            "Dimension3 Description",
            "Description",
            "Chemical",
            "Item: Category",
            "Category",
        ],
    ),
    (
        CanonicalField::OrderId,
        &[
            "Invoice: Number",
            "Order_ID",
            "Order Identifier",
            "Bill # (Supplier Invoice #)",
        ],
    ),
    (
        CanonicalField::Spend,
        &["Net Amount", "Total", "Total_Cost", "Total Cost", "Amount"],
    ),
    (CanonicalField::Quantity, &["Quantity", "QTY"]),
    (CanonicalField::Unit, &["Unit", "Units", "UOM"]),
    (CanonicalField::UnitPrice, &["Unit Price", "Unit_Price"]),
    (
        CanonicalField::Region,
        &["Dimension4 Description", "Region", "Project Region", "Department"],
    ),
    (
        CanonicalField::PoType,
        &["Invoice: Type", "Transaction Type"],
    ),
];

const CHEMICAL_SPEND_MAPPINGS: &[SynonymRow] = &[
    (
        CanonicalField::Date,
        &["Bill Date", "Date", "Date Created", "Date Due"],
    ),
    (
        CanonicalField::Supplier,
        &["Vendor Name", "Supplier", "Supplier: Name", "Vendor"],
    ),
    (
        CanonicalField::ItemNumber,
        &["Vendor ID", "Item Number", "Item #"],
    ),
    (
        CanonicalField::Description,
        &[
            "Description",
            "Chemical",
            "Item Description",
            "Item: Category",
            "Category",
        ],
    ),
    (
        CanonicalField::OrderId,
        &[
            "Bill #",
            "Bill # (Supplier Invoice #)",
            "Invoice: Number",
            "Order_ID",
        ],
    ),
    (
        CanonicalField::Spend,
        &["Amount", "Total", "Total_Cost", "Total Cost"],
    ),
    (CanonicalField::Quantity, &["Quantity", "QTY"]),
    (CanonicalField::Unit, &["Units", "Unit", "UOM"]),
    (
        CanonicalField::UnitPrice,
        &["Rate", "Unit Price", "Unit_Price"],
    ),
    (
        CanonicalField::Region,
        &["Project Region", "Region", "Department"],
    ),
    (
        CanonicalField::PoType,
        &["Purchase Order Type", "Type", "Transaction Type"],
    ),
];

// Backfill source for blank description cells when the description slot is
// bound to a richer column.
const DESCRIPTION_FALLBACKS: &[&str] = &["Item: Category", "Category"];

fn mappings(report_type: ReportType) -> &'static [SynonymRow] {
    match report_type {
        ReportType::PoLineDetail => PO_LINE_MAPPINGS,
        ReportType::NonPoInvoice => NON_PO_MAPPINGS,
        ReportType::ChemicalSpendBySupplier => CHEMICAL_SPEND_MAPPINGS,
    }
}

/// Looks up the canonical field a source column feeds under the given report
/// type, or `None` when the column is unmapped.
pub fn canonical_field(report_type: ReportType, column: &str) -> Option<CanonicalField> {
    let wanted = normalize_header(column);
    for (field, synonyms) in mappings(report_type) {
        if synonyms
            .iter()
            .any(|synonym| normalize_header(synonym) == wanted)
        {
            return Some(*field);
        }
    }
    None
}

/// Resolved header layout for one upload: which observed column index feeds
/// each canonical field, plus the indexes left over as extras. Each source
/// column feeds at most one field; within a field the first synonym present
/// wins. A category column that lost the description slot is remembered as
/// the per-row backfill for blank description cells.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    slots: [Option<usize>; CanonicalField::COUNT],
    description_fallback: Option<usize>,
    extras: Vec<usize>,
}

impl ColumnPlan {
    pub fn resolve(report_type: ReportType, headers: &[String]) -> ColumnPlan {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut slots = [None; CanonicalField::COUNT];
        let mut taken = vec![false; headers.len()];

        for (field, synonyms) in mappings(report_type) {
            for synonym in *synonyms {
                let wanted = normalize_header(synonym);
                let found = (0..headers.len()).find(|&i| !taken[i] && normalized[i] == wanted);
                if let Some(idx) = found {
                    slots[*field as usize] = Some(idx);
                    taken[idx] = true;
                    break;
                }
            }
        }

        // An unclaimed category column stays an extra but still backs up
        // blank description cells.
        let description_fallback = DESCRIPTION_FALLBACKS.iter().find_map(|name| {
            let wanted = normalize_header(name);
            (0..headers.len()).find(|&i| !taken[i] && normalized[i] == wanted)
        });

        let extras = (0..headers.len()).filter(|&i| !taken[i]).collect();
        ColumnPlan {
            slots,
            description_fallback,
            extras,
        }
    }

    /// Column index bound to the field, if any synonym matched.
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.slots[field as usize]
    }

    /// Column whose value fills a blank description cell, when the upload
    /// carries a category column the description is not bound to.
    pub fn description_fallback(&self) -> Option<usize> {
        self.description_fallback
    }

    /// Indexes of observed columns that mapped to no canonical field, in
    /// header order.
    pub fn extras(&self) -> &[usize] {
        &self.extras
    }

    pub fn mapped_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// True when not a single canonical field matched any column.
    pub fn is_unmappable(&self) -> bool {
        self.mapped_count() == 0
    }
}
