use chemspend::data::parse_money;
use chemspend::ingest::{self, IngestError, IngestOptions, IngestionResult};
use chemspend::normalize;
use chemspend::report::{self, ReportType};
use chemspend::store::{SpendStore, SummaryGroup};
use chemspend::upload::{UploadFile, parse_upload};
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

const PO_CSV: &str = "\
Purchase Order: Confirmation Date,Line Number,Order Identifier,Purchase Order: Supplier,Item Description,Category,Confirmed Unit Price,Connected Quantity,Purchase Requisition: Our Reference,Type
2024-03-04,1,PO-7781,Hawkins Inc,Aluminum Sulfate 48%,Coagulants,410.00,2,Mid-Atlantic : Richmond,Catalog
2024-03-11,2,PO-7781,Hawkins Inc,Caustic Soda 25%,pH Control,96.50,4,Jane Doe (jane@utility.com),Free text
2024-03-19,3,PO-7802,Univar Solutions,Sulfuric Acid 93%,Acids,210.00,1,West : Reno,Punch out
";

const FLAWED_NON_PO_CSV: &str = "\
Invoice: Type,Invoice: Created Date,Supplier: Name,Invoice: Number,Coding Line Number,Net Amount,Dimension3 Description,Dimension4 Description
Non-PO,01/10/2024,Kemira Water Solutions,INV-501,1,\"$2,100.00\",Polymer,South : Chattanooga
Non-PO,not-a-date,Kemira Water Solutions,INV-502,2,400.00,Polymer,South
Non-PO,01/12/2024,Carus Corporation,INV-503,1,(350.00),Permanganate,Central
Non-PO,01/15/2024,Carus Corporation,INV-504,1,815.25,Permanganate,Central
";

fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

fn ingest_into(store: &mut SpendStore, file_name: &str, contents: &str) -> IngestionResult {
    ingest::ingest_bytes(
        file_name,
        contents.as_bytes().to_vec(),
        &IngestOptions::default(),
        store,
    )
}

#[test]
fn po_upload_derives_spend_and_lands_in_the_store() {
    let mut store = SpendStore::open_in_memory().expect("store");
    let result = ingest_into(&mut store, "po_march.csv", PO_CSV);
    assert!(result.succeeded(), "failure: {:?}", result.failure);
    assert_eq!(result.report_type, Some(ReportType::PoLineDetail));
    assert_eq!(result.accepted, 3);
    assert!(result.rejections.is_empty());

    let totals = store.totals().expect("totals");
    assert_eq!(totals.report_count, 1);
    assert_eq!(totals.line_count, 3);
    // 2 x 410.00 + 4 x 96.50 + 1 x 210.00, derived per row.
    assert_eq!(totals.total_spend, dec("1416.00"));
    assert_eq!(totals.first_date, NaiveDate::from_ymd_opt(2024, 3, 4));
    assert_eq!(totals.last_date, NaiveDate::from_ymd_opt(2024, 3, 19));

    let by_type = store.spend_by(SummaryGroup::PoType).expect("po type");
    assert_eq!(by_type[0].key, "Catalog");
    assert_eq!(by_type[0].total_spend, dec("820.00"));
    assert_eq!(by_type[1].key, "Free Text");
    assert_eq!(by_type[1].line_count, 2);
    assert_eq!(by_type[1].total_spend, dec("596.00"));

    let by_month = store.spend_by(SummaryGroup::Month).expect("month");
    assert_eq!(by_month.len(), 1);
    assert_eq!(by_month[0].key, "2024-03");
    assert_eq!(by_month[0].total_spend, dec("1416.00"));
}

#[test]
fn flawed_rows_are_rejected_individually_and_the_rest_load() {
    let mut store = SpendStore::open_in_memory().expect("store");
    let result = ingest_into(&mut store, "invoices_jan.csv", FLAWED_NON_PO_CSV);
    assert!(result.succeeded(), "failure: {:?}", result.failure);
    assert_eq!(result.report_type, Some(ReportType::NonPoInvoice));
    assert_eq!(result.accepted, 2);
    assert_eq!(result.rejections.len(), 2);
    assert_eq!(result.rejections[0].line, 3);
    assert!(result.rejections[0].reason.contains("invalid date"));
    assert_eq!(result.rejections[1].line, 4);
    assert!(result.rejections[1].reason.contains("credit"));

    let totals = store.totals().expect("totals");
    assert_eq!(totals.line_count, 2);
    assert_eq!(totals.supplier_count, 2);
    assert_eq!(totals.total_spend, dec("2915.25"));

    let by_supplier = store.spend_by(SummaryGroup::Supplier).expect("supplier");
    assert_eq!(by_supplier[0].key, "Kemira Water Solutions");
    assert_eq!(by_supplier[0].total_spend, dec("2100.00"));
    assert_eq!(by_supplier[1].key, "Carus Corporation");
    assert_eq!(by_supplier[1].total_spend, dec("815.25"));
}

#[test]
fn normalizing_the_same_upload_twice_is_idempotent() {
    let upload = parse_upload(
        &UploadFile::new("invoices_jan.csv", FLAWED_NON_PO_CSV.as_bytes().to_vec()),
        None,
    )
    .expect("parse upload");
    let first = normalize::normalize(&upload, ReportType::NonPoInvoice);
    let second = normalize::normalize(&upload, ReportType::NonPoInvoice);
    assert_eq!(first, second);
}

#[test]
fn emitted_rows_satisfy_the_canonical_invariants() {
    let upload = parse_upload(
        &UploadFile::new("po_march.csv", PO_CSV.as_bytes().to_vec()),
        None,
    )
    .expect("parse upload");
    let normalized = normalize::normalize(&upload, ReportType::PoLineDetail);
    assert!(!normalized.rows.is_empty());
    for row in &normalized.rows {
        assert!(row.spend >= Decimal::ZERO, "non-negative spend: {row:?}");
    }
    // Buyer references consolidate to a usable region value.
    assert_eq!(normalized.rows[0].region, "Mid-Atlantic");
    assert_eq!(normalized.rows[1].region, "Jane Doe");
    assert_eq!(normalized.rows[2].region, "West");
}

#[test]
fn blank_po_descriptions_take_the_category_value() {
    let csv = "\
Purchase Order: Confirmation Date,Purchase Order: Supplier,Item Description,Category,Confirmed Unit Price,Connected
2024-04-02,Hawkins Inc,,Coagulants,410.00,2
2024-04-03,Hawkins Inc,Caustic Soda 25%,pH Control,96.50,1
";
    let upload = parse_upload(
        &UploadFile::new("po_april.csv", csv.as_bytes().to_vec()),
        None,
    )
    .expect("parse upload");
    let normalized = normalize::normalize(&upload, ReportType::PoLineDetail);
    assert!(normalized.rejections.is_empty(), "{:?}", normalized.rejections);
    assert_eq!(normalized.rows[0].description, "Coagulants");
    assert_eq!(normalized.rows[1].description, "Caustic Soda 25%");
}

#[test]
fn vendor_ids_survive_as_item_numbers() {
    let csv = "\
Vendor ID,Vendor Name,Bill Date,Amount,Project Region
V-100,Brenntag North America,01/15/2024,2450.00,South : Laredo
";
    let upload = parse_upload(
        &UploadFile::new("netsuite.csv", csv.as_bytes().to_vec()),
        None,
    )
    .expect("parse upload");
    let normalized = normalize::normalize(&upload, ReportType::ChemicalSpendBySupplier);
    assert_eq!(normalized.rows[0].item_number.as_deref(), Some("V-100"));
}

#[test]
fn alien_headers_never_reach_the_store() {
    let mut store = SpendStore::open_in_memory().expect("store");
    let result = ingest_into(&mut store, "mystery.csv", "colour,taste\nred,sweet\n");
    assert!(matches!(
        result.failure,
        Some(IngestError::UnrecognizedReportType { .. })
    ));
    assert_eq!(result.accepted, 0);
    let totals = store.totals().expect("totals");
    assert_eq!(totals.report_count, 0);
    assert_eq!(totals.line_count, 0);
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut grouped = String::new();
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

proptest! {
    #[test]
    fn money_parser_never_panics(input in "[ $,()0-9A-Za-z.-]{0,24}") {
        if let Ok(Some(amount)) = parse_money(&input) {
            let round_trip = parse_money(&amount.to_string()).expect("canonical form parses");
            prop_assert_eq!(round_trip, Some(amount));
        }
    }

    #[test]
    fn formatted_money_parses_exactly(
        dollars in 0i64..=9_999_999,
        cents in 0u32..=99,
        currency_symbol in proptest::bool::ANY
    ) {
        let grouped = group_thousands(dollars);
        let text = if currency_symbol {
            format!("${grouped}.{cents:02}")
        } else {
            format!("{grouped}.{cents:02}")
        };
        let expected = Decimal::new(dollars * 100 + i64::from(cents), 2);
        prop_assert_eq!(parse_money(&text).expect("parses"), Some(expected));
    }

    #[test]
    fn detection_survives_extra_unknown_columns(
        ty_idx in 0usize..3,
        extras in proptest::collection::vec("zz[a-z]{2,8}", 0..5)
    ) {
        let ty = ReportType::ALL[ty_idx];
        let mut headers: Vec<String> = ty.signature().iter().map(|c| c.to_string()).collect();
        headers.extend(extras);
        let detection = report::detect("upload.csv", &headers);
        prop_assert_eq!(detection.report_type, Some(ty));
    }
}
