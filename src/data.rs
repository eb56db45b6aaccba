//! Transaction loading, RFM aggregation and segment table persistence

use crate::model::{ScoredCustomer, Segment};
use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Columns the transactions CSV must carry; extra columns are ignored.
const REQUIRED_COLUMNS: [&str; 5] = [
    "CustomerID",
    "InvoiceNo",
    "InvoiceDate",
    "Quantity",
    "UnitPrice",
];

/// One raw transaction line item. Read once, never mutated after aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// None for guest transactions with no attributable customer.
    pub customer_id: Option<String>,
    pub invoice_no: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub invoice_date: NaiveDate,
}

/// Per-customer totals straight out of aggregation, before recency is known.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerAggregate {
    pub customer_id: String,
    /// Raw signed sum of quantity * unit price; returns are not filtered out.
    pub monetary_value: f64,
    /// Count of distinct invoice numbers, not line items.
    pub frequency: u64,
    pub last_order_date: NaiveDate,
}

/// Aggregate plus recency relative to the population's latest order date.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    pub monetary_value: f64,
    pub frequency: u64,
    pub last_order_date: NaiveDate,
    /// Whole days since the last order, measured against the dataset's
    /// maximum invoice date rather than wall-clock time. Always >= 0.
    pub recency: i64,
}

/// Load the raw transactions CSV.
///
/// Header validation happens before any row parsing so a malformed input
/// aborts the run with a diagnostic naming the missing columns. Files with
/// non-UTF-8 legacy bytes are decoded as Windows-1252.
pub fn load_transactions(path: impl AsRef<Path>) -> crate::Result<Vec<Transaction>> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("failed to read input file {}", path.display()))?;
    let text = decode_legacy(&bytes);

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv header from {}", path.display()))?
        .clone();

    let mut indices = Vec::with_capacity(REQUIRED_COLUMNS.len());
    let mut missing = Vec::new();
    for column in REQUIRED_COLUMNS {
        match headers.iter().position(|h| h == column) {
            Some(idx) => indices.push(idx),
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        bail!(
            "input file {} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        );
    }
    let (customer_idx, invoice_idx, date_idx, quantity_idx, price_idx) =
        (indices[0], indices[1], indices[2], indices[3], indices[4]);

    let mut transactions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // +2: one for the header line, one for 1-based numbering.
        let line = row + 2;
        let record = record.with_context(|| format!("failed to parse csv record at line {line}"))?;

        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let customer_id = match field(customer_idx) {
            "" => None,
            id => Some(id.to_string()),
        };
        let quantity: f64 = field(quantity_idx)
            .parse()
            .with_context(|| format!("invalid Quantity at line {line}"))?;
        let unit_price: f64 = field(price_idx)
            .parse()
            .with_context(|| format!("invalid UnitPrice at line {line}"))?;
        let invoice_date = parse_invoice_date(field(date_idx))
            .with_context(|| format!("invalid InvoiceDate at line {line}"))?;

        transactions.push(Transaction {
            customer_id,
            invoice_no: field(invoice_idx).to_string(),
            quantity,
            unit_price,
            invoice_date,
        });
    }

    Ok(transactions)
}

/// Decode raw file bytes, falling back to Windows-1252 for legacy exports
/// that fail UTF-8 validation.
fn decode_legacy(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// Accepted invoice timestamp formats, most specific first.
fn parse_invoice_date(s: &str) -> crate::Result<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    bail!("unrecognized timestamp: {s}")
}

/// Collapse raw line items into one aggregate per distinct customer,
/// ordered by customer id.
///
/// Monetary value is the raw signed sum of quantity * unit price, frequency
/// counts distinct invoice numbers, and rows without a customer id are
/// dropped. Pure transform, no I/O.
pub fn aggregate_transactions(transactions: &[Transaction]) -> Vec<CustomerAggregate> {
    struct Accumulator<'a> {
        monetary_value: f64,
        invoices: HashSet<&'a str>,
        last_order_date: NaiveDate,
    }

    let mut by_customer: BTreeMap<&str, Accumulator<'_>> = BTreeMap::new();
    for tx in transactions {
        let Some(customer_id) = tx.customer_id.as_deref() else {
            continue;
        };
        let entry = by_customer.entry(customer_id).or_insert(Accumulator {
            monetary_value: 0.0,
            invoices: HashSet::new(),
            last_order_date: tx.invoice_date,
        });
        entry.monetary_value += tx.quantity * tx.unit_price;
        entry.invoices.insert(tx.invoice_no.as_str());
        entry.last_order_date = entry.last_order_date.max(tx.invoice_date);
    }

    by_customer
        .into_iter()
        .map(|(customer_id, acc)| CustomerAggregate {
            customer_id: customer_id.to_string(),
            monetary_value: acc.monetary_value,
            frequency: acc.invoices.len() as u64,
            last_order_date: acc.last_order_date,
        })
        .collect()
}

/// Attach recency to each aggregate, measured against the population's
/// maximum last order date. The newest customer gets recency 0.
pub fn derive_recency(aggregates: Vec<CustomerAggregate>) -> Vec<CustomerMetrics> {
    let Some(reference_date) = aggregates.iter().map(|a| a.last_order_date).max() else {
        return Vec::new();
    };

    aggregates
        .into_iter()
        .map(|a| CustomerMetrics {
            recency: (reference_date - a.last_order_date).num_days(),
            customer_id: a.customer_id,
            monetary_value: a.monetary_value,
            frequency: a.frequency,
            last_order_date: a.last_order_date,
        })
        .collect()
}

/// Write the scored segment table, overwriting any previous output.
///
/// Rows are serialized into a memory buffer first, so the existing file is
/// never touched by a run that fails midway.
pub fn write_segments(path: impl AsRef<Path>, customers: &[ScoredCustomer]) -> crate::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(Vec::new());
    for customer in customers {
        writer.serialize(customer)?;
    }
    writer.flush()?;
    let buffer = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to finalize csv buffer: {e}"))?;
    fs::write(path, buffer)
        .with_context(|| format!("failed to write output file {}", path.display()))
}

/// Read a previously persisted segment table back into memory.
pub fn load_segments(path: impl AsRef<Path>) -> crate::Result<Vec<ScoredCustomer>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open segment file {}", path.display()))?;

    let mut customers = Vec::new();
    for (row, record) in reader.deserialize::<ScoredCustomer>().enumerate() {
        let customer =
            record.with_context(|| format!("invalid segment record at line {}", row + 2))?;
        customers.push(customer);
    }
    Ok(customers)
}

/// Report-mode filtering over the loaded segment table.
///
/// The hard pre-filter (positive spend, recency within a year, frequency at
/// most 100) always applies before the user-chosen upper bounds and the
/// optional segment selection.
#[derive(Debug, Clone)]
pub struct ReportFilter {
    pub recency_max: i64,
    pub frequency_max: u64,
    pub monetary_max: f64,
    pub segments: Option<Vec<Segment>>,
}

impl Default for ReportFilter {
    fn default() -> Self {
        ReportFilter {
            recency_max: 180,
            frequency_max: 25,
            monetary_max: 25_000.0,
            segments: None,
        }
    }
}

impl ReportFilter {
    pub fn apply(&self, customers: Vec<ScoredCustomer>) -> Vec<ScoredCustomer> {
        customers
            .into_iter()
            .filter(|c| c.monetary_value > 0.0 && c.recency <= 360 && c.frequency <= 100)
            .filter(|c| {
                c.recency <= self.recency_max
                    && c.frequency <= self.frequency_max
                    && c.monetary_value <= self.monetary_max
            })
            .filter(|c| {
                self.segments
                    .as_ref()
                    .map_or(true, |selected| selected.contains(&c.segment))
            })
            .collect()
    }
}
