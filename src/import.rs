//! File → documents. CSV is decoded as ISO-8859-1; spreadsheets are read from
//! their first worksheet. In both, the first row is the header.

use crate::{
    config::Config,
    report::{FieldValue, TestReport},
    store::ReportStore,
};
use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, Xlsx, open_workbook};
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Iso8601};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" => Some(SourceFormat::Xlsx),
            _ => None,
        }
    }
}

/// Rows as read from the file, before they become documents.
/// Every row has exactly `headers.len()` cells; `None` is an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<FieldValue>>>,
}

impl RowSet {
    fn new(headers: Vec<String>) -> Self {
        Self {
            headers: dedupe_headers(headers),
            rows: Vec::new(),
        }
    }

    fn push_row(&mut self, mut cells: Vec<Option<FieldValue>>) {
        if cells.len() > self.headers.len() {
            debug!(
                "row {} has {} cells for {} columns; extra cells ignored",
                self.rows.len() + 1,
                cells.len(),
                self.headers.len()
            );
        }
        cells.resize(self.headers.len(), None);
        self.rows.push(cells);
    }

    /// Removes rows with any empty cell, returning how many were removed.
    pub fn drop_incomplete(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.iter().all(Option::is_some));
        before - self.rows.len()
    }

    /// Empty cells become absent keys.
    pub fn into_reports(self) -> Vec<TestReport> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .map(|row| {
                let mut report = TestReport::default();
                for (key, cell) in headers.iter().zip(row) {
                    if let Some(value) = cell {
                        report.set(key, value);
                    }
                }
                report
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub collection: String,
    pub format: SourceFormat,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub inserted: usize,
}

/// Reads `input` and inserts its rows into `collection`.
///
/// Returns `Ok(None)` when the extension is not one we read; that case is
/// reported to the user but is not an error.
pub fn import_file<S: ReportStore + ?Sized>(
    cfg: &Config,
    store: &mut S,
    collection: &str,
    input: &Path,
) -> Result<Option<ImportOutcome>> {
    let Some(format) = SourceFormat::detect(input) else {
        warn!("unsupported import format: {}", input.display());
        return Ok(None);
    };

    let mut rows = match format {
        SourceFormat::Csv => read_csv(cfg, input)?,
        SourceFormat::Xlsx => read_xlsx(input)?,
    };
    let rows_read = rows.rows.len();

    let rows_dropped = if format == SourceFormat::Xlsx && cfg.import.xlsx_drop_incomplete_rows {
        rows.drop_incomplete()
    } else {
        0
    };
    if rows_dropped > 0 {
        warn!("dropped {rows_dropped} of {rows_read} spreadsheet rows with empty cells");
    }

    let reports = rows.into_reports();
    let ids = store
        .insert_many(collection, reports)
        .with_context(|| format!("inserting {} into {collection}", input.display()))?;
    info!(
        "imported {} rows from {} into {collection}",
        ids.len(),
        input.display()
    );

    Ok(Some(ImportOutcome {
        collection: collection.to_string(),
        format,
        rows_read,
        rows_dropped,
        inserted: ids.len(),
    }))
}

pub fn read_csv(cfg: &Config, path: &Path) -> Result<RowSet> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_csv(&bytes, cfg.import.infer_numbers)
        .with_context(|| format!("parsing CSV {}", path.display()))
}

pub fn parse_csv(bytes: &[u8], infer_numbers: bool) -> Result<RowSet> {
    let text = crate::util::decode_latin1(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, h))
        .collect();
    let mut set = RowSet::new(headers);

    for record in rdr.records() {
        let record = record?;
        let cells = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    None
                } else if infer_numbers {
                    Some(infer_cell(cell))
                } else {
                    Some(FieldValue::text(cell))
                }
            })
            .collect();
        set.push_row(cells);
    }
    Ok(set)
}

/// Integer text → `Int`, finite float text → `Float`, else `Text`.
pub fn infer_cell(cell: &str) -> FieldValue {
    if let Ok(i) = cell.parse::<i64>() {
        return FieldValue::Int(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => FieldValue::Float(f),
        _ => FieldValue::text(cell),
    }
}

pub fn read_xlsx(path: &Path) -> Result<RowSet> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("opening workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets: {}", path.display()))?
        .with_context(|| format!("reading first worksheet of {}", path.display()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell_value(cell) {
                Some(v) => header_name(i, &v.render()),
                None => header_name(i, ""),
            })
            .collect(),
        None => Vec::new(),
    };

    let mut set = RowSet::new(headers);
    for row in rows {
        set.push_row(row.iter().map(cell_value).collect());
    }
    Ok(set)
}

/// Spreadsheet cell → stored value. Empty and error cells count as missing.
pub fn cell_value(cell: &Data) -> Option<FieldValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(FieldValue::text(s.as_str())),
        Data::Int(i) => Some(FieldValue::Int(*i)),
        Data::Float(f) => Some(float_value(*f)),
        Data::Bool(b) => Some(FieldValue::Bool(*b)),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64()).map(FieldValue::DateTime),
        Data::DateTimeIso(s) => Some(
            PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
                .map(|p| FieldValue::DateTime(p.assume_utc()))
                .unwrap_or_else(|_| FieldValue::text(s.as_str())),
        ),
        Data::DurationIso(s) => Some(FieldValue::text(s.as_str())),
    }
}

// Spreadsheets store every number as a double; whole numbers read back as ints.
fn float_value(f: f64) -> FieldValue {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        FieldValue::Int(f as i64)
    } else {
        FieldValue::Float(f)
    }
}

/// Days since 1899-12-30 (the 1900 date system), as a UTC timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<OffsetDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = Date::from_calendar_date(1899, Month::December, 30)
        .ok()?
        .midnight()
        .assume_utc();
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add(time::Duration::milliseconds(millis))
}

// Names are kept verbatim; a header with surrounding spaces is a different key.
fn header_name(index: usize, raw: &str) -> String {
    if raw.is_empty() {
        format!("Unnamed: {index}")
    } else {
        raw.to_string()
    }
}

// Repeated column names get a `.N` suffix so no cell is silently overwritten.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for h in headers {
        let mut name = h.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{h}.{n}");
            n += 1;
        }
        seen.push(name);
    }
    seen
}
