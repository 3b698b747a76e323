// file: src/parser/xlsx.rs
// description: Excel worksheet extraction, one table per sheet
// reference: https://docs.rs/calamine

use crate::error::{IngestError, Result};
use crate::models::{Document, ExtractedTable};
use crate::parser::{HeaderNormalizer, TableExtractor};
use calamine::{DataType, Reader as CalamineReader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::io::Cursor;
use tracing::{debug, warn};

pub struct XlsxExtractor {
    normalizer: HeaderNormalizer,
}

impl XlsxExtractor {
    pub fn new() -> Self {
        Self {
            normalizer: HeaderNormalizer::new(),
        }
    }

    /// First non-blank row is the header, every later non-blank row is data.
    pub fn table_from_grid(&self, name: &str, grid: Vec<Vec<String>>) -> Option<ExtractedTable> {
        let mut rows = grid
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));

        let header_cells = rows.next()?;
        let header = self.normalizer.header_from_cells(header_cells.as_slice());

        let data: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(|cell| cell.trim().to_string()).collect())
            .collect();

        if data.is_empty() {
            debug!("Sheet '{}' has no data rows, skipping", name);
            return None;
        }

        Some(ExtractedTable::new(name, header, data))
    }
}

impl Default for XlsxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TableExtractor for XlsxExtractor {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extract(&self, document: &Document) -> Result<Vec<ExtractedTable>> {
        let cursor = Cursor::new(document.bytes.as_slice());
        let mut workbook = Xlsx::new(cursor).map_err(|err| {
            IngestError::extraction(&document.name, format!("failed to read workbook: {err}"))
        })?;

        let mut tables = Vec::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            match workbook.worksheet_range(&sheet_name) {
                Some(Ok(range)) => {
                    let grid = range
                        .rows()
                        .map(|row| row.iter().map(cell_text).collect())
                        .collect();
                    if let Some(table) = self.table_from_grid(&sheet_name, grid) {
                        tables.push(table);
                    }
                }
                Some(Err(err)) => {
                    return Err(IngestError::extraction(
                        &document.name,
                        format!("failed to read sheet '{}': {}", sheet_name, err),
                    ));
                }
                None => warn!("Sheet '{}' listed but not found", sheet_name),
            }
        }

        Ok(tables)
    }
}

/// Renders a cell the way it reads in the spreadsheet: integral numbers
/// lose their `.0` and date cells become ISO dates.
pub fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Float(v) => format_number(*v),
        DataType::Int(v) => v.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Error(e) => format!("#{e:?}"),
        DataType::Empty => String::new(),
        DataType::DateTime(v) => format_excel_date(*v).unwrap_or_else(|| format_number(*v)),
        DataType::DateTimeIso(s) => s.clone(),
        DataType::Duration(v) => format_number(*v),
        DataType::DurationIso(s) => s.clone(),
    }
}

/// Excel serials count days from 1899-12-30 in the 1900 date system.
fn excel_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if millis > i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}

fn format_excel_date(serial: f64) -> Option<String> {
    let datetime = excel_datetime(serial)?;
    if serial.fract() == 0.0 {
        Some(datetime.format("%Y-%m-%d").to_string())
    } else {
        Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentFormat;
    use crate::parser::fixtures::xlsx_with_sheets;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&DataType::Float(10.0)), "10");
        assert_eq!(cell_text(&DataType::Float(2.5)), "2.5");
        assert_eq!(cell_text(&DataType::Int(-4)), "-4");
        assert_eq!(cell_text(&DataType::Empty), "");
        assert_eq!(cell_text(&DataType::Bool(true)), "true");
    }

    #[test]
    fn test_cell_text_dates() {
        assert_eq!(cell_text(&DataType::DateTime(45200.0)), "2023-10-01");
        assert_eq!(cell_text(&DataType::DateTime(45200.5)), "2023-10-01 12:00:00");
        assert_eq!(cell_text(&DataType::DateTime(-1.0)), "-1");
    }

    #[test]
    fn test_table_from_grid_skips_blank_rows() {
        let extractor = XlsxExtractor::new();
        let table = extractor
            .table_from_grid(
                "Inventory",
                grid(&[
                    &["", ""],
                    &["Part Name", "Qty"],
                    &[" Nozzle ", "4"],
                    &["", " "],
                    &["Gasket", "12"],
                ]),
            )
            .unwrap();

        assert_eq!(table.name, "Inventory");
        assert_eq!(table.header, vec!["Part Name", "Qty"]);
        assert_eq!(table.rows, grid(&[&["Nozzle", "4"], &["Gasket", "12"]]));
    }

    #[test]
    fn test_header_only_sheet_is_dropped() {
        let extractor = XlsxExtractor::new();
        assert!(extractor
            .table_from_grid("Empty", grid(&[&["A", "B"]]))
            .is_none());
        assert!(extractor.table_from_grid("Blank", Vec::new()).is_none());
    }

    #[test]
    fn test_every_sheet_becomes_a_table() {
        let bytes = xlsx_with_sheets(&[
            (
                "Burner Parts",
                &[&["Part", "Qty"], &["Nozzle", "4"], &["Gasket", "12.5"]],
            ),
            ("Header Only", &[&["Note"]]),
            ("Valves", &[&["Valve", "Size"], &["Gate", "DN50"]]),
        ]);
        let doc = Document::new("stock.xlsx", bytes);
        assert_eq!(doc.format, Some(DocumentFormat::Xlsx));

        let tables = XlsxExtractor::new().extract(&doc).unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Burner Parts", "Valves"]);
        assert_eq!(tables[0].header, vec!["Part", "Qty"]);
        assert_eq!(tables[0].rows, grid(&[&["Nozzle", "4"], &["Gasket", "12.5"]]));
        assert_eq!(tables[1].rows, grid(&[&["Gate", "DN50"]]));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let doc = Document::new("parts.xlsx", b"not a workbook".to_vec());
        let err = XlsxExtractor::new().extract(&doc).unwrap_err();
        assert!(matches!(err, IngestError::Extraction { .. }));
    }
}
