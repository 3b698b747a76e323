// file: src/parser/pdf.rs
// description: PDF text block extraction into a two-column table
// reference: https://docs.rs/pdf-extract

use crate::error::{IngestError, Result};
use crate::models::{Document, ExtractedTable};
use crate::parser::TableExtractor;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

pub const BLOCK_COLUMN: &str = "block";
pub const TEXT_COLUMN: &str = "text";

lazy_static! {
    static ref BLANK_LINES: Regex = Regex::new(r"\n[ \t\r\x0c]*\n").expect("BLANK_LINES regex is valid");
    static ref INLINE_SPACE: Regex = Regex::new(r"[ \t]+").expect("INLINE_SPACE regex is valid");
}

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Splits extracted text into blocks separated by blank lines.
    pub fn split_blocks(text: &str) -> Vec<String> {
        let text = text.replace("\r\n", "\n").replace('\x0c', "\n\n");

        BLANK_LINES
            .split(&text)
            .map(|block| {
                block
                    .lines()
                    .map(|line| INLINE_SPACE.replace_all(line.trim(), " ").to_string())
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|block| !block.is_empty())
            .collect()
    }

    pub fn table_from_text(name: &str, text: &str) -> Option<ExtractedTable> {
        let rows: Vec<Vec<String>> = Self::split_blocks(text)
            .into_iter()
            .enumerate()
            .map(|(idx, block)| vec![(idx + 1).to_string(), block])
            .collect();

        if rows.is_empty() {
            return None;
        }

        Some(ExtractedTable::new(
            name,
            vec![BLOCK_COLUMN.to_string(), TEXT_COLUMN.to_string()],
            rows,
        ))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TableExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, document: &Document) -> Result<Vec<ExtractedTable>> {
        // font parsing inside pdf-extract can panic on some embedded fonts
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&document.bytes)
        }));

        let text = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(IngestError::extraction(&document.name, e.to_string())),
            Err(_) => {
                return Err(IngestError::extraction(
                    &document.name,
                    "PDF text extraction panicked",
                ));
            }
        };

        let table = Self::table_from_text(&document.stem(), &text);
        debug!(
            "Extracted {} text blocks from {}",
            table.as_ref().map(|t| t.rows.len()).unwrap_or(0),
            document.name
        );

        Ok(table.into_iter().collect())
    }
}
