// file: src/parser/docx.rs
// description: Word table extraction from word/document.xml
// reference: https://docs.rs/quick-xml, ECMA-376 WordprocessingML tables

use crate::error::{IngestError, Result};
use crate::models::{Document, ExtractedTable};
use crate::parser::{HeaderNormalizer, TableExtractor};
use quick_xml::Reader as XmlReader;
use quick_xml::events::{BytesStart, Event};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

const DOC_XML_PATH: &str = "word/document.xml";

/// Raw cell grid of one top-level table, before naming and header handling.
pub type RawTable = Vec<Vec<String>>;

pub struct DocxExtractor {
    normalizer: HeaderNormalizer,
}

impl DocxExtractor {
    pub fn new() -> Self {
        Self {
            normalizer: HeaderNormalizer::new(),
        }
    }

    fn read_document_xml(document: &Document) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(document.bytes.as_slice())).map_err(|e| {
            IngestError::extraction(&document.name, format!("not a Word archive: {}", e))
        })?;

        let mut file = archive.by_name(DOC_XML_PATH).map_err(|e| {
            IngestError::extraction(&document.name, format!("missing {}: {}", DOC_XML_PATH, e))
        })?;

        let mut xml = String::new();
        file.read_to_string(&mut xml).map_err(|e| {
            IngestError::extraction(&document.name, format!("unreadable {}: {}", DOC_XML_PATH, e))
        })?;

        Ok(xml)
    }

    /// Turns raw grids into named tables.
    ///
    /// Row 0, cell 0 names the table, row 1 is the header, the rest is data.
    /// Tables without a header row or without data rows are dropped.
    pub fn tables_from_grids(&self, grids: Vec<RawTable>) -> Vec<ExtractedTable> {
        let mut tables = Vec::new();

        for (ordinal, grid) in grids.into_iter().enumerate() {
            if grid.is_empty() {
                continue;
            }

            let name = grid[0]
                .first()
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .unwrap_or_else(|| format!("Table {}", ordinal + 1));

            if grid.len() < 2 {
                debug!("Table '{}' has no header row, skipping", name);
                continue;
            }

            let header = self.normalizer.header_from_cells(grid[1].as_slice());

            let rows: Vec<Vec<String>> = grid[2..]
                .iter()
                .map(|row| row.iter().map(|cell| cell.trim().to_string()).collect())
                .collect();

            if rows.is_empty() {
                debug!("Table '{}' has no data rows, skipping", name);
                continue;
            }

            tables.push(ExtractedTable::new(name, header, rows));
        }

        tables
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TableExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, document: &Document) -> Result<Vec<ExtractedTable>> {
        let xml = Self::read_document_xml(document)?;
        let grids = parse_table_grids(&xml)
            .map_err(|message| IngestError::extraction(&document.name, message))?;

        debug!("Found {} top-level tables in {}", grids.len(), document.name);
        Ok(self.tables_from_grids(grids))
    }
}

#[derive(Default)]
struct CellState {
    paragraphs: Vec<String>,
    span: usize,
    continues_merge: bool,
}

#[derive(Default)]
struct GridWalker {
    grids: Vec<RawTable>,
    table_depth: usize,
    textbox_depth: usize,
    current_table: RawTable,
    current_row: Option<Vec<String>>,
    previous_row: Vec<String>,
    current_cell: Option<CellState>,
    in_run: bool,
    in_text: bool,
}

impl GridWalker {
    fn active(&self) -> bool {
        self.table_depth == 1 && self.textbox_depth == 0
    }

    fn open(&mut self, element: &BytesStart<'_>, self_closing: bool) {
        let local = element.local_name();
        let name = local.as_ref();

        match name {
            b"tbl" if !self_closing => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.current_table = Vec::new();
                    self.previous_row.clear();
                }
            }
            b"txbxContent" if !self_closing => self.textbox_depth += 1,
            _ if !self.active() => {}
            b"tr" if !self_closing => self.current_row = Some(Vec::new()),
            b"tc" if !self_closing => {
                self.current_cell = Some(CellState {
                    span: 1,
                    ..CellState::default()
                })
            }
            b"p" => {
                if let Some(cell) = self.current_cell.as_mut() {
                    cell.paragraphs.push(String::new());
                }
            }
            b"r" if !self_closing => self.in_run = true,
            b"t" if !self_closing && self.in_run => self.in_text = true,
            b"tab" if self.in_run => self.push_text("\t"),
            b"br" | b"cr" if self.in_run => self.push_text("\n"),
            b"gridSpan" => {
                let span = attribute(element, b"val")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                if let Some(cell) = self.current_cell.as_mut() {
                    cell.span = span;
                }
            }
            b"vMerge" => {
                let restart = attribute(element, b"val").is_some_and(|v| v == "restart");
                if let Some(cell) = self.current_cell.as_mut() {
                    cell.continues_merge = !restart;
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"tbl" => {
                if self.table_depth == 1 {
                    self.grids.push(std::mem::take(&mut self.current_table));
                }
                self.table_depth = self.table_depth.saturating_sub(1);
            }
            b"txbxContent" => self.textbox_depth = self.textbox_depth.saturating_sub(1),
            _ if !self.active() => {}
            b"tr" => {
                if let Some(row) = self.current_row.take() {
                    self.previous_row = row.clone();
                    self.current_table.push(row);
                }
            }
            b"tc" => self.finish_cell(),
            b"r" => {
                self.in_run = false;
                self.in_text = false;
            }
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn finish_cell(&mut self) {
        let Some(cell) = self.current_cell.take() else {
            return;
        };
        let Some(row) = self.current_row.as_mut() else {
            return;
        };

        let text = if cell.continues_merge {
            self.previous_row.get(row.len()).cloned().unwrap_or_default()
        } else {
            cell.paragraphs.join("\n")
        };

        for _ in 0..cell.span {
            row.push(text.clone());
        }
    }

    fn text(&mut self, content: &str) {
        if self.active() && self.in_text {
            self.push_text(content);
        }
    }

    fn push_text(&mut self, content: &str) {
        if let Some(cell) = self.current_cell.as_mut() {
            match cell.paragraphs.last_mut() {
                Some(paragraph) => paragraph.push_str(content),
                None => cell.paragraphs.push(content.to_string()),
            }
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Walks the document body and returns the cell grid of each top-level table.
///
/// Nested tables and text boxes are ignored. Horizontally merged cells are
/// repeated per spanned grid column and vertical-merge continuations repeat
/// the cell above.
pub fn parse_table_grids(xml: &str) -> std::result::Result<Vec<RawTable>, String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut walker = GridWalker::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => walker.open(&e, false),
            Ok(Event::Empty(e)) => walker.open(&e, true),
            Ok(Event::End(e)) => walker.close(e.local_name().as_ref()),
            Ok(Event::Text(t)) => {
                let content = t
                    .unescape()
                    .map_err(|e| format!("bad text at byte {}: {}", reader.buffer_position(), e))?;
                walker.text(&content);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed {} at byte {}: {}",
                    DOC_XML_PATH,
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(walker.grids)
}
