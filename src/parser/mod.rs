// file: src/parser/mod.rs
// description: table extraction module exports and format dispatch
// reference: internal module structure

pub mod docx;
pub mod normalizer;
pub mod pdf;
pub mod xlsx;

#[cfg(test)]
pub(crate) mod fixtures;

pub use docx::DocxExtractor;
pub use normalizer::HeaderNormalizer;
pub use pdf::PdfExtractor;
pub use xlsx::XlsxExtractor;

use crate::error::{IngestError, Result};
use crate::models::{Document, DocumentFormat, ExtractedTable};

/// Turns one uploaded document into zero or more tables.
///
/// Implementations are pure functions of the document bytes.
pub trait TableExtractor {
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Document) -> Result<Vec<ExtractedTable>>;
}

pub fn extractor_for(format: DocumentFormat) -> Box<dyn TableExtractor> {
    match format {
        DocumentFormat::Docx => Box::new(DocxExtractor::new()),
        DocumentFormat::Xlsx => Box::new(XlsxExtractor::new()),
        DocumentFormat::Pdf => Box::new(PdfExtractor::new()),
    }
}

/// Extracts tables with the extractor matching the detected format.
pub fn extract_tables(document: &Document) -> Result<Vec<ExtractedTable>> {
    let format = document.format.ok_or_else(|| {
        IngestError::extraction(&document.name, "unsupported document format")
    })?;

    extractor_for(format).extract(document)
}
