// file: src/parser/fixtures.rs
// description: in-memory Word, Excel and PDF documents for tests
// reference: https://docs.rs/zip

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

const W_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const SHEET_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Wraps body XML in a minimal `.docx` archive.
pub fn docx_from_body(body: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        W_NAMESPACE, body
    );

    zip_entries(&[("word/document.xml", xml)])
}

fn zip_entries(entries: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds a `.docx` with one table per entry, one cell paragraph per string.
pub fn docx_with_tables(tables: &[&[&[&str]]]) -> Vec<u8> {
    let mut body = String::new();

    for table in tables {
        body.push_str("<w:tbl>");
        for row in table.iter() {
            body.push_str("<w:tr>");
            for cell in row.iter() {
                body.push_str(&format!(
                    r#"<w:tc><w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
                    escape(cell)
                ));
            }
            body.push_str("</w:tr>");
        }
        body.push_str("</w:tbl><w:p/>");
    }

    docx_from_body(&body)
}

/// Column letter for a zero-based index, enough for test widths.
fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

/// Builds an `.xlsx` with one worksheet per `(name, rows)` entry. Cells that
/// parse as numbers are written as numeric cells, the rest as shared strings.
pub fn xlsx_with_sheets(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut shared: Vec<String> = Vec::new();
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut sheet_refs = String::new();
    let mut sheet_rels = String::new();
    let mut overrides = String::new();

    for (sheet_idx, (name, rows)) in sheets.iter().enumerate() {
        let number = sheet_idx + 1;
        let mut data = String::new();

        for (row_idx, row) in rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, row_idx + 1));
            for (col_idx, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", column_letter(col_idx), row_idx + 1);
                if cell.parse::<f64>().is_ok() {
                    data.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, cell));
                } else {
                    shared.push(escape(cell));
                    data.push_str(&format!(
                        r#"<c r="{}" t="s"><v>{}</v></c>"#,
                        reference,
                        shared.len() - 1
                    ));
                }
            }
            data.push_str("</row>");
        }

        entries.push((
            format!("xl/worksheets/sheet{}.xml", number),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
                SHEET_NAMESPACE, data
            ),
        ));
        sheet_refs.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(name),
            number,
            number
        ));
        sheet_rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            number, REL_NAMESPACE, number
        ));
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            number
        ));
    }

    let strings_rel = sheets.len() + 1;
    sheet_rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="{}/sharedStrings" Target="sharedStrings.xml"/>"#,
        strings_rel, REL_NAMESPACE
    ));

    let shared_xml = shared
        .iter()
        .map(|text| format!("<si><t>{}</t></si>", text))
        .collect::<String>();

    let mut files = vec![
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{}<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#,
                overrides
            ),
        ),
        (
            "_rels/.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
                PACKAGE_REL_NAMESPACE, REL_NAMESPACE
            ),
        ),
        (
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{}" xmlns:r="{}"><sheets>{}</sheets></workbook>"#,
                SHEET_NAMESPACE, REL_NAMESPACE, sheet_refs
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}">{}</Relationships>"#,
                PACKAGE_REL_NAMESPACE, sheet_rels
            ),
        ),
        (
            "xl/sharedStrings.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{}" count="{}" uniqueCount="{}">{}</sst>"#,
                SHEET_NAMESPACE,
                shared.len(),
                shared.len(),
                shared_xml
            ),
        ),
    ];
    files.extend(entries);

    let borrowed: Vec<(&str, String)> = files
        .iter()
        .map(|(name, content)| (name.as_str(), content.clone()))
        .collect();
    zip_entries(&borrowed)
}

/// Builds a one-page PDF showing each line in Helvetica, with a valid xref
/// table so strict readers accept it.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td 14 TL");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!(" ({}) Tj T*", escaped));
    }
    content.push_str(" ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (idx, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", idx + 1, body));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    pdf.into_bytes()
}
