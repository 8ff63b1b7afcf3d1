//! Input format detection: PDF templates and tabular data sources.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// Kind of tabular data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Delimited text (comma, semicolon, tab, or pipe)
    Csv,
    /// Workbook readable by calamine (xlsx, xlsm, xlsb, xls, ods)
    Spreadsheet,
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Zip container (xlsx, xlsm, xlsb, ods)
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE compound file (xls)
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Detect PDF format from a file path.
///
/// # Example
/// ```no_run
/// use mailmerge::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("template.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut header = [0u8; 16];
    let read = reader.read(&mut header)?;
    detect_format_from_bytes(&header[..read])
}

/// Detect PDF format from bytes.
///
/// # Returns
/// * `Ok(PdfFormat)` if the data starts with valid PDF header
/// * `Err(Error::UnknownFormat)` if the data is not a PDF
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    if data.len() < PDF_MAGIC_LEN + VERSION_LEN || !data.starts_with(PDF_MAGIC) {
        return Err(Error::UnknownFormat);
    }

    let version_bytes = &data[PDF_MAGIC_LEN..PDF_MAGIC_LEN + VERSION_LEN];
    let version = String::from_utf8_lossy(version_bytes).to_string();
    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfFormat { version })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    matches!(version.as_bytes(), [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit())
}

/// Check if a file is a valid PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes represent a valid PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

/// Detect the kind of a data source, by extension first and by content
/// when the extension says nothing.
pub fn detect_data_format<P: AsRef<Path>>(path: P) -> Result<DataFormat> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => Ok(DataFormat::Spreadsheet),
        Some(ext) if CSV_EXTENSIONS.contains(&ext) => Ok(DataFormat::Csv),
        _ => {
            let mut head = [0u8; 512];
            let read = File::open(path)?.read(&mut head)?;
            detect_data_format_from_bytes(&head[..read]).ok_or_else(|| {
                Error::DataSource(format!("Unrecognized data source: {}", path.display()))
            })
        }
    }
}

/// Guess a data source kind from its first bytes.
pub fn detect_data_format_from_bytes(data: &[u8]) -> Option<DataFormat> {
    if data.starts_with(ZIP_MAGIC) || data.starts_with(OLE_MAGIC) {
        return Some(DataFormat::Spreadsheet);
    }
    if data.is_empty() || data.contains(&0) {
        return None;
    }
    match std::str::from_utf8(data) {
        Ok(_) => Some(DataFormat::Csv),
        // A multi-byte character cut at the end of the sample
        Err(e) if e.error_len().is_none() => Some(DataFormat::Csv),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let format = detect_format_from_bytes(data).unwrap();
        assert_eq!(format.version, "1.7");
        assert_eq!(format.to_string(), "PDF 1.7");
    }

    #[test]
    fn test_detect_invalid_format() {
        let result = detect_format_from_bytes(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(Error::UnknownFormat)));

        let result = detect_format_from_bytes(b"%PDF");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_unsupported_version() {
        let result = detect_format_from_bytes(b"%PDF-x.y\n");
        assert!(matches!(result, Err(Error::UnsupportedVersion(v)) if v == "x.y"));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.4\n"));
        assert!(!is_pdf_bytes(b"Not a PDF"));
    }

    #[test]
    fn test_data_format_from_bytes() {
        assert_eq!(
            detect_data_format_from_bytes(b"PK\x03\x04rest"),
            Some(DataFormat::Spreadsheet)
        );
        assert_eq!(
            detect_data_format_from_bytes(OLE_MAGIC),
            Some(DataFormat::Spreadsheet)
        );
        assert_eq!(
            detect_data_format_from_bytes("name;city\nZoé;Lyon".as_bytes()),
            Some(DataFormat::Csv)
        );
        // "é" cut in half
        assert_eq!(
            detect_data_format_from_bytes(b"name\nZo\xc3"),
            Some(DataFormat::Csv)
        );
        assert_eq!(detect_data_format_from_bytes(b"\x00\x01\x02"), None);
    }

    #[test]
    fn test_data_format_from_path() {
        assert_eq!(
            detect_data_format("employees.XLSX").unwrap(),
            DataFormat::Spreadsheet
        );
        assert_eq!(detect_data_format("staff.csv").unwrap(), DataFormat::Csv);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name,city\nAda,London\n").unwrap();
        assert_eq!(detect_data_format(file.path()).unwrap(), DataFormat::Csv);
    }
}
