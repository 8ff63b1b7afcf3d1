//! Tabular data sources.
//!
//! The first row holds the column names; every following non-blank row
//! becomes one [`Record`], fields in column order. Spreadsheets go through
//! calamine, delimited text through the csv crate.
//!
//! Numeric columns are typed as a whole: a column whose numbers are all
//! whole reads as integers, one with any fractional number reads as floats.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::detect::{detect_data_format, DataFormat};
use crate::error::{Error, Result};
use crate::model::{Record, Value};

/// Largest magnitude at which every f64 is still an exact integer.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Read every record of a data source.
///
/// `sheet` selects a worksheet by name; the first one is used otherwise.
/// It is ignored for delimited text.
pub fn read_records<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let records = match detect_data_format(path)? {
        DataFormat::Csv => read_csv_bytes(&std::fs::read(path)?)?,
        DataFormat::Spreadsheet => read_spreadsheet(path, sheet)?,
    };
    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Read one worksheet of a workbook.
pub fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let name = match sheet {
        Some(name) if sheet_names.iter().any(|n| n == name) => name.to_string(),
        Some(name) => {
            return Err(Error::DataSource(format!(
                "Worksheet '{}' not found in {} (available: {})",
                name,
                path.display(),
                sheet_names.join(", ")
            )))
        }
        None => sheet_names.first().cloned().ok_or_else(|| {
            Error::DataSource(format!("{} has no worksheets", path.display()))
        })?,
    };
    log::debug!("reading worksheet '{}'", name);

    let range = workbook.worksheet_range(&name)?;
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = column_names(header.iter().map(cell_text));
    let values = rows.map(|row| row.iter().map(cell_value).collect()).collect();
    Ok(build_records(&columns, values))
}

/// Read delimited text. The delimiter is guessed from the header line.
pub fn read_csv_bytes(data: &[u8]) -> Result<Vec<Record>> {
    let content = std::str::from_utf8(data)
        .map_err(|e| Error::DataSource(format!("CSV is not valid UTF-8: {}", e)))?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let delimiter = detect_delimiter(content);
    log::debug!("parsing CSV with delimiter {:?}", delimiter);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let columns = column_names(reader.headers()?.iter().map(str::to_string));
    let mut values = Vec::new();
    for row in reader.records() {
        values.push(row?.iter().map(parse_field).collect());
    }
    Ok(build_records(&columns, values))
}

/// Most frequent candidate delimiter on the first line, comma on a tie.
fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or_default();
    let mut best = (',', 0);
    for delimiter in [',', ';', '\t', '|'] {
        let count = first_line.matches(delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

/// Column names, with blanks and duplicates made unique.
fn column_names(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    raw.enumerate()
        .map(|(i, name)| {
            let name = if name.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            };
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}.{}", name, *count - 1)
            }
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => cell_value(other).to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(s) if s.is_empty() => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => whole_number(*f).map_or(Value::Float(*f), Value::Integer),
        Data::Int(i) => Value::Integer(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(Value::Float(dt.as_f64()), Value::Date),
        Data::DateTimeIso(s) => parse_iso_datetime(s).map_or_else(|| Value::Text(s.clone()), Value::Date),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}

fn whole_number(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() < EXACT_INTEGER_LIMIT).then_some(f as i64)
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Type one delimited-text field.
fn parse_field(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Empty;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    // Rejects "inf" and "NaN", which f64 parsing accepts.
    if trimmed.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::Text(field.to_string())
}

/// Pair rows with column names, skipping blank rows.
fn build_records(columns: &[String], mut rows: Vec<Vec<Value>>) -> Vec<Record> {
    unify_numeric_columns(columns.len(), &mut rows);
    rows.into_iter()
        .filter(|row| !row.iter().all(Value::is_empty))
        .map(|row| {
            let mut values = row.into_iter();
            columns
                .iter()
                .map(|name| (name.clone(), values.next().unwrap_or(Value::Empty)))
                .collect()
        })
        .collect()
}

/// Promote integers to floats in columns that hold any float.
fn unify_numeric_columns(width: usize, rows: &mut [Vec<Value>]) {
    for column in 0..width {
        let has_float = rows
            .iter()
            .any(|row| matches!(row.get(column), Some(Value::Float(_))));
        if !has_float {
            continue;
        }
        for row in rows.iter_mut() {
            if let Some(cell) = row.get_mut(column) {
                if let Value::Integer(i) = *cell {
                    *cell = Value::Float(i as f64);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\n1\t2"), '\t');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field(""), Value::Empty);
        assert_eq!(parse_field(" 42 "), Value::Integer(42));
        assert_eq!(parse_field("12.35"), Value::Float(12.35));
        assert_eq!(parse_field("TRUE"), Value::Bool(true));
        assert_eq!(parse_field("inf"), Value::Text("inf".to_string()));
        assert_eq!(parse_field("Wiliam"), Value::Text("Wiliam".to_string()));
    }

    #[test]
    fn test_column_names() {
        let names = column_names(
            ["name", "", "name", "city"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert_eq!(names, vec!["name", "Unnamed: 1", "name.1", "city"]);
    }

    #[test]
    fn test_read_csv_bytes() {
        let data = "\u{feff}name;brut_day;hours;city\nWiliam;12.345;35;Lyon\n;;;\nAda;12;38;\n";
        let records = read_csv_bytes(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(
            first.names().collect::<Vec<_>>(),
            vec!["name", "brut_day", "hours", "city"]
        );
        assert_eq!(first.get("name"), Some(&Value::Text("Wiliam".to_string())));
        assert_eq!(first.get("hours"), Some(&Value::Integer(35)));

        // The float column types the whole number as a float too.
        assert_eq!(records[1].get("brut_day"), Some(&Value::Float(12.0)));
        assert_eq!(records[1].get("city"), Some(&Value::Empty));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let records = read_csv_bytes(b"a,b,c\n1\n").unwrap();
        assert_eq!(records[0].len(), 3);
        assert_eq!(records[0].get("c"), Some(&Value::Empty));
    }

    #[test]
    fn test_cell_value() {
        assert_eq!(cell_value(&Data::Float(35.0)), Value::Integer(35));
        assert_eq!(cell_value(&Data::Float(12.5)), Value::Float(12.5));
        assert_eq!(cell_value(&Data::String(String::new())), Value::Empty);
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-03-01".to_string())),
            Value::Date(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_read_records_from_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"name,first_name\nTuring,Alan\n").unwrap();

        let records = read_records(file.path(), Some("ignored")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("first_name"),
            Some(&Value::Text("Alan".to_string()))
        );
    }

    /// Write a one-sheet workbook with inline-string cells.
    fn write_workbook(sheet: &str, rows: &[&[&str]]) -> tempfile::NamedTempFile {
        use zip::write::SimpleFileOptions;

        let mut sheet_xml = String::from(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet_xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                if cell.parse::<f64>().is_ok() {
                    sheet_xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, cell));
                } else if !cell.is_empty() {
                    sheet_xml.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference, cell
                    ));
                }
            }
            sheet_xml.push_str("</row>");
        }
        sheet_xml.push_str("</sheetData></worksheet>");

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    sheet
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let data = writer.finish().unwrap().into_inner();

        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(&data).unwrap();
        file
    }

    #[test]
    fn test_read_spreadsheet() {
        let file = write_workbook(
            "Staff",
            &[
                &["name", "first_name", "brut_day", "days", "name"],
                &["Wiliam", "John", "12.3456", "5", "dup"],
                &[],
                &["Doe", "Jane", "20", "3"],
            ],
        );

        let records = read_records(file.path(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].names().collect::<Vec<_>>(),
            vec!["name", "first_name", "brut_day", "days", "name.1"]
        );
        assert_eq!(records[0].get("name"), Some(&Value::Text("Wiliam".to_string())));
        assert_eq!(records[0].get("brut_day"), Some(&Value::Float(12.3456)));
        assert_eq!(records[0].get("days"), Some(&Value::Integer(5)));
        assert_eq!(records[1].get("brut_day"), Some(&Value::Float(20.0)));
        assert_eq!(records[1].get("name.1"), Some(&Value::Empty));

        let named = read_spreadsheet(file.path(), Some("Staff")).unwrap();
        assert_eq!(named, records);
    }

    #[test]
    fn test_unknown_worksheet() {
        let file = write_workbook("Staff", &[&["name"], &["Ada"]]);
        let result = read_spreadsheet(file.path(), Some("Payroll"));
        assert!(
            matches!(result, Err(Error::DataSource(ref msg)) if msg.contains("available: Staff"))
        );
    }

    #[test]
    fn test_missing_spreadsheet_fails() {
        let result = read_records("/nonexistent/employees.xlsx", None);
        assert!(result.is_err());
    }
}
