//! # mailmerge
//!
//! Fill PDF templates with `{field}` placeholders, one document per data
//! record.
//!
//! Each placeholder is replaced in place: the new text is drawn with the
//! font, size, and color the placeholder had, and the placeholder itself
//! is removed from the page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailmerge::{fill_template_file, FillOptions, Record};
//!
//! fn main() -> mailmerge::Result<()> {
//!     let record = Record::new()
//!         .with("name", "Wiliam")
//!         .with("brut_day", "12.35");
//!
//!     let report = fill_template_file("contract.pdf", "out.pdf", &record, FillOptions::default())?;
//!     println!("{} placeholders replaced", report.replacements);
//!     Ok(())
//! }
//! ```
//!
//! A whole batch is driven by a JSON configuration naming the template,
//! the data source, and the output directory:
//!
//! ```no_run
//! let report = mailmerge::run_config("config.json")?;
//! assert!(report.is_success());
//! # Ok::<(), mailmerge::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Format-preserving substitution**: font, size, and color are kept
//! - **Display formats**: `.2f`, `>10`, `,d` and friends per field
//! - **Compound fields**: configurable fields joined from other fields
//! - **Data sources**: xlsx, xls, ods through calamine, CSV through csv
//! - **Parallel batches**: records filled on the rayon thread pool

pub mod batch;
pub mod compound;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod format;
pub mod formatter;
pub mod model;
pub mod pdf;
pub mod placeholder;
pub mod source;

// Re-export commonly used types
pub use batch::{Batch, BatchReport, GeneratedDocument, RecordFailure};
pub use compound::{default_rules, CompoundRule};
pub use config::Config;
pub use detect::{
    detect_data_format, detect_format_from_bytes, detect_format_from_path, is_pdf, DataFormat,
    PdfFormat,
};
pub use diagnostics::{CollectingDiagnostics, Diagnostics, LogDiagnostics, Warning};
pub use document::{MemoryPage, MemoryTemplate, Page, Template, TextRun};
pub use engine::{
    CommitMode, FillOptions, FillReport, NameOrder, SubstitutionEngine, MISSING_VALUE,
};
pub use error::{Error, Result};
pub use formatter::RecordFormatter;
pub use model::{Color, FormatSpec, Point, Rect, Record, StyledSpan, Value};
pub use pdf::{PdfPage, PdfTemplate};
pub use placeholder::extract_placeholders;
pub use source::read_records;

use std::path::Path;

/// Fill a PDF template file with one record and save the result.
///
/// Warnings go to the `log` facade. The record is used as given; run it
/// through a [`RecordFormatter`] first to apply display formats and
/// compound fields.
///
/// # Example
///
/// ```no_run
/// use mailmerge::{fill_template_file, FillOptions, Record};
///
/// let record = Record::new().with("name", "Ada");
/// fill_template_file("letter.pdf", "letter_ada.pdf", &record, FillOptions::default()).unwrap();
/// ```
pub fn fill_template_file<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    output: Q,
    record: &Record,
    options: FillOptions,
) -> Result<FillReport> {
    let mut template = PdfTemplate::open(template)?;
    let report = SubstitutionEngine::new(options, &LogDiagnostics).fill(&mut template, record)?;
    template.save(output.as_ref())?;
    Ok(report)
}

/// Fill PDF bytes with one record and return the new document.
pub fn fill_template_bytes(
    data: &[u8],
    record: &Record,
    options: FillOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<(Vec<u8>, FillReport)> {
    let mut template = PdfTemplate::from_bytes(data)?;
    let report = SubstitutionEngine::new(options, diagnostics).fill(&mut template, record)?;
    Ok((template.to_bytes()?, report))
}

/// Load a configuration file and run its batch.
///
/// Loading errors are returned; per-record errors are listed in the
/// report.
pub fn run_config<P: AsRef<Path>>(path: P) -> Result<BatchReport> {
    let config = Config::load(path)?;
    Batch::from_config(&config)?.run(&LogDiagnostics)
}
