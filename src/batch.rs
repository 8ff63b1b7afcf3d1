//! Batch driver: one filled document per record.
//!
//! # Example
//!
//! ```no_run
//! use mailmerge::{Batch, Config, LogDiagnostics};
//!
//! fn main() -> mailmerge::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let report = Batch::from_config(&config)?.run(&LogDiagnostics)?;
//!     println!("{} documents, {} failures", report.outputs.len(), report.failures.len());
//!     Ok(())
//! }
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{
    Config, DEFAULT_DATE_FIELD, DEFAULT_DATE_FORMAT, DEFAULT_NAME_FIELD, DEFAULT_OUTPUT_PREFIX,
};
use crate::detect::detect_format_from_bytes;
use crate::diagnostics::Diagnostics;
use crate::document::Template;
use crate::engine::{FillOptions, FillReport, SubstitutionEngine};
use crate::error::{Error, Result};
use crate::formatter::RecordFormatter;
use crate::model::Record;
use crate::pdf::PdfTemplate;
use crate::source::read_records;

/// A document written by the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    /// 1-based record index
    pub index: usize,
    pub path: PathBuf,
    pub report: FillReport,
}

/// A record that produced no document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFailure {
    /// 1-based record index
    pub index: usize,
    pub error: String,
}

/// Outcome of a batch run, in record order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outputs: Vec<GeneratedDocument>,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    /// Number of records processed.
    pub fn total(&self) -> usize {
        self.outputs.len() + self.failures.len()
    }

    /// Check if every record produced a document.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Field stamped with the run date.
#[derive(Debug, Clone)]
struct DateStamp {
    field: String,
    format: String,
}

/// Fills a template once per record.
#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<Record>,
    template: Vec<u8>,
    output_dir: PathBuf,
    formatter: RecordFormatter,
    fill_options: FillOptions,
    output_prefix: String,
    name_field: String,
    date_stamp: Option<DateStamp>,
    now: NaiveDateTime,
    parallel: bool,
}

impl Batch {
    /// Create a batch over in-memory records and template bytes.
    pub fn new(records: Vec<Record>, template: Vec<u8>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let format = detect_format_from_bytes(&template)?;
        log::debug!("template is {}", format);

        Ok(Self {
            records,
            template,
            output_dir: output_dir.into(),
            formatter: RecordFormatter::default(),
            fill_options: FillOptions::default(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            name_field: DEFAULT_NAME_FIELD.to_string(),
            date_stamp: Some(DateStamp {
                field: DEFAULT_DATE_FIELD.to_string(),
                format: DEFAULT_DATE_FORMAT.to_string(),
            }),
            now: Local::now().naive_local(),
            parallel: false,
        })
    }

    /// Load the records and the template named by `config`.
    ///
    /// The template file is read once; every record gets its own copy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let records = read_records(&config.data_source, config.sheet.as_deref())?;
        let template = std::fs::read(&config.template)?;

        Ok(Self::new(records, template, &config.output_dir)?
            .with_formatter(RecordFormatter::new(
                config.format_specs.clone(),
                config.compound_rules.clone(),
            ))
            .with_output_prefix(&config.output_prefix)
            .with_name_field(&config.name_field)
            .with_date_stamp(&config.date_field, &config.date_format))
    }

    pub fn with_formatter(mut self, formatter: RecordFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_fill_options(mut self, options: FillOptions) -> Self {
        self.fill_options = options;
        self
    }

    /// Process records on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    /// Set the field used in output file names.
    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = field.into();
        self
    }

    /// Stamp `field` with the run date, formatted with a strftime pattern.
    pub fn with_date_stamp(mut self, field: impl Into<String>, format: impl Into<String>) -> Self {
        self.date_stamp = Some(DateStamp {
            field: field.into(),
            format: format.into(),
        });
        self
    }

    /// Leave records without a date field as they are.
    pub fn without_date_stamp(mut self) -> Self {
        self.date_stamp = None;
        self
    }

    /// Fix the run date.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Process every record.
    pub fn run(&self, diagnostics: &dyn Diagnostics) -> Result<BatchReport> {
        self.run_with_progress(diagnostics, |_| {})
    }

    /// Process every record, calling `on_record` with each finished
    /// 1-based index.
    ///
    /// A failing record is logged and reported; the others still run.
    pub fn run_with_progress<F>(&self, diagnostics: &dyn Diagnostics, on_record: F) -> Result<BatchReport>
    where
        F: Fn(usize) + Send + Sync,
    {
        std::fs::create_dir_all(&self.output_dir)?;
        let total = self.records.len();

        let process = |(i, record): (usize, &Record)| {
            let index = i + 1;
            log::info!("Processing record {}/{}", index, total);
            let result = self.process_record(index, record, diagnostics);
            on_record(index);
            (index, result)
        };
        let results: Vec<(usize, Result<GeneratedDocument>)> = if self.parallel {
            self.records.par_iter().enumerate().map(process).collect()
        } else {
            self.records.iter().enumerate().map(process).collect()
        };

        let mut report = BatchReport::default();
        for (index, result) in results {
            match result {
                Ok(document) => report.outputs.push(document),
                Err(e) => {
                    log::error!("record {} failed: {}", index, e);
                    report.failures.push(RecordFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Fill and save the document of one record.
    pub fn process_record(
        &self,
        index: usize,
        record: &Record,
        diagnostics: &dyn Diagnostics,
    ) -> Result<GeneratedDocument> {
        let record = self.formatter.normalize(&self.stamp(record)?)?;

        let mut template = PdfTemplate::from_bytes(&self.template)?;
        let report = SubstitutionEngine::new(self.fill_options.clone(), diagnostics)
            .fill(&mut template, &record)?;

        let path = self.output_path(index, &record);
        template.save(&path)?;
        log::info!("saved to {}", path.display());

        Ok(GeneratedDocument {
            index,
            path,
            report,
        })
    }

    /// Copy of `record` with the date field set.
    fn stamp(&self, record: &Record) -> Result<Record> {
        let mut record = record.clone();
        if let Some(stamp) = &self.date_stamp {
            let mut today = String::new();
            write!(today, "{}", self.now.format(&stamp.format))
                .map_err(|_| Error::Config(format!("Invalid date format '{}'", stamp.format)))?;
            record.insert(stamp.field.clone(), today);
        }
        Ok(record)
    }

    /// `{prefix}_{index}_{name}.pdf` inside the output directory.
    pub fn output_path(&self, index: usize, record: &Record) -> PathBuf {
        let name = record
            .get(&self.name_field)
            .map(|value| value.to_string())
            .filter(|name| !name.trim().is_empty());
        let file_name = match name {
            Some(name) => format!(
                "{}_{}_{}.pdf",
                self.output_prefix,
                index,
                sanitize_file_component(&name)
            ),
            _ => {
                log::warn!(
                    "record {} has no '{}' field, naming its document by index",
                    index,
                    self.name_field
                );
                format!("{}_{}.pdf", self.output_prefix, index)
            }
        };
        self.output_dir.join(file_name)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Replace characters that cannot appear in a file name.
fn sanitize_file_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
