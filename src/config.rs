//! Batch configuration, read from a JSON file.
//!
//! ```json
//! {
//!     "output directory path": "out",
//!     "EXCEL employees data path": "employees.xlsx",
//!     "PDF contract template path": "contract.pdf",
//!     "format employee specs": { "brut_day": ".2f" }
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::compound::{default_rules, CompoundRule};
use crate::error::{Error, Result};
use crate::model::FormatSpec;

pub const DEFAULT_OUTPUT_PREFIX: &str = "contract";
pub const DEFAULT_NAME_FIELD: &str = "name";
pub const DEFAULT_DATE_FIELD: &str = "date";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving the generated documents
    #[serde(rename = "output directory path")]
    pub output_dir: PathBuf,

    /// Spreadsheet or CSV file, one record per row
    #[serde(
        rename = "EXCEL employees data path",
        alias = "tabular data source path",
        alias = "data source path"
    )]
    pub data_source: PathBuf,

    /// PDF template containing `{field}` placeholders
    #[serde(rename = "PDF contract template path", alias = "template path")]
    pub template: PathBuf,

    /// Display format per field
    #[serde(
        rename = "format employee specs",
        alias = "format specs",
        default
    )]
    pub format_specs: FormatSpec,

    /// Derived fields, evaluated in order
    #[serde(rename = "compound placeholders", default = "default_rules")]
    pub compound_rules: Vec<CompoundRule>,

    #[serde(rename = "output file prefix", default = "default_output_prefix")]
    pub output_prefix: String,

    /// Field used to name generated files
    #[serde(rename = "name field", default = "default_name_field")]
    pub name_field: String,

    /// Field stamped with the current date before formatting
    #[serde(rename = "date field", default = "default_date_field")]
    pub date_field: String,

    #[serde(rename = "date format", default = "default_date_format")]
    pub date_format: String,

    /// Worksheet name; the first sheet when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

fn default_output_prefix() -> String {
    DEFAULT_OUTPUT_PREFIX.to_string()
}

fn default_name_field() -> String {
    DEFAULT_NAME_FIELD.to_string()
}

fn default_date_field() -> String {
    DEFAULT_DATE_FIELD.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl Config {
    /// Create a configuration with default optional settings.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        data_source: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            data_source: data_source.into(),
            template: template.into(),
            format_specs: FormatSpec::default(),
            compound_rules: default_rules(),
            output_prefix: default_output_prefix(),
            name_field: default_name_field(),
            date_field: default_date_field(),
            date_format: default_date_format(),
            sheet: None,
        }
    }

    /// Load and validate a configuration file.
    ///
    /// Relative paths inside the file are taken relative to the file's
    /// own directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config = Self::from_json(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate configuration JSON. Paths are kept as written.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Config(format!(
                "Invalid date format '{}'",
                self.date_format
            )));
        }
        if self.name_field.is_empty() {
            return Err(Error::Config("'name field' must not be empty".to_string()));
        }
        if let Some(rule) = self.compound_rules.iter().find(|r| r.sources.is_empty()) {
            return Err(Error::Config(format!(
                "Compound placeholder '{}' has no sources",
                rule.target
            )));
        }
        Ok(())
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.output_dir,
            &mut self.data_source,
            &mut self.template,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "output directory path": "out",
        "EXCEL employees data path": "employees.xlsx",
        "PDF contract template path": "contract.pdf",
        "format employee specs": {"brut_day": ".2f"}
    }"#;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.format_specs.get("brut_day"), Some(".2f"));
        assert_eq!(config.compound_rules, default_rules());
        assert_eq!(config.output_prefix, "contract");
        assert_eq!(config.name_field, "name");
        assert_eq!(config.date_format, "%Y-%m-%d");
        assert_eq!(config.sheet, None);
    }

    #[test]
    fn test_aliases_and_rules() {
        let json = r#"{
            "output directory path": "out",
            "data source path": "staff.csv",
            "template path": "letter.pdf",
            "compound placeholders": [
                {"target": "full", "sources": ["first", "last"]},
                {"target": "address", "sources": ["street", "city"], "separator": " - "}
            ],
            "output file prefix": "letter",
            "sheet": "Staff"
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.data_source, PathBuf::from("staff.csv"));
        assert_eq!(config.template, PathBuf::from("letter.pdf"));
        assert!(config.format_specs.is_empty());
        assert_eq!(config.compound_rules.len(), 2);
        assert_eq!(config.compound_rules[0].separator, " ");
        assert_eq!(config.compound_rules[1].separator, " - ");
        assert_eq!(config.output_prefix, "letter");
        assert_eq!(config.sheet.as_deref(), Some("Staff"));
    }

    #[test]
    fn test_missing_required_key() {
        let json = r#"{"output directory path": "out"}"#;
        assert!(matches!(Config::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_date_format() {
        let mut config = Config::new("out", "data.csv", "t.pdf");
        config.date_format = "%Y-%Q".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(MINIMAL.as_bytes())
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_dir, dir.path().join("out"));
        assert_eq!(config.template, dir.path().join("contract.pdf"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/config.json");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
