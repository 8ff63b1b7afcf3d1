//! Record normalization before substitution.

use crate::compound::{default_rules, derive_compound_fields, CompoundRule};
use crate::error::Result;
use crate::model::{FormatSpec, Record};

/// Applies display formats and derives compound fields.
///
/// Both steps run to completion before a record is handed to the
/// substitution engine.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    formats: FormatSpec,
    rules: Vec<CompoundRule>,
}

impl RecordFormatter {
    /// Create a formatter with explicit compound rules.
    pub fn new(formats: FormatSpec, rules: Vec<CompoundRule>) -> Self {
        Self { formats, rules }
    }

    /// Replace the display formats.
    pub fn with_formats(mut self, formats: FormatSpec) -> Self {
        self.formats = formats;
        self
    }

    /// Replace the compound rules.
    pub fn with_rules(mut self, rules: Vec<CompoundRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn formats(&self) -> &FormatSpec {
        &self.formats
    }

    pub fn rules(&self) -> &[CompoundRule] {
        &self.rules
    }

    /// Return a normalized copy of `record`.
    pub fn normalize(&self, record: &Record) -> Result<Record> {
        let mut out = record.apply_formats(&self.formats)?;
        derive_compound_fields(&mut out, &self.rules)?;
        Ok(out)
    }
}

impl Default for RecordFormatter {
    fn default() -> Self {
        Self::new(FormatSpec::default(), default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::Value;

    #[test]
    fn test_normalize_formats_then_derives() {
        let formatter = RecordFormatter::new(
            FormatSpec::new().with("number", "03d"),
            vec![CompoundRule::new("address", ["street", "number"], ", ")],
        );
        let record = Record::new().with("street", "Main St").with("number", 5);

        let out = formatter.normalize(&record).unwrap();
        assert_eq!(out.get("number"), Some(&Value::from("005")));
        assert_eq!(out.get("address"), Some(&Value::from("Main St, 005")));
    }

    #[test]
    fn test_default_uses_builtin_rules() {
        let formatter = RecordFormatter::default();
        assert!(formatter.formats().is_empty());
        assert_eq!(formatter.rules().len(), 2);

        let record = Record::new().with("name", "Wiliam");
        assert!(matches!(
            formatter.normalize(&record),
            Err(Error::MissingCompoundSourceField { .. })
        ));
    }

    #[test]
    fn test_no_rules() {
        let formatter = RecordFormatter::default().with_rules(Vec::new());
        let record = Record::new().with("name", "Wiliam");
        assert_eq!(formatter.normalize(&record).unwrap(), record);
    }
}
