//! Compound fields: new record fields built by joining existing ones.
//!
//! Templates often need a value that is not a column of the data source,
//! like a full name or a one-line address. A [`CompoundRule`] names the
//! target field, the source fields, and the separator placed between them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Record, Value};

/// Composition rule for one derived field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundRule {
    /// Name of the derived field
    pub target: String,
    /// Fields joined in order
    pub sources: Vec<String>,
    /// Text placed between consecutive sources
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    " ".to_string()
}

impl CompoundRule {
    /// Create a new rule.
    pub fn new<S: Into<String>>(
        target: impl Into<String>,
        sources: impl IntoIterator<Item = S>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    /// Compute the derived value for a record.
    pub fn evaluate(&self, record: &Record) -> Result<String> {
        let parts = self
            .sources
            .iter()
            .map(|source| {
                record
                    .get(source)
                    .map(Value::to_string)
                    .ok_or_else(|| Error::MissingCompoundSourceField {
                        target: self.target.clone(),
                        source_field: source.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(&self.separator))
    }
}

/// The rules used when none are configured: `{first_name name}` and
/// `{street, number}`.
pub fn default_rules() -> Vec<CompoundRule> {
    vec![
        CompoundRule::new("first_name name", ["first_name", "name"], " "),
        CompoundRule::new("street, number", ["street", "number"], ", "),
    ]
}

/// Add every derived field to `record`, evaluating rules in order.
///
/// A rule may use fields produced by earlier rules.
pub fn derive_compound_fields(record: &mut Record, rules: &[CompoundRule]) -> Result<()> {
    for rule in rules {
        let value = rule.evaluate(record)?;
        log::debug!("derived field '{}' = '{}'", rule.target, value);
        record.insert(rule.target.clone(), value);
    }
    Ok(())
}
