//! Substitution options.

use crate::model::Color;

/// Text substituted for placeholders that have no record field.
pub const MISSING_VALUE: &str = "        ";

/// Options for [`super::SubstitutionEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct FillOptions {
    /// Replacement for names the record does not define
    pub missing_value: String,

    /// Offset from a token's top-left corner to the insertion point, both axes
    pub insert_offset: f32,

    /// Color painted over erased tokens
    pub redaction_fill: Color,

    /// Font family used when the captured one cannot be resolved
    pub fallback_font: String,

    /// Points subtracted from the size when falling back
    pub fallback_size_delta: f32,

    /// When erasures are committed
    pub commit_mode: CommitMode,

    /// Order in which the distinct names of a page are processed
    pub name_order: NameOrder,
}

impl FillOptions {
    /// Create new fill options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replacement for missing fields.
    pub fn with_missing_value(mut self, value: impl Into<String>) -> Self {
        self.missing_value = value.into();
        self
    }

    /// Set the insertion offset in points.
    pub fn with_insert_offset(mut self, offset: f32) -> Self {
        self.insert_offset = offset;
        self
    }

    /// Set the redaction fill color.
    pub fn with_redaction_fill(mut self, color: Color) -> Self {
        self.redaction_fill = color;
        self
    }

    /// Set the fallback font family and size reduction.
    pub fn with_fallback_font(mut self, family: impl Into<String>, size_delta: f32) -> Self {
        self.fallback_font = family.into();
        self.fallback_size_delta = size_delta;
        self
    }

    /// Set the commit mode.
    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Erase and redraw each occurrence immediately.
    pub fn per_occurrence(mut self) -> Self {
        self.commit_mode = CommitMode::PerOccurrence;
        self
    }

    /// Set the name order.
    pub fn with_name_order(mut self, order: NameOrder) -> Self {
        self.name_order = order;
        self
    }
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            missing_value: MISSING_VALUE.to_string(),
            insert_offset: 8.0,
            redaction_fill: Color::WHITE,
            fallback_font: "Helvetica".to_string(),
            fallback_size_delta: 1.0,
            commit_mode: CommitMode::PerPage,
            name_order: NameOrder::Reverse,
        }
    }
}

/// When page edits are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Locate and style every occurrence first, erase them in one commit,
    /// then draw all replacements
    #[default]
    PerPage,
    /// Erase and redraw the located occurrences one at a time
    PerOccurrence,
}

/// Processing order of the distinct placeholder names on a page.
///
/// All occurrences on a page are located before the first edit and
/// redactions never erase inserted text, so the order only changes the
/// sequence of log lines, never the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameOrder {
    /// Last extracted name first
    #[default]
    Reverse,
    /// First extracted name first
    Forward,
}
