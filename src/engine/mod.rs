//! Format-preserving placeholder substitution.
//!
//! For every page of a template the engine extracts the placeholder names,
//! defaults the names the record lacks, then replaces each occurrence of
//! each `{name}` token: it reads the style under the token, erases it, and
//! draws the replacement at the token's top-left corner shifted by a fixed
//! offset, using the same font, size, and color.

mod options;

pub use options::{CommitMode, FillOptions, NameOrder, MISSING_VALUE};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Warning};
use crate::document::{Page, Template};
use crate::error::{Error, Result};
use crate::model::{Color, Rect, Record};
use crate::placeholder::{extract_placeholders, token};

/// Smallest size a fallback font is drawn at.
const MIN_FONT_SIZE: f32 = 1.0;

/// Summary of one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    /// Pages visited
    pub pages: usize,
    /// Occurrences replaced
    pub replacements: usize,
    /// Names filled with the blank default, sorted
    pub defaulted: Vec<String>,
    /// Insertions drawn with the fallback font
    pub font_fallbacks: usize,
}

/// Font, size, and color captured under a token.
#[derive(Debug, Clone, PartialEq)]
struct Style {
    font: String,
    size: f32,
    color: Color,
}

/// A located occurrence waiting to be redrawn.
#[derive(Debug, Clone)]
struct Edit {
    region: Rect,
    text: String,
    style: Style,
}

/// Replaces placeholder tokens in a template with record values.
pub struct SubstitutionEngine<'d> {
    options: FillOptions,
    diagnostics: &'d dyn Diagnostics,
}

impl<'d> SubstitutionEngine<'d> {
    /// Create an engine reporting warnings to `diagnostics`.
    pub fn new(options: FillOptions, diagnostics: &'d dyn Diagnostics) -> Self {
        Self {
            options,
            diagnostics,
        }
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Fill every page of `template` with values from `record`.
    ///
    /// The record must already be normalized. It is never modified: names
    /// it lacks are defaulted in a view local to this call, so a name
    /// defaulted on one page stays defaulted, without a second warning, on
    /// the pages after it.
    pub fn fill<T: Template>(&self, template: &mut T, record: &Record) -> Result<FillReport> {
        let mut report = FillReport::default();
        let mut defaulted = BTreeSet::new();
        let count = template.page_count();

        for index in 0..count {
            log::info!("Processing page {}/{}", index + 1, count);
            let mut page = template.page_mut(index)?;
            self.fill_page(&mut page, index + 1, record, &mut defaulted, &mut report)?;
            report.pages += 1;
        }

        report.defaulted = defaulted.into_iter().collect();
        Ok(report)
    }

    fn fill_page<P: Page>(
        &self,
        page: &mut P,
        number: usize,
        record: &Record,
        defaulted: &mut BTreeSet<String>,
        report: &mut FillReport,
    ) -> Result<()> {
        let text = page.extract_text()?;
        let names = extract_placeholders(&text);
        if names.is_empty() {
            log::debug!("no placeholders on page {}", number);
            return Ok(());
        }

        let missing: Vec<String> = record
            .missing(names.iter().map(String::as_str))
            .into_iter()
            .filter(|name| !defaulted.contains(name))
            .collect();
        if !missing.is_empty() {
            self.diagnostics.warn(Warning::MissingPlaceholderField {
                page: number,
                fields: missing.clone(),
            });
            defaulted.extend(missing);
        }

        // Every occurrence is located before the first edit, so text drawn
        // for one name is never searched for another.
        let mut pending = Vec::new();
        for name in self.ordered_names(&names) {
            log::debug!("searching for placeholder {}", token(name));
            let replacement = match record.try_get(name) {
                Ok(value) => value.to_string(),
                Err(Error::MissingField(_)) if defaulted.contains(name) => {
                    self.options.missing_value.clone()
                }
                Err(e) => return Err(e),
            };

            for region in page.search_literal(&token(name))? {
                pending.push(Edit {
                    region,
                    text: replacement.clone(),
                    style: self.capture_style(page, region)?,
                });
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        match self.options.commit_mode {
            CommitMode::PerPage => {
                let regions: Vec<Rect> = pending.iter().map(|edit| edit.region).collect();
                page.apply_redactions(&regions, self.options.redaction_fill)?;
                for edit in &pending {
                    self.draw(page, number, edit, report)?;
                }
            }
            CommitMode::PerOccurrence => {
                for edit in &pending {
                    page.redact(edit.region, self.options.redaction_fill)?;
                    self.draw(page, number, edit, report)?;
                }
            }
        }
        Ok(())
    }

    /// Distinct names in processing order.
    fn ordered_names<'n>(&self, names: &'n [String]) -> Vec<&'n str> {
        let mut seen = BTreeSet::new();
        let mut distinct: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect();
        if self.options.name_order == NameOrder::Reverse {
            distinct.reverse();
        }
        distinct
    }

    /// Style of the first span under `region`.
    fn capture_style<P: Page>(&self, page: &mut P, region: Rect) -> Result<Style> {
        let style = match page.describe_spans(region)?.into_iter().next() {
            Some(span) => Style {
                font: span.font,
                size: span.size,
                color: span.color,
            },
            None => {
                log::debug!("no span under {:?}, using fallback style", region);
                Style {
                    font: self.options.fallback_font.clone(),
                    size: region.height(),
                    color: Color::BLACK,
                }
            }
        };
        Ok(style)
    }

    fn draw<P: Page>(
        &self,
        page: &mut P,
        number: usize,
        edit: &Edit,
        report: &mut FillReport,
    ) -> Result<()> {
        let offset = self.options.insert_offset;
        let at = edit.region.top_left().offset(offset, offset);

        let (font, size) = match page.resolve_font(&edit.style.font) {
            Ok(font) => (font, edit.style.size),
            Err(Error::FontUnavailable(_)) => {
                let size =
                    (edit.style.size - self.options.fallback_size_delta).max(MIN_FONT_SIZE);
                self.diagnostics.warn(Warning::FontUnavailable {
                    page: number,
                    font: edit.style.font.clone(),
                    fallback: self.options.fallback_font.clone(),
                    size,
                });
                report.font_fallbacks += 1;
                (page.resolve_font(&self.options.fallback_font)?, size)
            }
            Err(e) => return Err(e),
        };

        log::debug!("replacing by {}", edit.text);
        page.insert_text(at, &edit.text, &font, size, edit.style.color)?;
        report.replacements += 1;
        Ok(())
    }
}
