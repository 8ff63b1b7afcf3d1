//! In-memory document model.
//!
//! Each page is a list of styled text runs laid out with a fixed advance of
//! half the font size per character. The model is small enough to reason
//! about by hand, which makes it the binding of choice for tests,
//! benchmarks, and previews that never touch a PDF file.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Page, Template, STANDARD_FONTS};
use crate::error::{Error, Result};
use crate::model::{Color, Point, Rect, StyledSpan};

/// Horizontal advance of one character, as a fraction of the font size.
const ADVANCE: f32 = 0.5;
/// Height above the baseline, as a fraction of the font size.
const ASCENT: f32 = 0.8;
/// Depth below the baseline, as a fraction of the font size.
const DESCENT: f32 = 0.2;

/// A run of text with one style, positioned by its baseline origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Left edge of the first character
    pub x: f32,
    /// Baseline, measured from the top of the page
    pub baseline: f32,
    pub font: String,
    pub size: f32,
    pub color: Color,
    /// Drawn by an insertion rather than loaded with the page
    #[serde(skip)]
    inserted: bool,
}

impl TextRun {
    /// Create a run in 12pt black Helvetica.
    pub fn new(text: impl Into<String>, x: f32, baseline: f32) -> Self {
        Self {
            text: text.into(),
            x,
            baseline,
            font: "Helvetica".to_string(),
            size: 12.0,
            color: Color::BLACK,
            inserted: false,
        }
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    fn advance(&self) -> f32 {
        self.size * ADVANCE
    }

    /// Region covered by characters `start..end`.
    fn char_box(&self, start: usize, end: usize) -> Rect {
        let advance = self.advance();
        Rect::new(
            self.x + start as f32 * advance,
            self.baseline - ASCENT * self.size,
            self.x + end as f32 * advance,
            self.baseline + DESCENT * self.size,
        )
    }

    /// Region covered by the whole run.
    pub fn bbox(&self) -> Rect {
        self.char_box(0, self.text.chars().count())
    }

    fn to_span(&self) -> StyledSpan {
        StyledSpan {
            text: self.text.clone(),
            bbox: self.bbox(),
            font: self.font.clone(),
            size: self.size,
            color: self.color,
        }
    }

    /// Split off the characters whose centers lie in `region`.
    ///
    /// Returns the surviving pieces at their original positions.
    fn erase(&self, region: &Rect) -> Vec<TextRun> {
        let advance = self.advance();
        let mid_y = self.baseline - (ASCENT - DESCENT) * self.size / 2.0;
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut start = 0;

        for (i, c) in self.text.chars().enumerate() {
            let center = Point::new(self.x + (i as f32 + 0.5) * advance, mid_y);
            if region.contains(center) {
                if !current.is_empty() {
                    pieces.push(self.piece(std::mem::take(&mut current), start));
                }
            } else {
                if current.is_empty() {
                    start = i;
                }
                current.push(c);
            }
        }
        if !current.is_empty() {
            pieces.push(self.piece(current, start));
        }
        pieces
    }

    fn piece(&self, text: String, start: usize) -> TextRun {
        TextRun {
            text,
            x: self.x + start as f32 * self.advance(),
            ..self.clone()
        }
    }
}

/// A page of styled text runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    runs: Vec<TextRun>,
    fills: Vec<(Rect, Color)>,
    fonts: BTreeSet<String>,
    edits: usize,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self {
            runs: Vec::new(),
            fills: Vec::new(),
            fonts: STANDARD_FONTS.iter().map(|f| f.to_string()).collect(),
            edits: 0,
        }
    }
}

impl MemoryPage {
    /// Create an empty page that can draw with the standard 14 fonts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a run.
    pub fn with_run(mut self, run: TextRun) -> Self {
        self.runs.push(run);
        self
    }

    /// Replace the set of fonts available for insertion.
    pub fn with_fonts<S: Into<String>>(mut self, fonts: impl IntoIterator<Item = S>) -> Self {
        self.fonts = fonts.into_iter().map(Into::into).collect();
        self
    }

    pub fn push_run(&mut self, run: TextRun) {
        self.runs.push(run);
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Painted redaction rectangles, in commit order.
    pub fn fills(&self) -> &[(Rect, Color)] {
        &self.fills
    }

    /// Number of redaction commits and insertions so far.
    pub fn edit_count(&self) -> usize {
        self.edits
    }

    /// Runs grouped into lines, top to bottom, each sorted left to right.
    fn lines(&self) -> Vec<Vec<&TextRun>> {
        let mut sorted: Vec<&TextRun> = self.runs.iter().filter(|r| !r.text.is_empty()).collect();
        sorted.sort_by(|a, b| a.baseline.total_cmp(&b.baseline).then(a.x.total_cmp(&b.x)));

        let mut lines: Vec<Vec<&TextRun>> = Vec::new();
        for run in sorted {
            let same_line = lines.last().is_some_and(|line| {
                (run.baseline - line[0].baseline).abs() <= line[0].size.max(run.size) * 0.5
            });
            if let Some(line) = lines.last_mut().filter(|_| same_line) {
                line.push(run);
            } else {
                lines.push(vec![run]);
            }
        }
        for line in &mut lines {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
        }
        lines
    }
}

impl Page for MemoryPage {
    fn extract_text(&mut self) -> Result<String> {
        let lines: Vec<String> = self
            .lines()
            .into_iter()
            .map(|line| line.iter().map(|run| run.text.as_str()).collect())
            .collect();
        Ok(lines.join("\n"))
    }

    fn describe_spans(&mut self, region: Rect) -> Result<Vec<StyledSpan>> {
        Ok(self
            .lines()
            .into_iter()
            .flatten()
            .filter(|run| run.bbox().intersects(&region))
            .map(TextRun::to_span)
            .collect())
    }

    fn search_literal(&mut self, needle: &str) -> Result<Vec<Rect>> {
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let width = needle.chars().count();
        let mut found = Vec::new();
        for run in self.lines().into_iter().flatten() {
            for (byte_index, _) in run.text.match_indices(needle) {
                let start = run.text[..byte_index].chars().count();
                found.push(run.char_box(start, start + width));
            }
        }
        Ok(found)
    }

    fn redact(&mut self, region: Rect, fill: Color) -> Result<()> {
        self.apply_redactions(&[region], fill)
    }

    fn apply_redactions(&mut self, regions: &[Rect], fill: Color) -> Result<()> {
        if regions.is_empty() {
            return Ok(());
        }
        for region in regions {
            let runs = std::mem::take(&mut self.runs);
            for run in runs {
                if !run.inserted && run.bbox().intersects(region) {
                    self.runs.extend(run.erase(region));
                } else {
                    self.runs.push(run);
                }
            }
            self.fills.push((*region, fill));
        }
        self.edits += 1;
        Ok(())
    }

    fn resolve_font(&mut self, family: &str) -> Result<String> {
        if self.fonts.contains(family) {
            Ok(family.to_string())
        } else {
            Err(Error::FontUnavailable(family.to_string()))
        }
    }

    fn insert_text(
        &mut self,
        at: Point,
        text: &str,
        font: &str,
        size: f32,
        color: Color,
    ) -> Result<()> {
        self.runs.push(TextRun {
            inserted: true,
            ..TextRun::new(text, at.x, at.y)
                .with_font(font)
                .with_size(size)
                .with_color(color)
        });
        self.edits += 1;
        Ok(())
    }
}

/// A template made of [`MemoryPage`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTemplate {
    pages: Vec<MemoryPage>,
}

impl MemoryTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page.
    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn pages(&self) -> &[MemoryPage] {
        &self.pages
    }

    /// Get a page by index.
    pub fn page(&self, index: usize) -> Option<&MemoryPage> {
        self.pages.get(index)
    }

    /// Load a template written by [`Template::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl Template for MemoryTemplate {
    type Page<'a> = &'a mut MemoryPage;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_mut(&mut self, index: usize) -> Result<Self::Page<'_>> {
        let count = self.pages.len();
        self.pages
            .get_mut(index)
            .ok_or(Error::PageOutOfRange(index as u32 + 1, count as u32))
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> MemoryPage {
        MemoryPage::new()
            .with_run(TextRun::new("Dear {name},", 72.0, 100.0))
            .with_run(TextRun::new("Second line", 72.0, 120.0))
    }

    #[test]
    fn test_extract_text_by_lines() {
        let mut page = sample_page();
        assert_eq!(page.extract_text().unwrap(), "Dear {name},\nSecond line");
    }

    #[test]
    fn test_search_literal_region() {
        let mut page = sample_page();
        let found = page.search_literal("{name}").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].x0, found[0].x1), (102.0, 138.0));
        assert!((found[0].y0 - 90.4).abs() < 1e-3);
        assert!((found[0].y1 - 102.4).abs() < 1e-3);
        assert!(page.search_literal("{city}").unwrap().is_empty());
    }

    #[test]
    fn test_redact_splits_run() {
        let mut page = sample_page();
        let region = page.search_literal("{name}").unwrap()[0];
        page.redact(region, Color::WHITE).unwrap();

        assert_eq!(page.extract_text().unwrap(), "Dear ,\nSecond line");
        let comma = page.runs().iter().find(|r| r.text == ",").unwrap();
        assert_eq!(comma.x, 138.0);
        assert_eq!(page.fills(), &[(region, Color::WHITE)]);
        assert_eq!(page.edit_count(), 1);
    }

    #[test]
    fn test_describe_spans() {
        let mut page = MemoryPage::new().with_run(
            TextRun::new("{name}", 10.0, 50.0)
                .with_font("Times-Bold")
                .with_size(14.0)
                .with_color(Color::from_rgb_int(0xFF0000)),
        );
        let region = page.search_literal("{name}").unwrap()[0];
        let spans = page.describe_spans(region).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].font, "Times-Bold");
        assert_eq!(spans[0].size, 14.0);
        assert_eq!(spans[0].color.to_hex(), "#FF0000");
    }

    #[test]
    fn test_resolve_font() {
        let mut page = MemoryPage::new().with_fonts(["Helvetica"]);
        assert_eq!(page.resolve_font("Helvetica").unwrap(), "Helvetica");
        assert!(matches!(
            page.resolve_font("Calibri"),
            Err(Error::FontUnavailable(ref f)) if f == "Calibri"
        ));
    }

    #[test]
    fn test_insert_joins_line() {
        let mut page = sample_page();
        let region = page.search_literal("{name}").unwrap()[0];
        page.redact(region, Color::WHITE).unwrap();
        page.insert_text(
            region.top_left().offset(0.0, 8.0),
            "Ada",
            "Helvetica",
            12.0,
            Color::BLACK,
        )
        .unwrap();
        assert_eq!(page.extract_text().unwrap(), "Dear Ada,\nSecond line");
        assert_eq!(page.edit_count(), 2);
    }

    #[test]
    fn test_redact_keeps_inserted_text() {
        let mut page = MemoryPage::new().with_run(TextRun::new("{a} {b}", 72.0, 100.0));
        page.insert_text(Point::new(80.0, 98.4), "LONGVALUE", "Helvetica", 12.0, Color::BLACK)
            .unwrap();

        let region = page.search_literal("{b}").unwrap()[0];
        page.redact(region, Color::WHITE).unwrap();

        assert!(page.runs().iter().any(|run| run.text == "LONGVALUE"));
        assert_eq!(page.extract_text().unwrap(), "{a} LONGVALUE");
    }

    #[test]
    fn test_page_out_of_range() {
        let mut template = MemoryTemplate::new().with_page(MemoryPage::new());
        assert_eq!(template.page_count(), 1);
        assert!(template.page_mut(0).is_ok());
        assert!(matches!(
            template.page_mut(3),
            Err(Error::PageOutOfRange(4, 1))
        ));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut template = MemoryTemplate::new().with_page(sample_page());
        let bytes = template.to_bytes().unwrap();
        assert_eq!(MemoryTemplate::from_bytes(&bytes).unwrap(), template);
    }
}
