//! Page-oriented document abstraction used by the substitution engine.
//!
//! The engine only talks to these traits, so it runs unchanged over the
//! in-memory model ([`MemoryTemplate`]) and over real PDF files
//! ([`crate::pdf::PdfTemplate`]).

mod memory;

pub use memory::{MemoryPage, MemoryTemplate, TextRun};

use std::path::Path;

use crate::error::Result;
use crate::model::{Color, Point, Rect, StyledSpan};

/// The standard 14 font families every PDF renderer provides.
pub const STANDARD_FONTS: [&str; 14] = [
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Symbol",
    "ZapfDingbats",
];

/// Check if `family` is one of [`STANDARD_FONTS`].
pub fn is_standard_font(family: &str) -> bool {
    STANDARD_FONTS.contains(&family)
}

/// An ordered sequence of pages that can be persisted.
pub trait Template {
    /// Mutable view of one page.
    type Page<'a>: Page
    where
        Self: 'a;

    /// Number of pages.
    fn page_count(&self) -> usize;

    /// Load the page at `index` (0-based).
    fn page_mut(&mut self, index: usize) -> Result<Self::Page<'_>>;

    /// Serialize the document.
    fn to_bytes(&mut self) -> Result<Vec<u8>>;

    /// Write the document to `path`.
    fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Operations on a single page.
///
/// Regions use a top-left origin with y growing downwards.
pub trait Page {
    /// Plain text of the page, lines separated by `\n`.
    fn extract_text(&mut self) -> Result<String>;

    /// Styled text runs overlapping `region`, in reading order.
    fn describe_spans(&mut self, region: Rect) -> Result<Vec<StyledSpan>>;

    /// Bounding regions of every occurrence of `needle`, in reading order.
    fn search_literal(&mut self, needle: &str) -> Result<Vec<Rect>>;

    /// Erase the template text inside `region` and paint it with `fill`.
    ///
    /// Text drawn by [`Page::insert_text`] is never erased, and stays
    /// above every fill.
    fn redact(&mut self, region: Rect, fill: Color) -> Result<()>;

    /// Erase several regions in one commit.
    fn apply_redactions(&mut self, regions: &[Rect], fill: Color) -> Result<()> {
        for region in regions {
            self.redact(*region, fill)?;
        }
        Ok(())
    }

    /// Resolve a font family to the name that [`Page::insert_text`] accepts.
    ///
    /// Fails with [`crate::Error::FontUnavailable`] when the page cannot
    /// draw with that family.
    fn resolve_font(&mut self, family: &str) -> Result<String>;

    /// Draw `text` above existing content, starting at `at` on its baseline.
    fn insert_text(
        &mut self,
        at: Point,
        text: &str,
        font: &str,
        size: f32,
        color: Color,
    ) -> Result<()>;
}

impl<P: Page + ?Sized> Page for &mut P {
    fn extract_text(&mut self) -> Result<String> {
        (**self).extract_text()
    }

    fn describe_spans(&mut self, region: Rect) -> Result<Vec<StyledSpan>> {
        (**self).describe_spans(region)
    }

    fn search_literal(&mut self, needle: &str) -> Result<Vec<Rect>> {
        (**self).search_literal(needle)
    }

    fn redact(&mut self, region: Rect, fill: Color) -> Result<()> {
        (**self).redact(region, fill)
    }

    fn apply_redactions(&mut self, regions: &[Rect], fill: Color) -> Result<()> {
        (**self).apply_redactions(regions, fill)
    }

    fn resolve_font(&mut self, family: &str) -> Result<String> {
        (**self).resolve_font(family)
    }

    fn insert_text(
        &mut self,
        at: Point,
        text: &str,
        font: &str,
        size: f32,
        color: Color,
    ) -> Result<()> {
        (**self).insert_text(at, text, font, size, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fonts() {
        assert!(is_standard_font("Helvetica"));
        assert!(is_standard_font("Times-Bold"));
        assert!(!is_standard_font("Calibri"));
        assert!(!is_standard_font("helvetica"));
    }
}
