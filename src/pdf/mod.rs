//! PDF templates backed by lopdf.
//!
//! Text is located by interpreting page content streams: glyph positions
//! come from the text matrices and the fonts' `/Widths`, and glyphs are
//! grouped into lines by baseline. Redaction removes the glyphs from the
//! show operators and paints a filled rectangle over the area; insertion
//! appends a text object using one of the standard 14 fonts.

mod backend;
mod layout;
mod template;

pub use template::{PdfPage, PdfTemplate};
