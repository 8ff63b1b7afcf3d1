//! Data model shared by the substitution engine and its collaborators.
//!
//! Records carry the per-document data; geometry types describe where
//! text sits on a template page and how it is styled.

mod geometry;
mod record;

pub use geometry::{Color, Point, Rect, StyledSpan};
pub(crate) use record::float_repr;
pub use record::{FormatSpec, Record, Value};
