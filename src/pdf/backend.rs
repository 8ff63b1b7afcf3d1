//! lopdf access helpers.
//!
//! Everything that reads raw PDF structure lives here: loading, page
//! content, inherited page attributes, and font metrics.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// Glyph width used when a font carries no metrics, in 1/1000 em.
pub(crate) const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Letter-size page, used when no MediaBox can be found.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Load a document from memory, rejecting encrypted files.
pub(crate) fn load_document(data: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(data).map_err(|e| match e {
        lopdf::Error::Decryption(_) => Error::Encrypted,
        _ => Error::from(e),
    })?;
    if doc.is_encrypted() {
        return Err(Error::Encrypted);
    }
    Ok(doc)
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute, walking up the page tree when the page
/// itself does not define it.
pub(crate) fn inherited<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    if let Ok(obj) = dict.get(key) {
        return Some(resolve(doc, obj));
    }
    let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
    let parent_dict = doc.get_object(parent).ok()?.as_dict().ok()?;
    inherited(doc, parent_dict, key)
}

/// Page MediaBox as `[llx, lly, urx, ury]`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|dict| inherited(doc, dict, b"MediaBox"))
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| get_number(resolve(doc, o)))
                .collect::<Vec<_>>()
        });

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Decompressed content of a page, all streams concatenated.
pub(crate) fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let contents = match page_dict.get(b"Contents") {
        Ok(obj) => resolve(doc, obj),
        // A page without content is blank, not broken.
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Stream(s) => s
            .decompressed_content()
            .or_else(|_| Ok(s.content.clone())),
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Stream(s) = resolve(doc, obj) {
                    let data = s
                        .decompressed_content()
                        .unwrap_or_else(|_| s.content.clone());
                    content.extend_from_slice(&data);
                    content.push(b'\n');
                }
            }
            Ok(content)
        }
        _ => Err(Error::PdfParse("Invalid content stream".to_string())),
    }
}

/// The page's resource dictionary, resolved and cloned.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|dict| inherited(doc, dict, b"Resources"))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Extract a number from a PDF object.
pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Strip a subset tag such as `ABCDEF+` from a base font name.
pub(crate) fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Metrics of one page font.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontMetrics {
    /// Base font name without subset tag
    pub family: String,
    /// Composite font with 2-byte codes
    pub two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: BTreeMap<u32, f32>,
    default_width: f32,
}

impl FontMetrics {
    /// Read metrics from a font dictionary.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let family = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)).to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or_default();

        if subtype == b"Type0" {
            return Self::composite(doc, dict, family);
        }

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0)
            .max(0) as u32;
        let widths = dict
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        let default_width = dict
            .get(b"FontDescriptor")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(get_number)
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH);

        Self {
            family,
            two_byte: false,
            first_char,
            widths,
            cid_widths: BTreeMap::new(),
            default_width,
        }
    }

    fn composite(doc: &Document, dict: &Dictionary, family: String) -> Self {
        let descendant = dict
            .get(b"DescendantFonts")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());

        let mut metrics = Self {
            family,
            two_byte: true,
            default_width: 1000.0,
            ..Self::default()
        };
        let Some(descendant) = descendant else {
            return metrics;
        };

        if let Some(dw) = descendant.get(b"DW").ok().and_then(get_number) {
            metrics.default_width = dw;
        }
        if let Some(arr) = descendant
            .get(b"W")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            metrics.cid_widths = parse_cid_widths(doc, arr);
        }
        metrics
    }

    /// Width of a character code, in 1/1000 em.
    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Bytes per character code.
    pub fn code_len(&self) -> usize {
        if self.two_byte {
            2
        } else {
            1
        }
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> BTreeMap<u32, f32> {
    let mut widths = BTreeMap::new();
    let mut i = 0;
    while i < arr.len() {
        let Some(first) = get_number(resolve(doc, &arr[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match arr.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = get_number(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = get_number(last).unwrap_or(first as f32).max(0.0) as u32;
                let w = arr
                    .get(i + 2)
                    .and_then(|o| get_number(resolve(doc, o)))
                    .unwrap_or(1000.0);
                for code in first..=last.max(first) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Calibri-Bold"), "Calibri-Bold");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
        assert_eq!(strip_subset_prefix("abcdef+Calibri"), "abcdef+Calibri");
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "XYZABC+Arial",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(667), Object::Integer(0), Object::Real(722.0)],
        };
        let metrics = FontMetrics::from_dict(&doc, &dict);
        assert_eq!(metrics.family, "Arial");
        assert!(!metrics.two_byte);
        assert_eq!(metrics.width(65), 667.0);
        assert_eq!(metrics.width(66), DEFAULT_GLYPH_WIDTH);
        assert_eq!(metrics.width(67), 722.0);
        assert_eq!(metrics.width(32), DEFAULT_GLYPH_WIDTH);
    }

    #[test]
    fn test_cid_widths() {
        let doc = Document::with_version("1.5");
        let arr = vec![
            Object::Integer(1),
            Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
            Object::Integer(10),
            Object::Integer(12),
            Object::Integer(250),
        ];
        let widths = parse_cid_widths(&doc, &arr);
        assert_eq!(widths.get(&1), Some(&500.0));
        assert_eq!(widths.get(&2), Some(&600.0));
        assert_eq!(widths.get(&11), Some(&250.0));
        assert_eq!(widths.get(&13), None);
    }
}
