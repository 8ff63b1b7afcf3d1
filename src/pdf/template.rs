//! PDF binding of the document model.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::backend::{load_document, media_box, page_content, page_resources, resolve};
use super::layout::{
    build_lines, layout_glyphs, lines_text, remove_glyphs, search, spans_in, Glyph, PageFrame,
    TextLine,
};
use crate::document::{is_standard_font, Page, Template};
use crate::error::{Error, Result};
use crate::model::{Color, Point, Rect, StyledSpan};

/// Prefix of font resources added for insertions.
const FONT_RESOURCE_PREFIX: &str = "MMF";

/// A PDF template loaded in memory.
///
/// Pages are decoded on first access. Every edit rewrites the page as a
/// single compressed content stream.
pub struct PdfTemplate {
    doc: Document,
    pages: Vec<ObjectId>,
    states: Vec<Option<PageState>>,
}

impl PdfTemplate {
    /// Load from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let doc = load_document(data)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let states = pages.iter().map(|_| None).collect();
        Ok(Self { doc, pages, states })
    }

    /// Load from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

}

impl Template for PdfTemplate {
    type Page<'a> = PdfPage<'a>;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_mut(&mut self, index: usize) -> Result<PdfPage<'_>> {
        let out_of_range = || Error::PageOutOfRange(index as u32 + 1, self.pages.len() as u32);
        let id = *self.pages.get(index).ok_or_else(out_of_range)?;
        if self.states[index].is_none() {
            self.states[index] = Some(PageState::load(&self.doc, id)?);
        }
        let state = self.states[index].as_mut().ok_or_else(out_of_range)?;
        Ok(PdfPage {
            doc: &mut self.doc,
            state,
        })
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.doc.save(path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Layout {
    glyphs: Vec<Glyph>,
    lines: Vec<TextLine>,
}

/// Decoded state of one page.
///
/// The content is kept in three layers, written in this order: the
/// template's own operations, redaction fills, then inserted text.
struct PageState {
    id: ObjectId,
    frame: PageFrame,
    ops: Vec<Operation>,
    fills: Vec<Operation>,
    overlay: Vec<Operation>,
    layout: Layout,
    stale: bool,
    content_id: Option<ObjectId>,
    /// Font family to resource name
    fonts: BTreeMap<String, Vec<u8>>,
}

impl PageState {
    fn load(doc: &Document, id: ObjectId) -> Result<Self> {
        let content = page_content(doc, id)?;
        let mut ops = Content::decode(&content)
            .map_err(|e| Error::PdfParse(e.to_string()))?
            .operations;
        // Isolate the original graphics state from anything appended later.
        if !ops.is_empty() {
            ops.insert(0, Operation::new("q", vec![]));
            ops.push(Operation::new("Q", vec![]));
        }

        Ok(Self {
            id,
            frame: PageFrame::new(media_box(doc, id)),
            ops,
            fills: Vec::new(),
            overlay: Vec::new(),
            layout: Layout::default(),
            stale: true,
            content_id: None,
            fonts: BTreeMap::new(),
        })
    }

    /// All operations of the page, layer by layer.
    fn operations(&self) -> Vec<Operation> {
        [&self.ops, &self.fills, &self.overlay]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    fn refresh(&mut self, doc: &Document) -> &Layout {
        if self.stale {
            let glyphs = layout_glyphs(doc, self.id, &self.operations(), self.frame);
            let lines = build_lines(&glyphs);
            self.layout = Layout { glyphs, lines };
            self.stale = false;
        }
        &self.layout
    }
}

/// A page of a [`PdfTemplate`].
pub struct PdfPage<'a> {
    doc: &'a mut Document,
    state: &'a mut PageState,
}

impl PdfPage<'_> {
    /// Write the operations back as the page's only content stream.
    fn commit(&mut self) -> Result<()> {
        let encoded = Content {
            operations: self.state.operations(),
        }
        .encode()?;
        let stream = Stream::new(dictionary! { "Filter" => "FlateDecode" }, compress(&encoded)?);

        let content_id = match self.state.content_id {
            Some(id) => {
                self.doc.objects.insert(id, Object::Stream(stream));
                id
            }
            None => {
                let id = self.doc.add_object(stream);
                self.state.content_id = Some(id);
                id
            }
        };
        self.doc
            .get_object_mut(self.state.id)?
            .as_dict_mut()?
            .set("Contents", Object::Reference(content_id));

        self.state.stale = true;
        Ok(())
    }

    /// Add a Type1 font resource for a standard family.
    fn add_font_resource(&mut self, family: &str) -> Result<Vec<u8>> {
        let mut resources = page_resources(self.doc, self.state.id);
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .map(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut n = self.state.fonts.len() + 1;
        let name = loop {
            let candidate = format!("{}{}", FONT_RESOURCE_PREFIX, n).into_bytes();
            if !fonts.has(&candidate) {
                break candidate;
            }
            n += 1;
        };

        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => family,
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(name.clone(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        self.doc
            .get_object_mut(self.state.id)?
            .as_dict_mut()?
            .set("Resources", Object::Dictionary(resources));

        log::debug!(
            "added font resource /{} for {}",
            String::from_utf8_lossy(&name),
            family
        );
        self.state.fonts.insert(family.to_string(), name.clone());
        self.state.stale = true;
        Ok(name)
    }
}

impl Page for PdfPage<'_> {
    fn extract_text(&mut self) -> Result<String> {
        let layout = self.state.refresh(self.doc);
        Ok(lines_text(&layout.lines))
    }

    fn describe_spans(&mut self, region: Rect) -> Result<Vec<StyledSpan>> {
        let layout = self.state.refresh(self.doc);
        Ok(spans_in(&layout.glyphs, &layout.lines, &region))
    }

    fn search_literal(&mut self, needle: &str) -> Result<Vec<Rect>> {
        let layout = self.state.refresh(self.doc);
        Ok(search(&layout.glyphs, &layout.lines, needle))
    }

    fn redact(&mut self, region: Rect, fill: Color) -> Result<()> {
        self.apply_redactions(&[region], fill)
    }

    fn apply_redactions(&mut self, regions: &[Rect], fill: Color) -> Result<()> {
        if regions.is_empty() {
            return Ok(());
        }
        let template_ops = self.state.ops.len();
        let layout = self.state.refresh(self.doc);
        let removed: BTreeSet<usize> = layout
            .glyphs
            .iter()
            .enumerate()
            .filter(|(_, glyph)| glyph.op < template_ops)
            .filter(|(_, glyph)| regions.iter().any(|region| glyph.within(region)))
            .map(|(index, _)| index)
            .collect();

        if !removed.is_empty() {
            self.state.ops = remove_glyphs(&self.state.ops, &self.state.layout.glyphs, &removed);
        }
        for region in regions {
            let [x, y, w, h] = self.state.frame.rect_to_pdf(region);
            self.state.fills.extend([
                Operation::new("q", vec![]),
                Operation::new("rg", reals(&[fill.r, fill.g, fill.b])),
                Operation::new("re", reals(&[x, y, w, h])),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }
        log::debug!(
            "redacted {} glyphs in {} regions",
            removed.len(),
            regions.len()
        );
        self.commit()
    }

    fn resolve_font(&mut self, family: &str) -> Result<String> {
        if !is_standard_font(family) {
            return Err(Error::FontUnavailable(family.to_string()));
        }
        let name = match self.state.fonts.get(family) {
            Some(name) => name.clone(),
            None => self.add_font_resource(family)?,
        };
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    fn insert_text(
        &mut self,
        at: Point,
        text: &str,
        font: &str,
        size: f32,
        color: Color,
    ) -> Result<()> {
        let known = self.state.fonts.values().any(|name| name == font.as_bytes());
        let resource = if known {
            font.as_bytes().to_vec()
        } else {
            self.resolve_font(font)?.into_bytes()
        };

        let (x, y) = self.state.frame.to_pdf(at);
        self.state.overlay.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(resource), Object::Real(size)]),
            Operation::new("rg", reals(&[color.r, color.g, color.b])),
            Operation::new("Tm", reals(&[1.0, 0.0, 0.0, 1.0, x, y])),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.commit()
    }
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v)).collect()
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Encode text for a font with `WinAnsiEncoding`; unmappable characters
/// become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Ab 1"), b"Ab 1".to_vec());
        assert_eq!(encode_win_ansi("é€"), vec![0xE9, 0x80]);
        assert_eq!(encode_win_ansi("漢"), b"?".to_vec());
    }

    #[test]
    fn test_compress_roundtrip() {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let compressed = compress(b"BT /F1 12 Tf ET").unwrap();
        let mut decoded = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, b"BT /F1 12 Tf ET");
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(PdfTemplate::from_bytes(b"not a pdf").is_err());
    }
}
