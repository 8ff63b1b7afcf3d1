//! Shared fixtures for integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

/// A line of text drawn with `Tj`, positioned in PDF user space.
pub struct Line {
    pub text: &'static str,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    /// Font resource name: `F1` Helvetica, `F2` Times-Bold, `F3` a
    /// non-standard family
    pub font: &'static str,
}

impl Line {
    pub fn new(text: &'static str, x: f32, y: f32) -> Self {
        Self {
            text,
            x,
            y,
            size: 12.0,
            font: "F1",
        }
    }

    pub fn font(mut self, font: &'static str, size: f32) -> Self {
        self.font = font;
        self.size = size;
        self
    }
}

/// Build a letter-size PDF, one entry of `pages` per page.
pub fn build_pdf(pages: &[Vec<Line>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let times_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Bold",
    });
    let custom = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => "ABCDEF+AcmeSans",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => helvetica,
            "F2" => times_bold,
            "F3" => custom,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for line in lines {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![line.font.into(), Object::Real(line.size)]),
                Operation::new("Td", vec![Object::Real(line.x), Object::Real(line.y)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(line.text.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Text of every page of a PDF, read back through the template model.
pub fn pdf_text(data: &[u8]) -> Vec<String> {
    use mailmerge::{Page, PdfTemplate, Template};

    let mut template = PdfTemplate::from_bytes(data).unwrap();
    (0..template.page_count())
        .map(|i| template.page_mut(i).unwrap().extract_text().unwrap())
        .collect()
}
