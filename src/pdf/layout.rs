//! Glyph layout of a page content stream.
//!
//! The content stream is interpreted once per edit generation: graphics
//! and text state are tracked operator by operator and every shown
//! character code becomes a [`Glyph`] that remembers which operator and
//! which bytes produced it. Search, style lookup, and redaction all work on
//! that glyph list.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};

use super::backend::{get_number, FontMetrics};
use crate::model::{Color, Point, Rect, StyledSpan};

/// Height above the baseline, as a fraction of the font size.
const ASCENT: f32 = 0.8;
/// Depth below the baseline, as a fraction of the font size.
const DESCENT: f32 = 0.2;
/// Horizontal gap, as a fraction of the font size, read as a word space.
const SPACE_GAP: f32 = 0.2;

/// Affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(get_number).collect();
        match values.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            }),
            _ => None,
        }
    }

    /// `self × other`
    fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Translation by `(tx, ty)` applied before this matrix.
    fn translate(&self, tx: f32, ty: f32) -> Matrix {
        Matrix {
            e: self.e + tx * self.a + ty * self.c,
            f: self.f + tx * self.b + ty * self.d,
            ..*self
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Maps PDF user space to the top-left page frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    llx: f32,
    ury: f32,
}

impl PageFrame {
    pub fn new(media_box: [f32; 4]) -> Self {
        Self {
            llx: media_box[0],
            ury: media_box[3],
        }
    }

    pub fn to_page(&self, x: f32, y: f32) -> Point {
        Point::new(x - self.llx, self.ury - y)
    }

    pub fn to_pdf(&self, point: Point) -> (f32, f32) {
        (point.x + self.llx, self.ury - point.y)
    }

    /// A page-frame rectangle as PDF `re` operands `x y w h`.
    pub fn rect_to_pdf(&self, rect: &Rect) -> [f32; 4] {
        let (x, y) = self.to_pdf(Point::new(rect.x0, rect.y1));
        [x, y, rect.width(), rect.height()]
    }
}

/// One shown character code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    /// Decoded text, empty when the code has no Unicode mapping
    pub text: String,
    /// Index of the showing operator
    pub op: usize,
    /// Index of the string inside the operator's show array
    pub item: usize,
    /// Bytes of the code inside that string
    pub bytes: Range<usize>,
    pub bbox: Rect,
    pub baseline: f32,
    pub size: f32,
    pub font: String,
    pub color: Color,
    /// `TJ` adjustment that takes the glyph's place without moving the
    /// glyphs after it
    pub compensation: f32,
}

impl Glyph {
    fn center(&self) -> Point {
        Point::new(self.bbox.center().x, self.baseline - (ASCENT - DESCENT) * self.size / 2.0)
    }

    /// Check if the glyph sits inside `region`.
    pub fn within(&self, region: &Rect) -> bool {
        region.contains(self.center())
    }
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
    font: Option<Vec<u8>>,
    size: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            size: 12.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: Color::BLACK,
            text: TextState::default(),
        }
    }
}

/// Fill color from `g`, `rg`, `k`, `sc`, or `scn` operands.
fn fill_color(operands: &[Object]) -> Option<Color> {
    let values: Vec<f32> = operands.iter().filter_map(get_number).collect();
    match values.as_slice() {
        [gray] => Some(Color::gray(*gray)),
        [r, g, b] => Some(Color::rgb(*r, *g, *b)),
        [c, m, y, k] => Some(Color::from_cmyk(*c, *m, *y, *k)),
        _ => None,
    }
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(get_number)
}

struct Interpreter<'a, E> {
    frame: PageFrame,
    metrics: &'a BTreeMap<Vec<u8>, FontMetrics>,
    encodings: &'a BTreeMap<Vec<u8>, E>,
    decode: fn(&E, &[u8]) -> Option<String>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    glyphs: Vec<Glyph>,
}

impl<E> Interpreter<'_, E> {
    fn run(&mut self, ops: &[Operation]) {
        for (index, op) in ops.iter().enumerate() {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.state.ctm = m.multiply(&self.state.ctm);
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = fill_color(operands) {
                        self.state.fill = color;
                    }
                }
                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.state.text.font = Some(name.clone());
                    }
                    self.state.text.size = number(operands, 1).unwrap_or(12.0);
                }
                "Tc" => self.state.text.char_spacing = number(operands, 0).unwrap_or(0.0),
                "Tw" => self.state.text.word_spacing = number(operands, 0).unwrap_or(0.0),
                "Tz" => {
                    self.state.text.horizontal_scale = number(operands, 0).unwrap_or(100.0) / 100.0
                }
                "TL" => self.state.text.leading = number(operands, 0).unwrap_or(0.0),
                "Ts" => self.state.text.rise = number(operands, 0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let tx = number(operands, 0).unwrap_or(0.0);
                    let ty = number(operands, 1).unwrap_or(0.0);
                    if op.operator == "TD" {
                        self.state.text.leading = -ty;
                    }
                    self.tlm = self.tlm.translate(tx, ty);
                    self.tm = self.tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.tlm = m;
                        self.tm = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(index, 0, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show_array(index, items);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(index, 0, bytes);
                    }
                }
                "\"" => {
                    self.state.text.word_spacing = number(operands, 0).unwrap_or(0.0);
                    self.state.text.char_spacing = number(operands, 1).unwrap_or(0.0);
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(index, 0, bytes);
                    }
                }
                _ => {}
            }
        }
    }

    fn next_line(&mut self) {
        self.tlm = self.tlm.translate(0.0, -self.state.text.leading);
        self.tm = self.tlm;
    }

    fn show_array(&mut self, op: usize, items: &[Object]) {
        let text = &self.state.text;
        let scale = text.size * text.horizontal_scale / 1000.0;
        for (item, obj) in items.iter().enumerate() {
            match obj {
                Object::String(bytes, _) => self.show(op, item, bytes),
                other => {
                    if let Some(adjust) = get_number(other) {
                        self.tm = self.tm.translate(-adjust * scale, 0.0);
                    }
                }
            }
        }
    }

    fn show(&mut self, op: usize, item: usize, bytes: &[u8]) {
        let text = self.state.text.clone();
        let default_metrics = FontMetrics::default();
        let (metrics, encoding) = match &text.font {
            Some(key) => (
                self.metrics.get(key).unwrap_or(&default_metrics),
                self.encodings.get(key),
            ),
            None => (&default_metrics, None),
        };
        let code_len = metrics.code_len();
        let font = if metrics.family.is_empty() {
            "Unknown".to_string()
        } else {
            metrics.family.clone()
        };

        for (chunk, code_bytes) in bytes.chunks(code_len).enumerate() {
            let code = code_bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            let w0 = metrics.width(code) / 1000.0;
            let spacing = text.char_spacing
                + if code_len == 1 && code == 32 {
                    text.word_spacing
                } else {
                    0.0
                };

            let device = self.tm.multiply(&self.state.ctm);
            let (x0, y0) = device.apply(0.0, text.rise);
            let (x1, _) = device.apply(w0 * text.size * text.horizontal_scale, text.rise);
            let size = text.size * device.vertical_scale();
            let origin = self.frame.to_page(x0, y0);
            let end_x = self.frame.to_page(x1, y0).x;

            let decoded = encoding
                .and_then(|enc| (self.decode)(enc, code_bytes))
                .unwrap_or_else(|| fallback_text(code, code_len));

            let compensation = if text.size != 0.0 {
                -(w0 * 1000.0 + spacing * 1000.0 / text.size)
            } else {
                0.0
            };

            let start = chunk * code_len;
            self.glyphs.push(Glyph {
                text: decoded,
                op,
                item,
                bytes: start..start + code_bytes.len(),
                bbox: Rect::new(
                    origin.x.min(end_x),
                    origin.y - ASCENT * size,
                    origin.x.max(end_x),
                    origin.y + DESCENT * size,
                ),
                baseline: origin.y,
                size,
                font: font.clone(),
                color: self.state.fill,
                compensation,
            });

            let tx = (w0 * text.size + spacing) * text.horizontal_scale;
            self.tm = self.tm.translate(tx, 0.0);
        }
    }
}

fn fallback_text(code: u32, code_len: usize) -> String {
    if code_len == 1 {
        char::from(code as u8).to_string()
    } else {
        char::from_u32(code).map(String::from).unwrap_or_default()
    }
}

/// Lay out every glyph shown by `ops` on the given page.
pub(crate) fn layout_glyphs(
    doc: &Document,
    page_id: ObjectId,
    ops: &[Operation],
    frame: PageFrame,
) -> Vec<Glyph> {
    let page_fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let metrics: BTreeMap<Vec<u8>, FontMetrics> = page_fonts
        .iter()
        .map(|(name, dict)| (name.clone(), FontMetrics::from_dict(doc, dict)))
        .collect();
    let encodings: BTreeMap<Vec<u8>, _> = page_fonts
        .iter()
        .filter_map(|(name, dict)| {
            dict.get_font_encoding(doc)
                .ok()
                .map(|enc| (name.clone(), enc))
        })
        .collect();

    let mut interpreter = Interpreter {
        frame,
        metrics: &metrics,
        encodings: &encodings,
        decode: |enc, bytes| Document::decode_text(enc, bytes).ok(),
        state: GraphicsState::default(),
        stack: Vec::new(),
        tm: Matrix::IDENTITY,
        tlm: Matrix::IDENTITY,
        glyphs: Vec::new(),
    };
    interpreter.run(ops);
    interpreter.glyphs
}

/// A line of text with the glyph behind every character.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLine {
    pub text: String,
    /// Glyph index per character; `None` for inferred word spaces
    pub chars: Vec<Option<usize>>,
}

/// Split glyphs, in drawing order, into runs: consecutive glyphs of one
/// show operator that follow each other on the same baseline.
fn build_runs(glyphs: &[Glyph]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for (index, glyph) in glyphs.iter().enumerate() {
        let continues = runs.last().and_then(|run| run.last()).is_some_and(|&last| {
            let prev = &glyphs[last];
            prev.op == glyph.op
                && (glyph.baseline - prev.baseline).abs() < 0.01
                && (glyph.bbox.x0 - prev.bbox.x1).abs() <= SPACE_GAP * glyph.size.max(prev.size)
        });
        if let Some(run) = runs.last_mut().filter(|_| continues) {
            run.push(index);
        } else {
            runs.push(vec![index]);
        }
    }
    runs
}

/// Group glyphs into lines, top to bottom, each read left to right.
///
/// Lines are ordered run by run, so text drawn over the end of another
/// run is read after that run starts rather than interleaved with it.
pub(crate) fn build_lines(glyphs: &[Glyph]) -> Vec<TextLine> {
    let mut runs = build_runs(glyphs);
    let start = move |run: &Vec<usize>| &glyphs[run[0]];
    runs.sort_by(|a, b| {
        start(a)
            .baseline
            .total_cmp(&start(b).baseline)
            .then(start(a).bbox.x0.total_cmp(&start(b).bbox.x0))
    });

    let mut groups: Vec<Vec<Vec<usize>>> = Vec::new();
    for run in runs {
        let glyph = start(&run);
        let same_line = groups.last().is_some_and(|line| {
            let first = start(&line[0]);
            (glyph.baseline - first.baseline).abs() <= first.size.max(glyph.size) * 0.5
        });
        if let Some(line) = groups.last_mut().filter(|_| same_line) {
            line.push(run);
        } else {
            groups.push(vec![run]);
        }
    }

    groups
        .into_iter()
        .map(|mut line_runs| {
            line_runs.sort_by(|a, b| start(a).bbox.x0.total_cmp(&start(b).bbox.x0));
            let group: Vec<usize> = line_runs.into_iter().flatten().collect();
            let mut line = TextLine {
                text: String::new(),
                chars: Vec::new(),
            };
            let mut previous: Option<&Glyph> = None;
            for index in group {
                let glyph = &glyphs[index];
                if let Some(prev) = previous {
                    let gap = glyph.bbox.x0 - prev.bbox.x1;
                    let spaced = prev.text.ends_with(char::is_whitespace)
                        || glyph.text.starts_with(char::is_whitespace);
                    if gap > SPACE_GAP * glyph.size.max(prev.size) && !spaced {
                        line.text.push(' ');
                        line.chars.push(None);
                    }
                }
                for c in glyph.text.chars() {
                    line.text.push(c);
                    line.chars.push(Some(index));
                }
                if !glyph.text.is_empty() {
                    previous = Some(glyph);
                }
            }
            line
        })
        .filter(|line| !line.text.is_empty())
        .collect()
}

/// Plain text of the lines.
pub(crate) fn lines_text(lines: &[TextLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Regions of every occurrence of `needle`, matched within single lines.
pub(crate) fn search(glyphs: &[Glyph], lines: &[TextLine], needle: &str) -> Vec<Rect> {
    if needle.is_empty() {
        return Vec::new();
    }
    let width = needle.chars().count();
    let mut found = Vec::new();
    for line in lines {
        for (byte_index, _) in line.text.match_indices(needle) {
            let start = line.text[..byte_index].chars().count();
            let region = line.chars[start..start + width]
                .iter()
                .flatten()
                .map(|&i| glyphs[i].bbox)
                .reduce(|a, b| a.union(&b));
            if let Some(region) = region {
                found.push(region);
            }
        }
    }
    found
}

/// Runs of uniformly styled glyphs inside `region`, in reading order.
pub(crate) fn spans_in(glyphs: &[Glyph], lines: &[TextLine], region: &Rect) -> Vec<StyledSpan> {
    let mut spans: Vec<StyledSpan> = Vec::new();
    let mut seen = BTreeSet::new();
    for line in lines {
        let mut current: Option<StyledSpan> = None;
        for &index in line.chars.iter().flatten() {
            let glyph = &glyphs[index];
            if !seen.insert(index) || !glyph.within(region) {
                continue;
            }
            let same_style = current.as_ref().is_some_and(|span| {
                span.font == glyph.font && span.size == glyph.size && span.color == glyph.color
            });
            if let Some(span) = current.as_mut().filter(|_| same_style) {
                span.text.push_str(&glyph.text);
                span.bbox = span.bbox.union(&glyph.bbox);
            } else {
                spans.extend(current.take());
                current = Some(StyledSpan {
                    text: glyph.text.clone(),
                    bbox: glyph.bbox,
                    font: glyph.font.clone(),
                    size: glyph.size,
                    color: glyph.color,
                });
            }
        }
        spans.extend(current);
    }
    spans
}

/// Rewrite `ops` so that the `removed` glyphs are no longer shown.
///
/// Every affected show operator becomes a `TJ` whose removed codes are
/// replaced by their compensating adjustments, so the remaining glyphs keep
/// their positions.
pub(crate) fn remove_glyphs(
    ops: &[Operation],
    glyphs: &[Glyph],
    removed: &BTreeSet<usize>,
) -> Vec<Operation> {
    let mut cuts: BTreeMap<usize, BTreeMap<(usize, usize), (usize, f32)>> = BTreeMap::new();
    for &index in removed {
        let glyph = &glyphs[index];
        cuts.entry(glyph.op).or_default().insert(
            (glyph.item, glyph.bytes.start),
            (glyph.bytes.end, glyph.compensation),
        );
    }

    let mut out = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let Some(op_cuts) = cuts.get(&index) else {
            out.push(op.clone());
            continue;
        };
        let operands = &op.operands;
        let items: Vec<Object> = match op.operator.as_str() {
            "Tj" | "'" => operands.first().cloned().into_iter().collect(),
            "TJ" => match operands.first() {
                Some(Object::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
            "\"" => operands.get(2).cloned().into_iter().collect(),
            _ => {
                out.push(op.clone());
                continue;
            }
        };

        match op.operator.as_str() {
            "'" => out.push(Operation::new("T*", vec![])),
            "\"" => {
                out.push(Operation::new("Tw", operands.first().cloned().into_iter().collect()));
                out.push(Operation::new("Tc", operands.get(1).cloned().into_iter().collect()));
                out.push(Operation::new("T*", vec![]));
            }
            _ => {}
        }
        out.push(Operation::new(
            "TJ",
            vec![Object::Array(cut_items(&items, op_cuts))],
        ));
    }
    out
}

fn cut_items(items: &[Object], cuts: &BTreeMap<(usize, usize), (usize, f32)>) -> Vec<Object> {
    let mut out = Vec::new();
    for (item, obj) in items.iter().enumerate() {
        let Object::String(bytes, format) = obj else {
            out.push(obj.clone());
            continue;
        };
        let mut kept = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            match cuts.get(&(item, pos)) {
                Some(&(end, compensation)) => {
                    if !kept.is_empty() {
                        out.push(Object::String(std::mem::take(&mut kept), format.clone()));
                    }
                    push_adjustment(&mut out, compensation);
                    pos = end.max(pos + 1);
                }
                None => {
                    kept.push(bytes[pos]);
                    pos += 1;
                }
            }
        }
        if !kept.is_empty() {
            out.push(Object::String(kept, format.clone()));
        }
    }
    out
}

fn push_adjustment(out: &mut Vec<Object>, value: f32) {
    match out.last_mut() {
        Some(Object::Real(prev)) => *prev += value,
        Some(Object::Integer(prev)) => {
            let merged = *prev as f32 + value;
            if let Some(last) = out.last_mut() {
                *last = Object::Real(merged);
            }
        }
        _ => out.push(Object::Real(value)),
    }
}
