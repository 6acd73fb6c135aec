//! Content stream interpreter
//! Author: kartik4091
//! Created: 2025-06-09
//!
//! Walks the operators of a page (and the form XObjects it paints) keeping
//! just enough graphics and text state to place fills, text spans and images
//! in page space. Glyph widths are approximated; fonts are never loaded.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::{as_number, decode_text, dict_get, fingerprint, get_dict, name_of, stream_bytes};
use crate::accessor::{FillPath, ImageInfo, TextSpan};
use crate::config::ExtractionMode;
use crate::geometry::{ColorSample, Matrix, Rect};

/// Average glyph advance as a fraction of the font size
const GLYPH_WIDTH_EM: f64 = 0.5;
const DESCENT_EM: f64 = 0.2;
const ASCENT_EM: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpaceKind {
    Gray,
    Rgb,
    Cmyk,
    /// Separation or single-colorant DeviceN on the black plate; tint 1 is full ink
    BlackInk,
    Unsupported,
}

impl SpaceKind {
    fn initial_color(&self) -> Option<ColorSample> {
        match self {
            SpaceKind::Gray => Some(ColorSample::Gray(0.0)),
            SpaceKind::Rgb => Some(ColorSample::Rgb(0.0, 0.0, 0.0)),
            SpaceKind::Cmyk => Some(ColorSample::Cmyk(0.0, 0.0, 0.0, 1.0)),
            SpaceKind::BlackInk => Some(ColorSample::black()),
            SpaceKind::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill_color: Option<ColorSample>,
    fill_space: SpaceKind,
    two_byte_font: bool,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill_color: Some(ColorSample::black()),
            fill_space: SpaceKind::Gray,
            two_byte_font: false,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Output of one page pass
#[derive(Debug, Default)]
pub struct PageGraphics {
    pub fill_paths: Vec<FillPath>,
    pub text_spans: Vec<TextSpan>,
    pub images: Vec<ImageInfo>,
}

pub struct ContentInterpreter<'a> {
    doc: &'a Document,
    mode: ExtractionMode,
    max_form_depth: usize,
    out: PageGraphics,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(doc: &'a Document, mode: ExtractionMode, max_form_depth: usize) -> Self {
        Self {
            doc,
            mode,
            max_form_depth,
            out: PageGraphics::default(),
        }
    }

    /// Interprets decoded page content with the page's resources
    pub fn run_page(mut self, content: &[u8], resources: Option<&'a Dictionary>) -> lopdf::Result<PageGraphics> {
        let content = Content::decode(content)?;
        self.run(&content.operations, resources, GraphicsState::new(Matrix::identity()), 0);
        Ok(self.out)
    }

    fn run(&mut self, ops: &[Operation], resources: Option<&'a Dictionary>, initial: GraphicsState, depth: usize) {
        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut path_rects: Vec<Rect> = Vec::new();
        let mut path_points: Vec<(f64, f64)> = Vec::new();
        let mut text_matrix = Matrix::identity();
        let mut line_matrix = Matrix::identity();

        for op in ops {
            let nums = || op.operands.iter().filter_map(as_number).collect::<Vec<f64>>();
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from(&nums()) {
                        gs.ctm = m.multiply(&gs.ctm);
                    }
                }

                // Fill color
                "g" => set_color(&mut gs, SpaceKind::Gray, &nums()),
                "rg" => set_color(&mut gs, SpaceKind::Rgb, &nums()),
                "k" => set_color(&mut gs, SpaceKind::Cmyk, &nums()),
                "cs" => {
                    let kind = op
                        .operands
                        .first()
                        .and_then(name_of)
                        .map_or(SpaceKind::Unsupported, |name| self.space_kind(resources, name));
                    gs.fill_space = kind;
                    gs.fill_color = kind.initial_color();
                }
                "sc" | "scn" => {
                    gs.fill_color = match gs.fill_space {
                        SpaceKind::Unsupported => None,
                        SpaceKind::BlackInk => nums().first().map(|tint| ColorSample::Gray(1.0 - tint.clamp(0.0, 1.0))),
                        _ => ColorSample::from_components(&nums()),
                    };
                }

                // Path construction
                "re" => {
                    if let [x, y, w, h] = nums()[..] {
                        path_rects.push(gs.ctm.transform_rect(&Rect::from_origin(x, y, w, h)));
                    }
                }
                "m" | "l" | "c" | "v" | "y" => {
                    for pair in nums().chunks_exact(2) {
                        path_points.push(gs.ctm.transform_point(pair[0], pair[1]));
                    }
                }
                "h" => {}

                // Painting
                "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let color = gs.fill_color;
                    self.out
                        .fill_paths
                        .extend(path_rects.drain(..).map(|rect| FillPath { rect, color }));
                    if let Some(rect) = Rect::bounding(&path_points) {
                        self.out.fill_paths.push(FillPath { rect, color });
                    }
                    path_points.clear();
                }
                "S" | "s" | "n" => {
                    path_rects.clear();
                    path_points.clear();
                }

                // Text state
                "BT" => {
                    text_matrix = Matrix::identity();
                    line_matrix = Matrix::identity();
                }
                "Tf" => {
                    if let Some(size) = op.operands.get(1).and_then(as_number) {
                        gs.font_size = size;
                    }
                    gs.two_byte_font = op
                        .operands
                        .first()
                        .and_then(name_of)
                        .map_or(false, |name| self.is_two_byte_font(resources, name));
                }
                "Tc" => {
                    if let Some(&v) = nums().first() {
                        gs.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(&v) = nums().first() {
                        gs.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(&v) = nums().first() {
                        gs.horizontal_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(&v) = nums().first() {
                        gs.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(&v) = nums().first() {
                        gs.rise = v;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_from(&nums()) {
                        text_matrix = m;
                        line_matrix = m;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = nums()[..] {
                        if op.operator == "TD" {
                            gs.leading = -ty;
                        }
                        line_matrix = Matrix::translate(tx, ty).multiply(&line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translate(0.0, -gs.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                }

                // Text showing
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(&gs, &mut text_matrix, &[TextPiece::Bytes(bytes)]);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac, ..] = nums()[..] {
                            gs.word_spacing = aw;
                            gs.char_spacing = ac;
                        }
                    }
                    line_matrix = Matrix::translate(0.0, -gs.leading).multiply(&line_matrix);
                    text_matrix = line_matrix;
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        self.show(&gs, &mut text_matrix, &[TextPiece::Bytes(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        let pieces: Vec<TextPiece> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(TextPiece::Bytes(bytes)),
                                other => as_number(other).map(TextPiece::Adjust),
                            })
                            .collect();
                        self.show(&gs, &mut text_matrix, &pieces);
                    }
                }

                // XObjects
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(name_of) {
                        self.paint_xobject(resources, name, &gs, depth);
                    }
                }
                _ => {}
            }
        }
    }

    /// Emits one span for a shown string (or TJ array) and advances the text matrix
    fn show(&mut self, gs: &GraphicsState, text_matrix: &mut Matrix, pieces: &[TextPiece<'_>]) {
        let bytes_per_glyph = if gs.two_byte_font { 2 } else { 1 };
        let fs = gs.font_size;

        let mut raw: Vec<u8> = Vec::new();
        let mut glyphs = 0usize;
        let mut advance = 0.0;
        for piece in pieces {
            match piece {
                TextPiece::Bytes(bytes) => {
                    let count = bytes.len() / bytes_per_glyph;
                    let spaces = if gs.two_byte_font { 0 } else { bytes.iter().filter(|&&b| b == b' ').count() };
                    glyphs += count;
                    advance += (count as f64 * (GLYPH_WIDTH_EM * fs + gs.char_spacing)
                        + spaces as f64 * gs.word_spacing)
                        * gs.horizontal_scale;
                    raw.extend_from_slice(bytes);
                }
                TextPiece::Adjust(n) => advance -= n / 1000.0 * fs * gs.horizontal_scale,
            }
        }

        if glyphs > 0 {
            let render = text_matrix.multiply(&gs.ctm);
            let local = Rect::new(0.0, gs.rise - DESCENT_EM * fs, advance, gs.rise + ASCENT_EM * fs);
            let vertical_scale = (render.c * render.c + render.d * render.d).sqrt();

            self.out.text_spans.push(TextSpan {
                bbox: render.transform_rect(&local),
                color: gs.fill_color,
                font_size: fs.abs() * vertical_scale,
                glyph_count: glyphs,
                fingerprint: fingerprint(&raw),
                preview: self
                    .mode
                    .preview_chars()
                    .map(|limit| decode_text(&raw, gs.two_byte_font).chars().take(limit).collect()),
            });
        }

        *text_matrix = Matrix::translate(advance, 0.0).multiply(text_matrix);
    }

    fn paint_xobject(&mut self, resources: Option<&'a Dictionary>, name: &[u8], gs: &GraphicsState, depth: usize) {
        let doc = self.doc;
        let stream = resources
            .and_then(|r| get_dict(doc, r, b"XObject"))
            .and_then(|xobjects| dict_get(doc, xobjects, name))
            .and_then(|obj| obj.as_stream().ok());
        let Some(stream) = stream else {
            return;
        };

        match dict_get(doc, &stream.dict, b"Subtype").and_then(name_of) {
            Some(b"Image") => {
                let dim = |key: &[u8]| {
                    dict_get(doc, &stream.dict, key)
                        .and_then(as_number)
                        .map_or(0, |v| v.max(0.0) as u32)
                };
                self.out.images.push(ImageInfo {
                    width: dim(b"Width"),
                    height: dim(b"Height"),
                });
            }
            Some(b"Form") => {
                if depth >= self.max_form_depth {
                    debug!("Form XObject nesting exceeds {}, skipping", self.max_form_depth);
                    return;
                }
                let content = match stream_bytes(stream).and_then(|bytes| Content::decode(&bytes)) {
                    Ok(content) => content,
                    Err(e) => {
                        debug!("Skipping undecodable form XObject: {}", e);
                        return;
                    }
                };
                let form_matrix = dict_get(doc, &stream.dict, b"Matrix")
                    .and_then(|m| m.as_array().ok())
                    .and_then(|arr| matrix_from(&arr.iter().filter_map(as_number).collect::<Vec<_>>()))
                    .unwrap_or_default();
                let form_resources = get_dict(doc, &stream.dict, b"Resources").or(resources);

                let mut inner = gs.clone();
                inner.ctm = form_matrix.multiply(&gs.ctm);
                self.run(&content.operations, form_resources, inner, depth + 1);
            }
            _ => {}
        }
    }

    fn space_kind(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> SpaceKind {
        if let Some(kind) = builtin_space(name) {
            return kind;
        }
        let doc = self.doc;
        let Some(def) = resources
            .and_then(|r| get_dict(doc, r, b"ColorSpace"))
            .and_then(|spaces| dict_get(doc, spaces, name))
        else {
            return SpaceKind::Unsupported;
        };

        match def {
            Object::Name(n) => builtin_space(n).unwrap_or(SpaceKind::Unsupported),
            Object::Array(arr) => match arr.first().and_then(name_of) {
                Some(b"ICCBased") => arr
                    .get(1)
                    .map(|obj| super::resolve(doc, obj))
                    .and_then(|obj| obj.as_stream().ok())
                    .and_then(|s| dict_get(doc, &s.dict, b"N"))
                    .and_then(as_number)
                    .map_or(SpaceKind::Unsupported, |n| match n as i64 {
                        1 => SpaceKind::Gray,
                        3 => SpaceKind::Rgb,
                        4 => SpaceKind::Cmyk,
                        _ => SpaceKind::Unsupported,
                    }),
                Some(b"Separation") => match arr.get(1).map(|obj| super::resolve(doc, obj)).and_then(name_of) {
                    Some(colorant) if is_black_colorant(colorant) => SpaceKind::BlackInk,
                    _ => SpaceKind::Unsupported,
                },
                Some(b"DeviceN") => match arr.get(1).map(|obj| super::resolve(doc, obj)) {
                    Some(Object::Array(names)) if names.len() == 1 => {
                        match names.first().map(|obj| super::resolve(doc, obj)).and_then(name_of) {
                            Some(colorant) if is_black_colorant(colorant) => SpaceKind::BlackInk,
                            _ => SpaceKind::Unsupported,
                        }
                    }
                    _ => SpaceKind::Unsupported,
                },
                Some(other) => builtin_space(other).unwrap_or(SpaceKind::Unsupported),
                None => SpaceKind::Unsupported,
            },
            _ => SpaceKind::Unsupported,
        }
    }

    fn is_two_byte_font(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> bool {
        let doc = self.doc;
        resources
            .and_then(|r| get_dict(doc, r, b"Font"))
            .and_then(|fonts| get_dict(doc, fonts, name))
            .and_then(|font| dict_get(doc, font, b"Subtype"))
            .and_then(name_of)
            == Some(b"Type0".as_slice())
    }
}

enum TextPiece<'b> {
    Bytes(&'b [u8]),
    Adjust(f64),
}

fn builtin_space(name: &[u8]) -> Option<SpaceKind> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(SpaceKind::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(SpaceKind::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(SpaceKind::Cmyk),
        _ => None,
    }
}

/// Spot colorants other than black would need the tint transform evaluated
fn is_black_colorant(name: &[u8]) -> bool {
    matches!(name, b"Black" | b"All")
}

fn set_color(gs: &mut GraphicsState, kind: SpaceKind, components: &[f64]) {
    gs.fill_space = kind;
    gs.fill_color = ColorSample::from_components(components);
}

fn matrix_from(values: &[f64]) -> Option<Matrix> {
    match *values {
        [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}
