//! Geometry primitives and color classification
//! Author: kartik4091
//! Created: 2025-06-07
//!
//! Rectangles live in page (user) space. Nothing here knows about PDF
//! objects; the backend converts operands into these types.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle, always stored with `x0 <= x1` and `y0 <= y1`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Creates a rectangle from any two opposite corners
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle as written by the `re` operator: origin plus extent
    pub fn from_origin(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// True when every bound differs from `other` by less than `tolerance`
    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        (self.x0 - other.x0).abs() < tolerance
            && (self.y0 - other.y0).abs() < tolerance
            && (self.x1 - other.x1).abs() < tolerance
            && (self.y1 - other.y1).abs() < tolerance
    }

    /// True when this rectangle sticks out of `outer` by more than `margin` on any side
    pub fn exceeds(&self, outer: &Rect, margin: f64) -> bool {
        self.x0 < outer.x0 - margin
            || self.y0 < outer.y0 - margin
            || self.x1 > outer.x1 + margin
            || self.y1 > outer.y1 + margin
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlapping part of both; `None` when they do not share any area
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let shared = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (!shared.is_degenerate()).then_some(shared)
    }

    /// Bounding box of a non-empty point set
    pub fn bounding(points: &[(f64, f64)]) -> Option<Rect> {
        let (first, rest) = points.split_first()?;
        let mut rect = Rect::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            rect = rect.union(&Rect::new(x, y, x, y));
        }
        Some(rect)
    }
}

/// Area shared by two rectangles; zero when disjoint or either is degenerate
pub fn intersection_area(a: &Rect, b: &Rect) -> f64 {
    if a.is_degenerate() || b.is_degenerate() {
        return 0.0;
    }
    let width = a.x1.min(b.x1) - a.x0.max(b.x0);
    let height = a.y1.min(b.y1) - a.y0.max(b.y0);
    if width <= 0.0 || height <= 0.0 {
        return 0.0;
    }
    width * height
}

/// A fill or text color in one of the device color spaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", content = "components", rename_all = "lowercase")]
pub enum ColorSample {
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
}

impl ColorSample {
    /// Builds a sample from raw operands; the component count picks the space
    pub fn from_components(components: &[f64]) -> Option<Self> {
        let c = |v: f64| v.clamp(0.0, 1.0);
        match *components {
            [g] => Some(ColorSample::Gray(c(g))),
            [r, g, b] => Some(ColorSample::Rgb(c(r), c(g), c(b))),
            [cy, m, y, k] => Some(ColorSample::Cmyk(c(cy), c(m), c(y), c(k))),
            _ => None,
        }
    }

    pub fn black() -> Self {
        ColorSample::Gray(0.0)
    }
}

/// Near-black test used for redaction fills.
///
/// Gray: value at or below the threshold. RGB: every channel at or below it.
/// CMYK: strong key ink with little of the other three.
pub fn is_black_like(color: Option<&ColorSample>, threshold: f64) -> bool {
    match color {
        None => false,
        Some(ColorSample::Gray(g)) => *g <= threshold,
        Some(ColorSample::Rgb(r, g, b)) => *r <= threshold && *g <= threshold && *b <= threshold,
        Some(ColorSample::Cmyk(c, m, y, k)) => {
            *k >= 1.0 - threshold && *c <= threshold && *m <= threshold && *y <= threshold
        }
    }
}

/// Near-white test used for invisible text
pub fn is_white_like(color: Option<&ColorSample>, tolerance: f64) -> bool {
    let floor = 1.0 - tolerance;
    match color {
        None => false,
        Some(ColorSample::Gray(g)) => *g >= floor,
        Some(ColorSample::Rgb(r, g, b)) => *r >= floor && *g >= floor && *b >= floor,
        Some(ColorSample::Cmyk(c, m, y, k)) => {
            *c <= tolerance && *m <= tolerance && *y <= tolerance && *k <= tolerance
        }
    }
}

/// PDF affine transform `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self` applied first, then `other`
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of the transformed corners
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.x0, rect.y0),
            self.transform_point(rect.x1, rect.y0),
            self.transform_point(rect.x0, rect.y1),
            self.transform_point(rect.x1, rect.y1),
        ];
        Rect::bounding(&corners).unwrap_or(*rect)
    }
}
