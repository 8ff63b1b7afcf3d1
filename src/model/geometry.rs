//! Page geometry and text styling types.
//!
//! Coordinates use a top-left origin with y growing downwards, in points
//! (1 point = 1/72 inch).

use serde::{Deserialize, Serialize};

/// A point on a page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Return this point moved by `dx` and `dy`.
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle on a page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl Rect {
    /// Create a new rectangle from its edges.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Top-left corner.
    pub fn top_left(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Check if the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Check if a point lies inside the rectangle (edges included).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    /// Check if two rectangles overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }
}

/// An RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Create a color from RGB components, clamped to `0.0..=1.0`.
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Create a gray level color.
    pub fn gray(level: f32) -> Self {
        Self::rgb(level, level, level)
    }

    /// Convert a CMYK color (naive conversion, no color profile).
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }

    /// Create a color from a packed `0xRRGGBB` integer.
    pub fn from_rgb_int(value: u32) -> Self {
        let r = ((value >> 16) & 0xFF) as f32 / 255.0;
        let g = ((value >> 8) & 0xFF) as f32 / 255.0;
        let b = (value & 0xFF) as f32 / 255.0;
        Self { r, g, b }
    }

    /// Pack the color into a `0xRRGGBB` integer.
    pub fn to_rgb_int(&self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Hex representation, e.g. `#FF0000`.
    pub fn to_hex(&self) -> String {
        format!("#{:06X}", self.to_rgb_int())
    }
}

/// A run of text sharing one font family, size, and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSpan {
    /// The text content
    pub text: String,
    /// Region covered by the run
    pub bbox: Rect,
    /// Font family name (e.g., "Helvetica-Bold")
    pub font: String,
    /// Font size in points
    pub size: f32,
    /// Fill color
    pub color: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_and_intersects() {
        let rect = Rect::new(10.0, 10.0, 50.0, 30.0);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(rect.contains(rect.center()));
        assert!(!rect.contains(Point::new(51.0, 20.0)));

        assert!(rect.intersects(&Rect::new(40.0, 20.0, 60.0, 40.0)));
        assert!(!rect.intersects(&Rect::new(50.0, 10.0, 60.0, 30.0)));
    }

    #[test]
    fn test_rect_union() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 20.0, 8.0);
        assert_eq!(a.union(&b), Rect::new(0.0, -5.0, 20.0, 10.0));
    }

    #[test]
    fn test_color_int_conversion() {
        let color = Color::from_rgb_int(0xFF8000);
        assert_eq!(color.r, 1.0);
        assert_eq!(color.b, 0.0);
        assert_eq!(color.to_rgb_int(), 0xFF8000);
        assert_eq!(color.to_hex(), "#FF8000");
    }

    #[test]
    fn test_color_from_cmyk() {
        assert_eq!(Color::from_cmyk(0.0, 0.0, 0.0, 1.0), Color::BLACK);
        assert_eq!(Color::from_cmyk(0.0, 0.0, 0.0, 0.0), Color::WHITE);
    }
}
