//! Layout System - Canvas and Badge Placement

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Invalid geometry '{0}', expected WIDTHxHEIGHT+X+Y")]
    Invalid(String),

    #[error("Geometry '{0}' has a zero dimension")]
    ZeroSize(String),
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to read layout: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse layout: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Placement of a layer on the canvas, `WIDTHxHEIGHT+X+Y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32, x: i32, y: i32) -> Self {
        Self { width, height, x, y }
    }

    pub fn fits_within(&self, canvas: &Canvas) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= canvas.width as i64
            && self.y as i64 + self.height as i64 <= canvas.height as i64
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        let (ax0, ay0) = (self.x as i64, self.y as i64);
        let (ax1, ay1) = (ax0 + self.width as i64, ay0 + self.height as i64);
        let (bx0, by0) = (other.x as i64, other.y as i64);
        let (bx1, by1) = (bx0 + other.width as i64, by0 + other.height as i64);
        ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for Geometry {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GeometryError::Invalid(s.to_string());

        let (width, rest) = s.split_once('x').ok_or_else(invalid)?;
        let offset_at = rest.find(['+', '-']).ok_or_else(invalid)?;
        let (height, offsets) = rest.split_at(offset_at);
        let y_at = offsets[1..]
            .find(['+', '-'])
            .map(|i| i + 1)
            .ok_or_else(invalid)?;
        let (x, y) = offsets.split_at(y_at);

        let geometry = Geometry {
            width: width.parse().map_err(|_| invalid())?,
            height: height.parse().map_err(|_| invalid())?,
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
        };

        if geometry.width == 0 || geometry.height == 0 {
            return Err(GeometryError::ZeroSize(s.to_string()));
        }
        Ok(geometry)
    }
}

impl TryFrom<String> for Geometry {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Geometry> for String {
    fn from(value: Geometry) -> Self {
        value.to_string()
    }
}

/// Transparent canvas every recipe starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    #[serde(default = "default_canvas_side")]
    pub width: u32,
    #[serde(default = "default_canvas_side")]
    pub height: u32,
    #[serde(default = "default_depth")]
    pub depth: u8,
}

fn default_canvas_side() -> u32 { 128 }
fn default_depth() -> u8 { 8 }

impl Canvas {
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: default_canvas_side(),
            height: default_canvas_side(),
            depth: default_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub canvas: Canvas,
    /// Armored / combo / parry badge position
    #[serde(default = "default_augment_badge")]
    pub augment_badge: Geometry,
    #[serde(default = "default_aspect_badge")]
    pub aspect_badge: Geometry,
}

fn default_augment_badge() -> Geometry { Geometry::new(48, 48, 8, 72) }
fn default_aspect_badge() -> Geometry { Geometry::new(48, 48, 72, 72) }

impl Layout {
    /// Missing fields fall back to the stock 128x128 layout.
    pub fn load_from_file(path: &Path) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            augment_badge: default_augment_badge(),
            aspect_badge: default_aspect_badge(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_display() {
        assert_eq!(Geometry::new(48, 48, 8, 72).to_string(), "48x48+8+72");
        assert_eq!(Geometry::new(10, 20, -4, 0).to_string(), "10x20-4+0");
    }

    #[test]
    fn test_geometry_parse() {
        assert_eq!("48x48+72+72".parse(), Ok(Geometry::new(48, 48, 72, 72)));
        assert_eq!("16x8-2+3".parse(), Ok(Geometry::new(16, 8, -2, 3)));
    }

    #[test]
    fn test_geometry_parse_rejects_garbage() {
        assert!(matches!("48x48".parse::<Geometry>(), Err(GeometryError::Invalid(_))));
        assert!(matches!("x48+1+1".parse::<Geometry>(), Err(GeometryError::Invalid(_))));
        assert!(matches!("48x48+1".parse::<Geometry>(), Err(GeometryError::Invalid(_))));
        assert!(matches!("0x48+1+1".parse::<Geometry>(), Err(GeometryError::ZeroSize(_))));
    }

    #[test]
    fn test_default_badges_fit_and_do_not_overlap() {
        let layout = Layout::default();
        assert!(layout.augment_badge.fits_within(&layout.canvas));
        assert!(layout.aspect_badge.fits_within(&layout.canvas));
        assert!(!layout.augment_badge.intersects(&layout.aspect_badge));
    }

    #[test]
    fn test_partial_layout_uses_defaults() {
        let layout: Layout = serde_json::from_str(r#"{"aspectBadge": "32x32+90+90"}"#).unwrap();
        assert_eq!(layout.canvas, Canvas::default());
        assert_eq!(layout.augment_badge, Geometry::new(48, 48, 8, 72));
        assert_eq!(layout.aspect_badge, Geometry::new(32, 32, 90, 90));
    }
}
