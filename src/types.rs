//! Plain value types shared by every stage: pixel sizes and crop rectangles.
//!
//! - [`Dimensions`] — a fully known pixel size (what a decoded image has).
//! - [`ImageSize`] — a requested size where either side may be left open.
//! - [`ImageArea`] — a crop rectangle inside a source image.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("image size needs at least a width or a height")]
    Empty,
}

/// Width and height of an actual image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A requested size. Either side may be absent, but not both.
///
/// Fields are public so the type can be read from configuration files; values
/// built through [`ImageSize::new`] are always valid, deserialized ones are
/// checked by whoever consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageSize {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Result<Self, SizeError> {
        if width.is_none() && height.is_none() {
            return Err(SizeError::Empty);
        }
        Ok(Self { width, height })
    }

    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Multiply every specified side by `factor`, rounding to the nearest pixel.
    pub fn scale(&self, factor: f64) -> Self {
        let scale = |v: u32| (v as f64 * factor).round().max(0.0) as u32;
        Self {
            width: self.width.map(scale),
            height: self.height.map(scale),
        }
    }

    /// A specified side of zero pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width == Some(0) || self.height == Some(0)
    }

    /// True when every specified side is strictly smaller than `other`.
    pub fn less_than(&self, other: Dimensions) -> bool {
        if self.is_empty() {
            return false;
        }
        self.width.is_none_or(|w| w < other.width) && self.height.is_none_or(|h| h < other.height)
    }
}

impl From<Dimensions> for ImageSize {
    fn from(d: Dimensions) -> Self {
        Self::exact(d.width, d.height)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
        write!(f, "{}x{}", side(self.width), side(self.height))
    }
}

/// Rectangle of a source image to sample from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageArea {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The area covering all of an image.
    pub fn whole(size: Dimensions) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Non-empty and entirely inside an image of the given size.
    pub fn fits(&self, size: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= size.width as u64
            && self.y as u64 + self.height as u64 <= size.height as u64
    }
}

impl fmt::Display for ImageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
