//! Shared test utilities.
//!
//! Provides synthetic image writers and a throwaway web root, so no test
//! depends on binary fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (root, config) = web_root_config("https://example.com/");
//! let photo = root.path().join("images/photo.jpg");
//! create_test_jpeg(&photo, 1600, 1200);
//! ```

use crate::config::Configuration;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn write(img: &DynamicImage, path: &Path, format: ImageFormat) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save_with_format(path, format).unwrap();
}

/// Write a gradient JPEG, creating parent directories.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    write(&DynamicImage::ImageRgb8(gradient(width, height)), path, ImageFormat::Jpeg);
}

/// Write a gradient PNG with a translucent alpha channel.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 200])
    });
    write(&DynamicImage::ImageRgba8(img), path, ImageFormat::Png);
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

// =========================================================================
// Configuration
// =========================================================================

/// Temp web root plus a configuration pointing `base_uri` at it.
///
/// Keep the `TempDir` alive for as long as the configuration is used.
pub fn web_root_config(base_uri: &str) -> (TempDir, Configuration) {
    let tmp = TempDir::new().unwrap();
    let config = Configuration::new(base_uri, tmp.path()).unwrap();
    (tmp, config)
}
