//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines (pure, unit
//! testable) and, where the command prints more than one line, a `print_*`
//! wrapper writing to stdout. Logging goes to stderr through `tracing`, so
//! stdout stays clean for piping.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! photos/sunset.jpg
//!     URL: https://example.com/photos/sunset.jpg
//!     Path: /var/www/photos/sunset.jpg
//!     Type: image/jpeg
//!     Size: 1600x1200
//!     File size: 239.4 KB
//! ```
//!
//! `info --json` prints the same fields as one JSON object.
//!
//! ## Thumbnails
//!
//! ```text
//! photos/sunset.jpg (1600x1200, fit 200x150)
//!     1x: 200x150 → thumbnails/sunset-200x150.jpg
//!     2x: 400x300 → thumbnails/sunset-400x300.jpg
//!     10x: skipped
//! Created 2 thumbnails
//! ```

use crate::entity::{ImageError, ImageInfo};
use crate::thumbnails::{ImageWithThumbnails, ThumbnailRequest};
use crate::types::Dimensions;
use serde::Serialize;
use std::path::Path;

/// Everything `info` reports about one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub source: String,
    pub url: Option<String>,
    pub path: Option<String>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

impl ImageReport {
    /// Gather the report. Probes headers only; pixels are not decoded.
    pub fn collect(source: &str, image: &impl ImageInfo) -> Result<Self, ImageError> {
        let size = image.size()?;
        let location = image.location();
        Ok(Self {
            source: source.to_string(),
            url: location.and_then(|l| l.url()).map(str::to_string),
            path: location
                .and_then(|l| l.path())
                .map(|p| p.display().to_string()),
            mime_type: image.image_type()?.to_mime_type().to_string(),
            width: size.width,
            height: size.height,
            file_size: image.file_size()?,
        })
    }
}

/// Human-readable byte count: `512 B`, `239.4 KB`, `3.1 MB`.
fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

// ============================================================================
// Info
// ============================================================================

pub fn format_info(report: &ImageReport) -> Vec<String> {
    let mut lines = vec![report.source.clone()];
    if let Some(url) = &report.url {
        lines.push(format!("    URL: {url}"));
    }
    if let Some(path) = &report.path {
        lines.push(format!("    Path: {path}"));
    }
    lines.push(format!("    Type: {}", report.mime_type));
    lines.push(format!(
        "    Size: {}",
        Dimensions::new(report.width, report.height)
    ));
    if let Some(size) = report.file_size {
        lines.push(format!("    File size: {}", human_bytes(size)));
    }
    lines
}

pub fn format_info_json(report: &ImageReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

pub fn print_info(report: &ImageReport) {
    for line in format_info(report) {
        println!("{line}");
    }
}

// ============================================================================
// Thumbnails
// ============================================================================

pub fn format_thumbnails(
    source: &str,
    original: Dimensions,
    request: &ThumbnailRequest,
    result: &ImageWithThumbnails,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{source} ({original}, {} {})",
        request.policy, request.size
    )];
    for (scale, thumb) in &result.thumbnails {
        lines.push(format!(
            "    {scale}: {} → {}",
            thumb.size,
            display_path(&thumb.path)
        ));
    }

    let mut skipped: Vec<f64> = Vec::new();
    for &s in &request.scales {
        let made = result.thumbnails.keys().any(|k| k.0 == s);
        if !made && !skipped.contains(&s) {
            skipped.push(s);
        }
    }
    for s in skipped {
        lines.push(format!("    {s}x: skipped"));
    }

    let n = result.thumbnails.len();
    lines.push(format!(
        "Created {n} thumbnail{}",
        if n == 1 { "" } else { "s" }
    ));
    lines
}

pub fn print_thumbnails(
    source: &str,
    original: Dimensions,
    request: &ThumbnailRequest,
    result: &ImageWithThumbnails,
) {
    for line in format_thumbnails(source, original, request, result) {
        println!("{line}");
    }
}

// ============================================================================
// Single transforms
// ============================================================================

/// One line for `crop` / `resize`: `photo.jpg 1200x1200 → 400x500 out.jpg`.
pub fn format_saved(source: &str, before: Dimensions, after: Dimensions, output: &Path) -> String {
    format!("{source} {before} → {after} {}", display_path(output))
}

fn display_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ImageReport {
        ImageReport {
            source: "photos/sunset.jpg".into(),
            url: Some("https://example.com/photos/sunset.jpg".into()),
            path: Some("/var/www/photos/sunset.jpg".into()),
            mime_type: "image/jpeg".into(),
            width: 1600,
            height: 1200,
            file_size: Some(245_145),
        }
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(245_145), "239.4 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024 + 100_000), "3.1 MB");
    }

    #[test]
    fn info_lists_all_fields() {
        assert_eq!(
            format_info(&report()),
            vec![
                "photos/sunset.jpg",
                "    URL: https://example.com/photos/sunset.jpg",
                "    Path: /var/www/photos/sunset.jpg",
                "    Type: image/jpeg",
                "    Size: 1600x1200",
                "    File size: 239.4 KB",
            ]
        );
    }

    #[test]
    fn info_omits_missing_fields() {
        let r = ImageReport {
            url: None,
            path: None,
            file_size: None,
            ..report()
        };
        let lines = format_info(&r);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| !l.contains("URL") && !l.contains("File size")));
    }

    #[test]
    fn info_json_has_keys() {
        let json = format_info_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["width"], 1600);
        assert_eq!(value["mime_type"], "image/jpeg");
        assert_eq!(value["file_size"], 245_145);
    }

    #[test]
    fn saved_line() {
        let line = format_saved(
            "a.jpg",
            Dimensions::new(1200, 1200),
            Dimensions::new(400, 500),
            Path::new("out/a.jpg"),
        );
        assert_eq!(line, "a.jpg 1200x1200 → 400x500 out/a.jpg");
    }
}
