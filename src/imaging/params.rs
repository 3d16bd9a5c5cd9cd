//! Encoder parameters passed through to the active backend.
//!
//! - [`Quality`] — lossy quality (1–100, default 95). Clamped on construction.
//! - [`Compression`] — lossless compression level (0–9, default 9). Clamped.
//! - [`EncodeOptions`] — the full set handed to `save`.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Compression level for lossless encoders (0 = fastest, 9 = smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression(pub u32);

impl Compression {
    pub fn new(value: u32) -> Self {
        Self(value.min(9))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Map the 0-9 level onto the three presets the PNG encoder offers.
    pub(crate) fn png(self) -> image::codecs::png::CompressionType {
        use image::codecs::png::CompressionType;
        match self.0 {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self(9)
    }
}

/// Per-format encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub jpeg_quality: Quality,
    pub png_compression: Compression,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::CompressionType;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_95() {
        assert_eq!(Quality::default().value(), 95);
    }

    #[test]
    fn compression_clamps_to_nine() {
        assert_eq!(Compression::new(12).value(), 9);
        assert_eq!(Compression::default().value(), 9);
    }

    #[test]
    fn compression_levels_map_to_png_presets() {
        assert!(matches!(Compression::new(0).png(), CompressionType::Fast));
        assert!(matches!(Compression::new(5).png(), CompressionType::Default));
        assert!(matches!(Compression::new(9).png(), CompressionType::Best));
    }
}
