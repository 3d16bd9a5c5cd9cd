//! Decode and encode shared by every backend.
//!
//! All three backends read through the `image` crate's decoders and write
//! through its encoders; only the pixel work in between differs.
//!
//! | Format | Encoder | Notes |
//! |---|---|---|
//! | JPEG | `JpegEncoder::new_with_quality` | alpha and 16-bit are flattened to 8-bit RGB/Luma |
//! | PNG | `PngEncoder::new_with_quality` | compression preset from [`Compression`](super::Compression) |
//! | GIF, WebP, TIFF, BMP | `DynamicImage::write_to` | converted to 8-bit RGB(A); WebP is lossless |
//!
//! Palette images are expanded to RGB(A) by the decoders, so every backend
//! only ever sees true-color or grayscale pixels.

use super::backend::{BackendError, SourceData};
use super::params::EncodeOptions;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{FilterType as PngFilter, PngEncoder};
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufWriter, Cursor, Seek, Write};
use std::path::Path;

/// Formats this build can write.
pub const WRITABLE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Tiff,
    ImageFormat::Bmp,
];

pub fn is_writable(format: ImageFormat) -> bool {
    WRITABLE_FORMATS.contains(&format)
}

/// Format implied by a file extension, if any.
pub fn format_from_path(path: &Path) -> Option<ImageFormat> {
    ImageFormat::from_path(path).ok()
}

/// Preferred file extension for a format (`jpg` for JPEG).
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Decode `source`, sniffing the format from content unless `hint` is given.
pub(crate) fn decode(
    source: SourceData<'_>,
    hint: Option<ImageFormat>,
) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let origin = source.describe();
    match source {
        SourceData::Path(path) => decode_reader(ImageReader::open(path)?, hint, origin),
        SourceData::Bytes(bytes) => decode_reader(ImageReader::new(Cursor::new(bytes)), hint, origin),
    }
}

fn decode_reader<R: BufRead + Seek>(
    mut reader: ImageReader<R>,
    hint: Option<ImageFormat>,
    origin: String,
) -> Result<(DynamicImage, ImageFormat), BackendError> {
    match hint {
        Some(format) => reader.set_format(format),
        None => reader = reader.with_guessed_format()?,
    }
    let Some(format) = reader.format() else {
        return Err(BackendError::Decode {
            origin,
            reason: "unrecognized image format".into(),
        });
    };
    let img = reader.decode().map_err(|e| BackendError::Decode {
        origin: origin.clone(),
        reason: e.to_string(),
    })?;
    Ok((img, format))
}

/// Encode `img` as `format` into `path`, creating parent directories.
pub(crate) fn encode(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    options: &EncodeOptions,
) -> Result<(), BackendError> {
    let fail = |reason: String| BackendError::Encode {
        format,
        path: path.display().to_string(),
        reason,
    };
    if !is_writable(format) {
        return Err(fail("no encoder available for this format".into()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let result = match format {
        ImageFormat::Jpeg => {
            let encoder =
                JpegEncoder::new_with_quality(&mut writer, options.jpeg_quality.value() as u8);
            jpeg_compatible(img).write_with_encoder(encoder)
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut writer,
                options.png_compression.png(),
                PngFilter::Adaptive,
            );
            png_compatible(img).write_with_encoder(encoder)
        }
        other => eight_bit(img).write_to(&mut writer, other),
    };
    result.map_err(|e| fail(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

fn jpeg_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(img),
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            Cow::Owned(DynamicImage::ImageLuma8(img.to_luma8()))
        }
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

fn png_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => {
            Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16()))
        }
        _ => Cow::Borrowed(img),
    }
}

fn eight_bit(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(img),
        c if c.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}
