//! Imaging backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one contract every imaging library is
//! wrapped in: open, clone, size, crop, resize, crop-and-resize and save over
//! an opaque [`DecodedResource`].
//!
//! Backends differ in how they hold pixels. The `image`-crate backends keep a
//! value-like `DynamicImage`; the SIMD backend keeps a native pixel buffer and
//! rewrites it in place. The trait hides this behind in-place primitives plus
//! two provided methods that define the mutability seam:
//!
//! | Method | Semantics |
//! |---|---|
//! | [`ImageBackend::apply`] | transform the handle in place (mutable images) |
//! | [`ImageBackend::applied`] | clone, transform the clone, leave the input untouched (immutable images) |
//!
//! Release is ownership: dropping a `DecodedResource` frees its pixels, so a
//! resource is released exactly once whichever path the caller leaves by.

use crate::config::ConfigError;
use crate::types::{Dimensions, ImageArea};
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {origin}: {reason}")]
    Decode { origin: String, reason: String },
    #[error("Cannot encode {format:?} to {path}: {reason}")]
    Encode {
        format: ImageFormat,
        path: String,
        reason: String,
    },
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Resource was opened by the {0} backend")]
    ForeignResource(BackendKind),
}

/// Where a backend reads encoded bytes from.
///
/// Backends never fetch remote URLs themselves: callers download the bytes
/// and pass them as [`SourceData::Bytes`].
#[derive(Debug, Clone, Copy)]
pub enum SourceData<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl SourceData<'_> {
    pub fn describe(&self) -> String {
        match self {
            SourceData::Path(p) => p.display().to_string(),
            SourceData::Bytes(b) => format!("<{} bytes in memory>", b.len()),
        }
    }
}

/// Pixel storage behind a [`DecodedResource`], one variant per storage model.
pub(crate) enum Pixels {
    Dynamic(DynamicImage),
    #[cfg(feature = "fast-resize")]
    Buffer(super::fast_resize::PixelBuffer),
}

/// Opaque handle to decoded pixels, owned by exactly one image at a time.
pub struct DecodedResource {
    format: ImageFormat,
    owner: BackendKind,
    pixels: Pixels,
}

impl DecodedResource {
    pub(crate) fn new(owner: BackendKind, format: ImageFormat, pixels: Pixels) -> Self {
        Self {
            format,
            owner,
            pixels,
        }
    }

    /// Format the pixels were decoded from.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Backend that opened this resource.
    pub fn owner(&self) -> BackendKind {
        self.owner
    }

    pub fn dimensions(&self) -> Dimensions {
        match &self.pixels {
            Pixels::Dynamic(img) => Dimensions::new(img.width(), img.height()),
            #[cfg(feature = "fast-resize")]
            Pixels::Buffer(buf) => buf.dimensions(),
        }
    }

    pub(crate) fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut Pixels {
        &mut self.pixels
    }

    /// Borrow the `DynamicImage` payload, rejecting handles from other backends.
    pub(crate) fn dynamic(&self, expected: BackendKind) -> Result<&DynamicImage, BackendError> {
        match (&self.pixels, self.owner == expected) {
            (Pixels::Dynamic(img), true) => Ok(img),
            _ => Err(BackendError::ForeignResource(self.owner)),
        }
    }

    pub(crate) fn dynamic_mut(
        &mut self,
        expected: BackendKind,
    ) -> Result<&mut DynamicImage, BackendError> {
        let owner = self.owner;
        match (&mut self.pixels, owner == expected) {
            (Pixels::Dynamic(img), true) => Ok(img),
            _ => Err(BackendError::ForeignResource(owner)),
        }
    }
}

impl fmt::Debug for DecodedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedResource")
            .field("owner", &self.owner)
            .field("format", &self.format)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

/// A pixel transformation, applied in place or on a clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Crop(ImageArea),
    Resize(Dimensions),
    CropAndResize(ImageArea, Dimensions),
}

/// Contract every imaging backend satisfies.
///
/// Implementations only provide the in-place primitives; `apply` and
/// `applied` are derived from them.
pub trait ImageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Decode an image. `format_hint` skips content sniffing when known.
    fn open(
        &self,
        source: SourceData<'_>,
        format_hint: Option<ImageFormat>,
    ) -> Result<DecodedResource, BackendError>;

    /// Release a resource. Consuming it means it cannot be released twice.
    fn close(&self, resource: DecodedResource) {
        debug!(backend = %self.kind(), "closing {:?}", resource);
        drop(resource);
    }

    /// Deep copy: mutating the copy never affects the original.
    fn clone_resource(&self, resource: &DecodedResource) -> Result<DecodedResource, BackendError>;

    fn size(&self, resource: &DecodedResource) -> Dimensions {
        resource.dimensions()
    }

    fn crop(&self, resource: &mut DecodedResource, area: ImageArea) -> Result<(), BackendError>;

    fn resize(&self, resource: &mut DecodedResource, size: Dimensions) -> Result<(), BackendError>;

    /// Crop then resize. Backends with a combined operation override this to
    /// skip the intermediate buffer.
    fn crop_and_resize(
        &self,
        resource: &mut DecodedResource,
        area: ImageArea,
        size: Dimensions,
    ) -> Result<(), BackendError> {
        self.crop(resource, area)?;
        self.resize(resource, size)
    }

    /// Re-encode to `path`. Fails with [`BackendError::Encode`] naming the
    /// format when it cannot be written.
    fn save(
        &self,
        resource: &DecodedResource,
        path: &Path,
        format: ImageFormat,
    ) -> Result<(), BackendError>;

    /// Transform `resource` in place.
    fn apply(&self, resource: &mut DecodedResource, op: Transform) -> Result<(), BackendError> {
        match op {
            Transform::Crop(area) => self.crop(resource, area),
            Transform::Resize(size) => self.resize(resource, size),
            Transform::CropAndResize(area, size) => self.crop_and_resize(resource, area, size),
        }
    }

    /// Transform a clone of `resource`, leaving the input untouched.
    fn applied(
        &self,
        resource: &DecodedResource,
        op: Transform,
    ) -> Result<DecodedResource, BackendError> {
        let mut copy = self.clone_resource(resource)?;
        self.apply(&mut copy, op)?;
        Ok(copy)
    }
}

/// Reject crop rectangles that are empty or leave the image.
pub(crate) fn check_area(area: ImageArea, size: Dimensions) -> Result<(), BackendError> {
    if area.fits(size) {
        Ok(())
    } else {
        Err(BackendError::UnsupportedOperation(format!(
            "crop {area} is outside a {size} image"
        )))
    }
}

pub(crate) fn check_size(size: Dimensions) -> Result<(), BackendError> {
    if size.width == 0 || size.height == 0 {
        return Err(BackendError::UnsupportedOperation(format!(
            "cannot resize to {size}"
        )));
    }
    Ok(())
}

// =============================================================================
// Backend registry
// =============================================================================

/// Identifier of an imaging backend, as written in `backend_priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// `fast_image_resize` SIMD convolution over a native pixel buffer.
    FastResize,
    /// `image` crate, Lanczos3 resampling.
    Lanczos,
    /// `image` crate, integer area sampling.
    Sample,
}

impl BackendKind {
    pub const DEFAULT_PRIORITY: [BackendKind; 3] = [
        BackendKind::FastResize,
        BackendKind::Lanczos,
        BackendKind::Sample,
    ];

    pub fn id(self) -> &'static str {
        match self {
            BackendKind::FastResize => "fast-resize",
            BackendKind::Lanczos => "lanczos",
            BackendKind::Sample => "sample",
        }
    }

    /// Whether this backend was compiled into the binary.
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::FastResize => cfg!(feature = "fast-resize"),
            BackendKind::Lanczos | BackendKind::Sample => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown imaging backend \"{0}\" (expected fast-resize, lanczos or sample)")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast-resize" | "fast_resize" => Ok(BackendKind::FastResize),
            "lanczos" => Ok(BackendKind::Lanczos),
            "sample" => Ok(BackendKind::Sample),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Pick the first backend in `priority` that `is_available` accepts.
pub fn select_backend(
    priority: &[BackendKind],
    is_available: impl Fn(BackendKind) -> bool,
) -> Result<BackendKind, ConfigError> {
    for &kind in priority {
        if is_available(kind) {
            info!(backend = %kind, "selected imaging backend");
            return Ok(kind);
        }
        debug!(backend = %kind, "imaging backend not installed, trying next");
    }
    Err(ConfigError::NoBackend(priority.to_vec()))
}
