//! Image processing behind a swappable backend.
//!
//! | Backend | Crate / function | Storage |
//! |---|---|---|
//! | **fast-resize** | `fast_image_resize` Lanczos3 convolution | native 8-bit buffer, edited in place |
//! | **lanczos** | `image::DynamicImage::resize_exact` | `DynamicImage` |
//! | **sample** | `image::DynamicImage::thumbnail_exact` | `DynamicImage` |
//!
//! The module is split into:
//! - **Backend**: [`ImageBackend`] trait, [`BackendKind`] registry, [`select_backend`]
//! - **Codec**: decode/encode shared by all backends
//! - **Parameters**: encoder settings ([`Quality`], [`Compression`])
//! - One file per backend implementation

pub mod backend;
pub mod codec;
#[cfg(feature = "fast-resize")]
mod fast_resize;
mod params;
mod rust_backend;

use crate::config::ConfigError;
use std::sync::Arc;

pub use backend::{
    BackendError, BackendKind, DecodedResource, ImageBackend, SourceData, Transform,
    UnknownBackend, select_backend,
};
#[cfg(feature = "fast-resize")]
pub use fast_resize::FastResizeBackend;
pub use params::{Compression, EncodeOptions, Quality};
pub use rust_backend::RustBackend;

/// Instantiate the backend for `kind`.
///
/// Fails with [`ConfigError::NoBackend`] when `kind` was not compiled in.
pub fn create_backend(
    kind: BackendKind,
    encoding: EncodeOptions,
) -> Result<Arc<dyn ImageBackend>, ConfigError> {
    match kind {
        #[cfg(feature = "fast-resize")]
        BackendKind::FastResize => Ok(Arc::new(FastResizeBackend::new(encoding))),
        #[cfg(not(feature = "fast-resize"))]
        BackendKind::FastResize => Err(ConfigError::NoBackend(vec![kind])),
        BackendKind::Lanczos => Ok(Arc::new(RustBackend::lanczos(encoding))),
        BackendKind::Sample => Ok(Arc::new(RustBackend::sample(encoding))),
    }
}
