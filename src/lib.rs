//! # Image Thumbs
//!
//! Load images from a filesystem path, a URL or memory, inspect them without
//! decoding, transform them through an interchangeable imaging backend, and
//! cut scaled thumbnail sets.
//!
//! # Architecture: Lazy Images Over Pluggable Backends
//!
//! ```text
//! src ──► FileLocation ──► Image / ImmutableImage ──► ImageBackend ──► file
//!          (url ↔ path)     (lazy metadata, lazy      (fast-resize,
//!                            decode)                    lanczos, sample)
//! ```
//!
//! An image is created from a source string and does nothing until asked.
//! Asking for its type, size or file size reads only the header, from disk
//! or from the first bytes of an HTTP response. Asking for a transform
//! decodes the pixels once through the configured backend.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `image-thumbs.toml` loading over stock defaults, validation, runtime [`config::Configuration`] |
//! | [`location`] | Resolves a source to a URL and/or local path through the base URI ↔ web root mapping |
//! | [`probe`] | Header-only metadata for files, byte buffers and URLs (HTTP range requests) |
//! | [`imaging`] | The [`imaging::ImageBackend`] trait, its three backends, encoding and decoding |
//! | [`entity`] | [`entity::Image`] (mutable) and [`entity::ImmutableImage`], built by [`entity::ImageFactory`] |
//! | [`thumbnails`] | Resize strategies and [`thumbnails::ThumbnailsMaker`] for scaled thumbnail sets |
//! | [`types`] | Shared geometry: `Dimensions`, `ImageSize`, `ImageArea` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Local Before Remote
//!
//! A URL under the configured base URI is served by the local web root, so
//! it is read from disk rather than fetched. Only foreign URLs touch the
//! network, and metadata for those comes from a ranged request for the
//! first 64 KiB.
//!
//! ## Backends Own Their Resources
//!
//! Each backend decodes into its own pixel representation. A decoded
//! resource records which backend produced it, and handing it to another
//! backend is an error rather than a silent conversion.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate; the default backend uses
//! `fast_image_resize` for SIMD convolution. No system libraries are needed.

pub mod config;
pub mod entity;
pub mod imaging;
pub mod location;
pub mod output;
pub mod probe;
pub mod thumbnails;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
