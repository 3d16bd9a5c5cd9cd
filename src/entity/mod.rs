//! Image entities: a source plus lazily resolved metadata and pixels.
//!
//! An entity moves through three states and never goes back:
//!
//! ```text
//! unopened ──metadata query──▶ metadata known ──transform / save──▶ decoded
//!     └──────────────────────transform / save──────────────────────────┘
//! ```
//!
//! Metadata queries take the cheapest route: the decoded resource when there
//! is one, otherwise a header probe of the file, bytes or URL. They never
//! force a decode. Transforms and saves decode first.
//!
//! | Type | Transforms | Result |
//! |---|---|---|
//! | [`Image`] | `&mut self` | same entity, pixels replaced in place |
//! | [`ImmutableImage`] | `&self` | new entity over a deep clone; receiver untouched |
//!
//! Entities are created through an [`ImageFactory`], which owns the
//! configuration, the HTTP transport and the backend selected on first use.

mod immutable;
mod mutable;

pub use immutable::ImmutableImage;
pub use mutable::Image;

use crate::config::{ConfigError, Configuration};
use crate::imaging::{
    self, BackendError, BackendKind, DecodedResource, ImageBackend, SourceData, Transform, codec,
};
use crate::location::{FileLocation, LocationError};
use crate::probe::{self, HttpFetcher, ImageMetadata, ProbeError, UreqFetcher};
use crate::types::{Dimensions, ImageArea};
use image::ImageFormat;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Area {area} is outside the {size} image")]
    InvalidArea { area: ImageArea, size: Dimensions },
}

/// Read-only view shared by both entity kinds.
pub trait ImageInfo {
    /// Where the image came from. `None` for images built from bytes.
    fn location(&self) -> Option<&FileLocation>;

    fn image_type(&self) -> Result<ImageFormat, ImageError>;

    /// Current pixel size. Reflects crops and resizes on mutable images.
    fn size(&self) -> Result<Dimensions, ImageError>;

    fn width(&self) -> Result<u32, ImageError> {
        Ok(self.size()?.width)
    }

    fn height(&self) -> Result<u32, ImageError> {
        Ok(self.size()?.height)
    }

    /// Encoded size of the source. `None` for images built from bytes.
    fn file_size(&self) -> Result<Option<u64>, ImageError>;
}

// =============================================================================
// Factory
// =============================================================================

pub(crate) struct FactoryInner {
    config: Configuration,
    backend: OnceLock<Arc<dyn ImageBackend>>,
    fetcher: Arc<dyn HttpFetcher>,
}

impl FactoryInner {
    /// Backend for this factory, selected on first call and cached.
    fn backend(&self) -> Result<Arc<dyn ImageBackend>, ImageError> {
        if let Some(backend) = self.backend.get() {
            return Ok(Arc::clone(backend));
        }
        let kind = self.config.select_backend()?;
        let backend = imaging::create_backend(kind, *self.config.encoding())?;
        Ok(Arc::clone(self.backend.get_or_init(|| backend)))
    }
}

/// Creates image entities that share one configuration and backend.
#[derive(Clone)]
pub struct ImageFactory {
    inner: Arc<FactoryInner>,
}

impl ImageFactory {
    pub fn new(config: Configuration) -> Self {
        let fetcher = Arc::new(UreqFetcher::new(config.http()));
        Self {
            inner: Arc::new(FactoryInner {
                config,
                backend: OnceLock::new(),
                fetcher,
            }),
        }
    }

    /// Replace the HTTP transport.
    pub fn with_fetcher(self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                config: self.inner.config.clone(),
                backend: self.inner.backend.clone(),
                fetcher,
            }),
        }
    }

    /// Use `backend` instead of selecting one from the priority list.
    pub fn with_backend(self, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                config: self.inner.config.clone(),
                backend: OnceLock::from(backend),
                fetcher: Arc::clone(&self.inner.fetcher),
            }),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    pub fn backend(&self) -> Result<Arc<dyn ImageBackend>, ImageError> {
        self.inner.backend()
    }

    /// Mutable image from a path or URL. Nothing is read yet.
    pub fn create(&self, src: &str) -> Result<Image, ImageError> {
        Ok(Image::from_core(self.core_for(src)?))
    }

    pub fn create_from_bytes(&self, bytes: impl Into<Arc<[u8]>>) -> Image {
        Image::from_core(Core::new(
            Arc::clone(&self.inner),
            Source::Bytes(bytes.into()),
        ))
    }

    pub fn create_immutable(&self, src: &str) -> Result<ImmutableImage, ImageError> {
        Ok(ImmutableImage::from_core(self.core_for(src)?))
    }

    pub fn create_immutable_from_bytes(&self, bytes: impl Into<Arc<[u8]>>) -> ImmutableImage {
        ImmutableImage::from_core(Core::new(
            Arc::clone(&self.inner),
            Source::Bytes(bytes.into()),
        ))
    }

    fn core_for(&self, src: &str) -> Result<Core, ImageError> {
        let location = FileLocation::resolve(src, &self.inner.config)?;
        debug!(src, url = ?location.url(), path = ?location.path(), "resolved image source");
        Ok(Core::new(
            Arc::clone(&self.inner),
            Source::Location(location),
        ))
    }
}

// =============================================================================
// Shared entity state
// =============================================================================

#[derive(Clone)]
pub(crate) enum Source {
    Location(FileLocation),
    Bytes(Arc<[u8]>),
}

/// Provenance, cached probe result and decoded pixels of one entity.
pub(crate) struct Core {
    factory: Arc<FactoryInner>,
    source: Source,
    metadata: OnceLock<ImageMetadata>,
    resource: OnceLock<DecodedResource>,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Image");
        match &self.source {
            Source::Location(location) => out.field("location", location),
            Source::Bytes(bytes) => out.field("bytes", &bytes.len()),
        };
        out.field("metadata", &self.metadata.get());
        match self.resource.get() {
            Some(resource) => out
                .field("decoded_by", &resource.owner())
                .field("size", &resource.dimensions()),
            None => out.field("decoded_by", &None::<BackendKind>),
        };
        out.finish()
    }
}

impl Core {
    fn new(factory: Arc<FactoryInner>, source: Source) -> Self {
        Self {
            factory,
            source,
            metadata: OnceLock::new(),
            resource: OnceLock::new(),
        }
    }

    /// Same provenance over different pixels.
    fn derive(&self, resource: DecodedResource) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            source: self.source.clone(),
            metadata: self.metadata.clone(),
            resource: OnceLock::from(resource),
        }
    }

    fn backend(&self) -> Result<Arc<dyn ImageBackend>, ImageError> {
        self.factory.backend()
    }

    pub(crate) fn location(&self) -> Option<&FileLocation> {
        match &self.source {
            Source::Location(location) => Some(location),
            Source::Bytes(_) => None,
        }
    }

    pub(crate) fn is_decoded(&self) -> bool {
        self.resource.get().is_some()
    }

    fn metadata(&self) -> Result<&ImageMetadata, ImageError> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata);
        }
        let probed = self.probe()?;
        Ok(self.metadata.get_or_init(|| probed))
    }

    fn probe(&self) -> Result<ImageMetadata, ImageError> {
        let http = self.factory.config.http();
        let metadata = match &self.source {
            Source::Bytes(bytes) => probe::probe_bytes(bytes)?,
            Source::Location(location) => match (location.path(), location.url()) {
                (Some(path), _) if path.is_file() => probe::probe_file(path, http)?,
                (_, Some(url)) => probe::probe_url(url, self.factory.fetcher.as_ref(), http)?,
                (Some(path), None) => probe::probe_file(path, http)?,
                (None, None) => return Err(unresolved()),
            },
        };
        Ok(metadata)
    }

    pub(crate) fn image_type(&self) -> Result<ImageFormat, ImageError> {
        match self.resource.get() {
            Some(resource) => Ok(resource.format()),
            None => Ok(self.metadata()?.format),
        }
    }

    pub(crate) fn size(&self) -> Result<Dimensions, ImageError> {
        match self.resource.get() {
            Some(resource) => Ok(resource.dimensions()),
            None => {
                let metadata = self.metadata()?;
                Ok(Dimensions::new(metadata.width, metadata.height))
            }
        }
    }

    pub(crate) fn file_size(&self) -> Result<Option<u64>, ImageError> {
        match self.source {
            Source::Bytes(_) => Ok(None),
            Source::Location(_) => Ok(self.metadata()?.file_size),
        }
    }

    /// The decoded resource, opening it on first use.
    fn decoded(&self) -> Result<&DecodedResource, ImageError> {
        if let Some(resource) = self.resource.get() {
            return Ok(resource);
        }
        let opened = self.open()?;
        Ok(self.resource.get_or_init(|| opened))
    }

    fn decoded_mut(&mut self) -> Result<&mut DecodedResource, ImageError> {
        self.decoded()?;
        self.resource
            .get_mut()
            .ok_or_else(|| ImageError::InvalidState("resource missing after decode".into()))
    }

    fn open(&self) -> Result<DecodedResource, ImageError> {
        let backend = self.backend()?;
        let hint = self.metadata.get().map(|m| m.format);
        let resource = match &self.source {
            Source::Bytes(bytes) => backend.open(SourceData::Bytes(bytes), hint)?,
            Source::Location(location) => match (location.path(), location.url()) {
                (Some(path), _) if path.is_file() => backend.open(SourceData::Path(path), hint)?,
                (_, Some(url)) => {
                    let http = self.factory.config.http();
                    let bytes = probe::download(url, self.factory.fetcher.as_ref(), http)?;
                    let resource = backend.open(SourceData::Bytes(&bytes), hint)?;
                    let size = resource.dimensions();
                    let _ = self.metadata.set(ImageMetadata {
                        format: resource.format(),
                        width: size.width,
                        height: size.height,
                        file_size: Some(bytes.len() as u64),
                    });
                    resource
                }
                (Some(path), None) => backend.open(SourceData::Path(path), hint)?,
                (None, None) => return Err(unresolved()),
            },
        };
        debug!(backend = %backend.kind(), "opened {:?}", resource);
        Ok(resource)
    }

    /// Decode, then check `op` against the current pixel size.
    fn checked(&self, op: Transform) -> Result<&DecodedResource, ImageError> {
        let resource = self.decoded()?;
        let size = resource.dimensions();
        let area = match op {
            Transform::Crop(area) | Transform::CropAndResize(area, _) => area,
            Transform::Resize(_) => return Ok(resource),
        };
        if area.fits(size) {
            Ok(resource)
        } else {
            Err(ImageError::InvalidArea { area, size })
        }
    }

    fn apply(&mut self, op: Transform) -> Result<(), ImageError> {
        self.checked(op)?;
        let backend = self.backend()?;
        backend.apply(self.decoded_mut()?, op)?;
        Ok(())
    }

    fn applied(&self, op: Transform) -> Result<Core, ImageError> {
        let resource = self.checked(op)?;
        let transformed = self.backend()?.applied(resource, op)?;
        Ok(self.derive(transformed))
    }

    /// Format from the path's extension when recognized, else the image type.
    fn save(&self, path: &Path) -> Result<(), ImageError> {
        let format = match codec::format_from_path(path) {
            Some(format) => format,
            None => self.image_type()?,
        };
        self.save_as(path, format)
    }

    fn save_as(&self, path: &Path, format: ImageFormat) -> Result<(), ImageError> {
        let resource = self.decoded()?;
        self.backend()?.save(resource, path, format)?;
        info!(path = %path.display(), ?format, size = %resource.dimensions(), "saved image");
        Ok(())
    }
}

fn unresolved() -> ImageError {
    ImageError::InvalidState("image location has neither a path nor a URL".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::probe::tests::StubFetcher;
    use crate::test_helpers::{create_test_jpeg, jpeg_bytes, web_root_config};

    #[test]
    fn factory_caches_selected_backend() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let factory = ImageFactory::new(config);
        let first = factory.backend().unwrap();
        let second = factory.backend().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn debug_shows_provenance_and_decoded_state() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let factory = ImageFactory::new(config.with_backend_priority(vec![BackendKind::Lanczos]));
        let image = factory.create_immutable_from_bytes(jpeg_bytes(30, 20));
        let before = format!("{image:?}");
        assert!(before.contains("bytes"), "{before}");
        assert!(before.contains("decoded_by: None"), "{before}");

        image.decode().unwrap();
        let after = format!("{image:?}");
        assert!(after.contains("Lanczos"), "{after}");
        assert!(after.contains("width: 30"), "{after}");
    }

    #[test]
    fn empty_priority_is_configuration_error() {
        let (tmp, config) = web_root_config("https://example.com/");
        create_test_jpeg(&tmp.path().join("a.jpg"), 20, 20);
        let factory = ImageFactory::new(config.with_backend_priority(vec![]));

        let mut image = factory.create("a.jpg").unwrap();
        let err = image.resize(10, 10).unwrap_err();
        assert!(matches!(err, ImageError::Config(ConfigError::NoBackend(_))));
        assert!(!image.is_decoded());
    }

    #[test]
    fn priority_respected() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let factory = ImageFactory::new(config.with_backend_priority(vec![BackendKind::Sample]));
        assert_eq!(factory.backend().unwrap().kind(), BackendKind::Sample);
    }

    #[test]
    fn metadata_from_url_uses_fetcher_not_decoder() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let mock = Arc::new(MockBackend::with_dimensions(1, 1));
        let fetcher = Arc::new(StubFetcher::serving(jpeg_bytes(120, 80)));
        let factory = ImageFactory::new(config)
            .with_backend(mock.clone())
            .with_fetcher(fetcher.clone());

        let image = factory.create("https://cdn.other.net/a.jpg").unwrap();
        assert_eq!(image.size().unwrap(), Dimensions::new(120, 80));
        assert_eq!(image.image_type().unwrap(), ImageFormat::Jpeg);
        assert!(image.file_size().unwrap().is_some());
        assert!(mock.get_operations().is_empty());
        assert_eq!(fetcher.request_count(), 1);
    }

    #[test]
    fn remote_decode_downloads_bytes() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let body = jpeg_bytes(64, 48);
        let len = body.len() as u64;
        let fetcher = Arc::new(StubFetcher::serving(body));
        let factory = ImageFactory::new(config.with_backend_priority(vec![BackendKind::Lanczos]))
            .with_fetcher(fetcher.clone());

        let mut image = factory.create("https://cdn.other.net/a.jpg").unwrap();
        image.resize(32, 24).unwrap();
        assert_eq!(image.size().unwrap(), Dimensions::new(32, 24));
        assert_eq!(image.file_size().unwrap(), Some(len));
        assert_eq!(fetcher.requests.lock().unwrap()[0].1, None);
    }

    #[test]
    fn mock_backend_sees_single_open() {
        let (tmp, config) = web_root_config("https://example.com/");
        create_test_jpeg(&tmp.path().join("a.jpg"), 100, 100);
        let mock = Arc::new(MockBackend::with_dimensions(100, 100));
        let factory = ImageFactory::new(config).with_backend(mock.clone());

        let image = factory.create_immutable("a.jpg").unwrap();
        let a = image.crop(0, 0, 50, 50).unwrap();
        let b = image.resize(10, 10).unwrap();
        assert_eq!(a.size().unwrap(), Dimensions::new(50, 50));
        assert_eq!(b.size().unwrap(), Dimensions::new(10, 10));

        let ops = mock.get_operations();
        let opens = ops.iter().filter(|op| matches!(op, RecordedOp::Open(_))).count();
        let clones = ops.iter().filter(|op| **op == RecordedOp::Clone).count();
        assert_eq!(opens, 1);
        assert_eq!(clones, 2);
    }
}
