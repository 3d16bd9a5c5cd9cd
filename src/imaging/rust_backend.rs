//! `image`-crate backends: pixels held as a `DynamicImage`.
//!
//! Two resampling flavours share this implementation:
//!
//! | Backend | Resize | Crop |
//! |---|---|---|
//! | [`BackendKind::Lanczos`] | `resize_exact` with `Lanczos3` | `crop_imm` |
//! | [`BackendKind::Sample`] | `thumbnail_exact` (integer area sampling) | `crop_imm` |
//!
//! Lanczos gives the sharpest result; sampling is several times faster and
//! good enough for small thumbnails.

use super::backend::{
    BackendError, BackendKind, DecodedResource, ImageBackend, Pixels, SourceData, check_area,
    check_size,
};
use super::codec;
use super::params::EncodeOptions;
use crate::types::{Dimensions, ImageArea};
use image::ImageFormat;
use image::imageops::FilterType;
use std::path::Path;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resampling {
    Lanczos3,
    Sample,
}

/// Pure Rust backend over the `image` crate.
///
/// See the [module docs](self) for the operation mapping.
#[derive(Debug, Clone)]
pub struct RustBackend {
    resampling: Resampling,
    encoding: EncodeOptions,
}

impl RustBackend {
    pub fn lanczos(encoding: EncodeOptions) -> Self {
        Self {
            resampling: Resampling::Lanczos3,
            encoding,
        }
    }

    pub fn sample(encoding: EncodeOptions) -> Self {
        Self {
            resampling: Resampling::Sample,
            encoding,
        }
    }
}

impl ImageBackend for RustBackend {
    fn kind(&self) -> BackendKind {
        match self.resampling {
            Resampling::Lanczos3 => BackendKind::Lanczos,
            Resampling::Sample => BackendKind::Sample,
        }
    }

    fn open(
        &self,
        source: SourceData<'_>,
        format_hint: Option<ImageFormat>,
    ) -> Result<DecodedResource, BackendError> {
        let (img, format) = codec::decode(source, format_hint)?;
        trace!(backend = %self.kind(), ?format, "decoded {}x{}", img.width(), img.height());
        Ok(DecodedResource::new(self.kind(), format, Pixels::Dynamic(img)))
    }

    fn clone_resource(&self, resource: &DecodedResource) -> Result<DecodedResource, BackendError> {
        let img = resource.dynamic(self.kind())?.clone();
        Ok(DecodedResource::new(
            self.kind(),
            resource.format(),
            Pixels::Dynamic(img),
        ))
    }

    fn crop(&self, resource: &mut DecodedResource, area: ImageArea) -> Result<(), BackendError> {
        check_area(area, resource.dimensions())?;
        let img = resource.dynamic_mut(self.kind())?;
        *img = img.crop_imm(area.x, area.y, area.width, area.height);
        Ok(())
    }

    fn resize(&self, resource: &mut DecodedResource, size: Dimensions) -> Result<(), BackendError> {
        check_size(size)?;
        let resampling = self.resampling;
        let img = resource.dynamic_mut(self.kind())?;
        *img = match resampling {
            Resampling::Lanczos3 => img.resize_exact(size.width, size.height, FilterType::Lanczos3),
            Resampling::Sample => img.thumbnail_exact(size.width, size.height),
        };
        Ok(())
    }

    fn save(
        &self,
        resource: &DecodedResource,
        path: &Path,
        format: ImageFormat,
    ) -> Result<(), BackendError> {
        let img = resource.dynamic(self.kind())?;
        codec::encode(img, path, format, &self.encoding)
    }
}
