use super::{Core, Image, ImageError, ImageInfo};
use crate::imaging::Transform;
use crate::location::FileLocation;
use crate::types::{Dimensions, ImageArea};
use image::ImageFormat;
use std::path::Path;

/// Image whose transforms return a new image and leave the receiver as is.
///
/// The new image keeps the receiver's provenance (location or bytes, format,
/// file size) and owns a deep copy of the pixels. Safe to share across
/// threads; thumbnails are cut from one `ImmutableImage` in parallel.
#[derive(Debug)]
pub struct ImmutableImage {
    core: Core,
}

impl ImmutableImage {
    pub(crate) fn from_core(core: Core) -> Self {
        Self { core }
    }

    fn transformed(&self, op: Transform) -> Result<Self, ImageError> {
        Ok(Self::from_core(self.core.applied(op)?))
    }

    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self, ImageError> {
        self.transformed(Transform::Crop(ImageArea::new(x, y, width, height)))
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<Self, ImageError> {
        self.transformed(Transform::Resize(Dimensions::new(width, height)))
    }

    pub fn crop_and_resize(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        to_width: u32,
        to_height: u32,
    ) -> Result<Self, ImageError> {
        self.transformed(Transform::CropAndResize(
            ImageArea::new(x, y, width, height),
            Dimensions::new(to_width, to_height),
        ))
    }

    /// Typed form of [`crop_and_resize`](Self::crop_and_resize).
    pub fn crop_and_resize_area(&self, area: ImageArea, size: Dimensions) -> Result<Self, ImageError> {
        self.transformed(Transform::CropAndResize(area, size))
    }

    pub fn save(&self, path: &Path) -> Result<(), ImageError> {
        self.core.save(path)
    }

    pub fn save_as(&self, path: &Path, format: ImageFormat) -> Result<(), ImageError> {
        self.core.save_as(path, format)
    }

    pub fn is_decoded(&self) -> bool {
        self.core.is_decoded()
    }

    /// Force the decode now, so later transforms only clone.
    pub fn decode(&self) -> Result<(), ImageError> {
        self.core.decoded().map(|_| ())
    }

    pub fn into_mutable(self) -> Image {
        Image::from_core(self.core)
    }
}

impl ImageInfo for ImmutableImage {
    fn location(&self) -> Option<&FileLocation> {
        self.core.location()
    }

    fn image_type(&self) -> Result<ImageFormat, ImageError> {
        self.core.image_type()
    }

    fn size(&self) -> Result<Dimensions, ImageError> {
        self.core.size()
    }

    fn file_size(&self) -> Result<Option<u64>, ImageError> {
        self.core.file_size()
    }
}
