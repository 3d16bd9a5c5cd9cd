//! SIMD backend over `fast_image_resize`.
//!
//! Pixels live in a native 8-bit buffer (`L`, `LA`, `RGB` or `RGBA`) and are
//! rewritten in place. Crop and resize run as one convolution pass: the crop
//! box is handed to the resizer so the intermediate image is never built.
//!
//! Decoded images with more than 8 bits per channel are reduced to 8 bits
//! when the buffer is built.

use super::backend::{
    BackendError, BackendKind, DecodedResource, ImageBackend, Pixels, SourceData, check_area,
    check_size,
};
use super::codec;
use super::params::EncodeOptions;
use crate::types::{Dimensions, ImageArea};
use fast_image_resize as fir;
use fir::images::Image;
use fir::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{ColorType, DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::fmt;
use std::path::Path;
use tracing::trace;

/// Native pixel buffer owned by a fast-resize resource.
pub(crate) struct PixelBuffer {
    image: Image<'static>,
}

impl PixelBuffer {
    fn from_raw(width: u32, height: u32, bytes: Vec<u8>, pixel_type: PixelType) -> Result<Self, BackendError> {
        let image = Image::from_vec_u8(width, height, bytes, pixel_type)
            .map_err(|e| BackendError::UnsupportedOperation(format!("pixel buffer: {e}")))?;
        Ok(Self { image })
    }

    fn from_dynamic(img: DynamicImage) -> Result<Self, BackendError> {
        let (width, height) = (img.width(), img.height());
        let (bytes, pixel_type) = match img.color() {
            ColorType::L8 => (img.into_luma8().into_raw(), PixelType::U8),
            ColorType::La8 => (img.into_luma_alpha8().into_raw(), PixelType::U8x2),
            ColorType::Rgb8 => (img.into_rgb8().into_raw(), PixelType::U8x3),
            c if c.has_alpha() => (img.into_rgba8().into_raw(), PixelType::U8x4),
            _ => (img.into_rgb8().into_raw(), PixelType::U8x3),
        };
        Self::from_raw(width, height, bytes, pixel_type)
    }

    fn to_dynamic(&self) -> Result<DynamicImage, BackendError> {
        let (w, h) = (self.image.width(), self.image.height());
        let bytes = self.image.buffer().to_vec();
        let img = match self.image.pixel_type() {
            PixelType::U8 => GrayImage::from_raw(w, h, bytes).map(DynamicImage::ImageLuma8),
            PixelType::U8x2 => GrayAlphaImage::from_raw(w, h, bytes).map(DynamicImage::ImageLumaA8),
            PixelType::U8x3 => RgbImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
            PixelType::U8x4 => RgbaImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
            other => {
                return Err(BackendError::UnsupportedOperation(format!(
                    "pixel type {other:?}"
                )));
            }
        };
        img.ok_or_else(|| BackendError::UnsupportedOperation("pixel buffer size mismatch".into()))
    }

    pub(crate) fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    fn try_clone(&self) -> Result<Self, BackendError> {
        Self::from_raw(
            self.image.width(),
            self.image.height(),
            self.image.buffer().to_vec(),
            self.image.pixel_type(),
        )
    }

    /// Copy the rows of `area` into a new buffer.
    fn cropped(&self, area: ImageArea) -> Result<Self, BackendError> {
        let bpp = self.image.pixel_type().size();
        let stride = self.image.width() as usize * bpp;
        let row_len = area.width as usize * bpp;
        let src = self.image.buffer();

        let mut out = Vec::with_capacity(row_len * area.height as usize);
        for row in area.y..area.y + area.height {
            let start = row as usize * stride + area.x as usize * bpp;
            out.extend_from_slice(&src[start..start + row_len]);
        }
        Self::from_raw(area.width, area.height, out, self.image.pixel_type())
    }

    /// Lanczos3 convolution of `area` into a new buffer of `size`.
    fn resampled(&self, area: ImageArea, size: Dimensions) -> Result<Self, BackendError> {
        let mut dst = Image::new(size.width, size.height, self.image.pixel_type());
        let options = ResizeOptions::new()
            .resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
            .crop(
                area.x as f64,
                area.y as f64,
                area.width as f64,
                area.height as f64,
            );
        Resizer::new()
            .resize(&self.image, &mut dst, &options)
            .map_err(|e| BackendError::UnsupportedOperation(format!("resize failed: {e}")))?;
        Ok(Self { image: dst })
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("dimensions", &self.dimensions())
            .field("pixel_type", &self.image.pixel_type())
            .finish()
    }
}

/// See the [module docs](self).
#[derive(Debug, Clone)]
pub struct FastResizeBackend {
    encoding: EncodeOptions,
}

impl FastResizeBackend {
    pub fn new(encoding: EncodeOptions) -> Self {
        Self { encoding }
    }

    fn buffer<'a>(&self, resource: &'a DecodedResource) -> Result<&'a PixelBuffer, BackendError> {
        match resource.pixels() {
            Pixels::Buffer(buf) if resource.owner() == self.kind() => Ok(buf),
            _ => Err(BackendError::ForeignResource(resource.owner())),
        }
    }

    fn buffer_mut<'a>(
        &self,
        resource: &'a mut DecodedResource,
    ) -> Result<&'a mut PixelBuffer, BackendError> {
        let owner = resource.owner();
        match resource.pixels_mut() {
            Pixels::Buffer(buf) if owner == BackendKind::FastResize => Ok(buf),
            _ => Err(BackendError::ForeignResource(owner)),
        }
    }
}

impl ImageBackend for FastResizeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FastResize
    }

    fn open(
        &self,
        source: SourceData<'_>,
        format_hint: Option<ImageFormat>,
    ) -> Result<DecodedResource, BackendError> {
        let (img, format) = codec::decode(source, format_hint)?;
        let buffer = PixelBuffer::from_dynamic(img)?;
        trace!(backend = %self.kind(), ?format, "decoded {:?}", buffer);
        Ok(DecodedResource::new(self.kind(), format, Pixels::Buffer(buffer)))
    }

    fn clone_resource(&self, resource: &DecodedResource) -> Result<DecodedResource, BackendError> {
        let copy = self.buffer(resource)?.try_clone()?;
        Ok(DecodedResource::new(
            self.kind(),
            resource.format(),
            Pixels::Buffer(copy),
        ))
    }

    fn crop(&self, resource: &mut DecodedResource, area: ImageArea) -> Result<(), BackendError> {
        check_area(area, resource.dimensions())?;
        let buf = self.buffer_mut(resource)?;
        *buf = buf.cropped(area)?;
        Ok(())
    }

    fn resize(&self, resource: &mut DecodedResource, size: Dimensions) -> Result<(), BackendError> {
        check_size(size)?;
        let whole = ImageArea::whole(resource.dimensions());
        let buf = self.buffer_mut(resource)?;
        *buf = buf.resampled(whole, size)?;
        Ok(())
    }

    fn crop_and_resize(
        &self,
        resource: &mut DecodedResource,
        area: ImageArea,
        size: Dimensions,
    ) -> Result<(), BackendError> {
        check_area(area, resource.dimensions())?;
        check_size(size)?;
        let buf = self.buffer_mut(resource)?;
        *buf = buf.resampled(area, size)?;
        Ok(())
    }

    fn save(
        &self,
        resource: &DecodedResource,
        path: &Path,
        format: ImageFormat,
    ) -> Result<(), BackendError> {
        let img = self.buffer(resource)?.to_dynamic()?;
        codec::encode(&img, path, format, &self.encoding)
    }
}
