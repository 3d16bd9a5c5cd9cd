use super::{Core, ImageError, ImageInfo, ImmutableImage};
use crate::imaging::Transform;
use crate::location::FileLocation;
use crate::types::{Dimensions, ImageArea};
use image::ImageFormat;
use std::path::Path;

/// Image whose transforms replace its own pixels.
///
/// ```no_run
/// # use image_thumbs::{config::Configuration, entity::{ImageFactory, ImageInfo}};
/// # let factory = ImageFactory::new(Configuration::new("https://example.com/", "/var/www").unwrap());
/// let mut image = factory.create("images/photo.jpg")?;
/// image.crop(0, 0, 800, 600)?.resize(400, 300)?;
/// assert_eq!(image.width()?, 400);
/// image.save(Path::new("out/photo-small.jpg"))?;
/// # use std::path::Path;
/// # Ok::<(), image_thumbs::entity::ImageError>(())
/// ```
#[derive(Debug)]
pub struct Image {
    core: Core,
}

impl Image {
    pub(crate) fn from_core(core: Core) -> Self {
        Self { core }
    }

    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<&mut Self, ImageError> {
        self.core
            .apply(Transform::Crop(ImageArea::new(x, y, width, height)))?;
        Ok(self)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<&mut Self, ImageError> {
        self.core
            .apply(Transform::Resize(Dimensions::new(width, height)))?;
        Ok(self)
    }

    pub fn crop_and_resize(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        to_width: u32,
        to_height: u32,
    ) -> Result<&mut Self, ImageError> {
        self.core.apply(Transform::CropAndResize(
            ImageArea::new(x, y, width, height),
            Dimensions::new(to_width, to_height),
        ))?;
        Ok(self)
    }

    pub fn save(&self, path: &Path) -> Result<(), ImageError> {
        self.core.save(path)
    }

    pub fn save_as(&self, path: &Path, format: ImageFormat) -> Result<(), ImageError> {
        self.core.save_as(path, format)
    }

    /// Whether pixels have been decoded yet.
    pub fn is_decoded(&self) -> bool {
        self.core.is_decoded()
    }

    pub fn into_immutable(self) -> ImmutableImage {
        ImmutableImage::from_core(self.core)
    }
}

impl ImageInfo for Image {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ImageFactory;
    use crate::imaging::BackendKind;
    use crate::test_helpers::{create_test_jpeg, jpeg_bytes, web_root_config};

    fn factory(config: crate::config::Configuration) -> ImageFactory {
        ImageFactory::new(config.with_backend_priority(vec![BackendKind::Lanczos]))
    }

    #[test]
    fn metadata_does_not_decode() {
        let (tmp, config) = web_root_config("https://example.com/");
        let file = tmp.path().join("photo.jpg");
        create_test_jpeg(&file, 640, 480);

        let image = factory(config).create(file.to_str().unwrap()).unwrap();
        assert_eq!(image.width().unwrap(), 640);
        assert_eq!(image.height().unwrap(), 480);
        assert_eq!(image.image_type().unwrap(), ImageFormat::Jpeg);
        assert_eq!(
            image.file_size().unwrap(),
            Some(std::fs::metadata(&file).unwrap().len())
        );
        assert!(!image.is_decoded());
    }

    #[test]
    fn resize_changes_width() {
        let (tmp, config) = web_root_config("https://example.com/");
        let file = tmp.path().join("photo.jpg");
        create_test_jpeg(&file, 640, 480);

        let mut image = factory(config).create(file.to_str().unwrap()).unwrap();
        assert_eq!(image.width().unwrap(), 640);
        image.resize(320, 240).unwrap();
        assert_eq!(image.width().unwrap(), 320);
        assert!(image.is_decoded());
    }

    #[test]
    fn chained_transforms() {
        let (tmp, config) = web_root_config("https://example.com/");
        let file = tmp.path().join("photo.jpg");
        create_test_jpeg(&file, 1200, 1200);

        let mut image = factory(config).create(file.to_str().unwrap()).unwrap();
        image
            .crop(25, 40, 400, 500)
            .unwrap()
            .crop_and_resize(0, 0, 200, 200, 50, 50)
            .unwrap();
        assert_eq!(image.size().unwrap(), Dimensions::new(50, 50));
    }

    #[test]
    fn crop_outside_is_invalid_area() {
        let (tmp, config) = web_root_config("https://example.com/");
        let file = tmp.path().join("photo.jpg");
        create_test_jpeg(&file, 100, 100);

        let mut image = factory(config).create(file.to_str().unwrap()).unwrap();
        let err = image.crop(50, 50, 60, 10).unwrap_err();
        assert!(matches!(err, ImageError::InvalidArea { .. }));
        assert_eq!(image.size().unwrap(), Dimensions::new(100, 100));
    }

    #[test]
    fn bytes_image_has_no_location_or_file_size() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let image = factory(config).create_from_bytes(jpeg_bytes(30, 20));
        assert!(image.location().is_none());
        assert_eq!(image.file_size().unwrap(), None);
        assert_eq!(image.size().unwrap(), Dimensions::new(30, 20));
    }

    #[test]
    fn save_uses_extension_then_image_type() {
        let (tmp, config) = web_root_config("https://example.com/");
        let image = factory(config).create_from_bytes(jpeg_bytes(30, 20));

        let png = tmp.path().join("out/a.png");
        image.save(&png).unwrap();
        assert_eq!(
            image::ImageReader::open(&png).unwrap().with_guessed_format().unwrap().format(),
            Some(ImageFormat::Png)
        );

        let bare = tmp.path().join("out/no-extension");
        image.save(&bare).unwrap();
        assert_eq!(
            image::ImageReader::open(&bare).unwrap().with_guessed_format().unwrap().format(),
            Some(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn into_immutable_keeps_pixels() {
        let (_tmp, config) = web_root_config("https://example.com/");
        let mut image = factory(config).create_from_bytes(jpeg_bytes(30, 20));
        image.resize(15, 10).unwrap();
        let frozen = image.into_immutable();
        assert_eq!(frozen.size().unwrap(), Dimensions::new(15, 10));
    }
}
