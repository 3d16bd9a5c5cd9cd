//! Every compiled-in backend runs the same crop and resize pipeline, and the
//! outputs must agree on geometry and stay visually close to each other.
//!
//! Run with: cargo test --test backends

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_thumbs::imaging::{
    BackendError, BackendKind, EncodeOptions, ImageBackend, SourceData, Transform,
    create_backend,
};
use image_thumbs::types::{Dimensions, ImageArea};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const CROP: ImageArea = ImageArea {
    x: 25,
    y: 40,
    width: 400,
    height: 500,
};
const TARGET: Dimensions = Dimensions {
    width: 400,
    height: 500,
};

fn available_backends() -> Vec<Arc<dyn ImageBackend>> {
    BackendKind::DEFAULT_PRIORITY
        .into_iter()
        .filter(|k| k.is_available())
        .map(|k| create_backend(k, EncodeOptions::default()).unwrap())
        .collect()
}

fn write_source(dir: &Path) -> std::path::PathBuf {
    let img = RgbImage::from_fn(1200, 1200, |x, y| {
        Rgb([(x / 5 % 256) as u8, (y / 5 % 256) as u8, 96])
    });
    let path = dir.join("source.jpg");
    DynamicImage::ImageRgb8(img)
        .save_with_format(&path, ImageFormat::Jpeg)
        .unwrap();
    path
}

/// Open `path` on `backend`, resize to `target` and read back the PNG it writes.
fn resize_to_png(
    backend: &dyn ImageBackend,
    path: &Path,
    target: Dimensions,
    out: &Path,
) -> DynamicImage {
    let mut resource = backend.open(SourceData::Path(path), None).unwrap();
    backend.resize(&mut resource, target).unwrap();
    backend.save(&resource, out, ImageFormat::Png).unwrap();
    backend.close(resource);
    image::open(out).unwrap()
}

fn mean_abs_diff(a: &DynamicImage, b: &DynamicImage) -> f64 {
    let (a, b) = (a.to_rgb8(), b.to_rgb8());
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .flat_map(|(p, q)| p.0.into_iter().zip(q.0).map(|(x, y)| x.abs_diff(y) as u64))
        .sum();
    total as f64 / (a.len() as f64)
}

#[test]
fn crop_then_resize_on_every_backend() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path());

    let mut outputs = Vec::new();
    for backend in available_backends() {
        let mut resource = backend.open(SourceData::Path(&source), None).unwrap();
        assert_eq!(resource.format(), ImageFormat::Jpeg);
        assert_eq!(backend.size(&resource), Dimensions::new(1200, 1200));

        backend.crop(&mut resource, CROP).unwrap();
        assert_eq!(backend.size(&resource), Dimensions::new(400, 500));
        backend.resize(&mut resource, TARGET).unwrap();
        assert_eq!(backend.size(&resource), TARGET);

        let out = tmp.path().join(format!("{}.jpg", backend.kind()));
        backend.save(&resource, &out, ImageFormat::Jpeg).unwrap();
        backend.close(resource);

        let written = image::ImageReader::open(&out)
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(written.format(), Some(ImageFormat::Jpeg));
        let written = written.decode().unwrap();
        assert_eq!(written.dimensions(), (400, 500));
        outputs.push((backend.kind(), written));
    }

    assert!(outputs.len() >= 2, "image crate backends are always built");
    let (reference_kind, reference) = &outputs[0];
    for (kind, img) in &outputs[1..] {
        let diff = mean_abs_diff(reference, img);
        assert!(
            diff < 12.0,
            "{kind} differs from {reference_kind} by {diff:.2} per channel"
        );
    }
}

#[test]
fn combined_transform_matches_two_steps() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path());

    for backend in available_backends() {
        let opened = backend.open(SourceData::Path(&source), None).unwrap();
        let combined = backend
            .applied(&opened, Transform::CropAndResize(CROP, TARGET))
            .unwrap();
        assert_eq!(backend.size(&combined), TARGET);
        assert_eq!(
            backend.size(&opened),
            Dimensions::new(1200, 1200),
            "{} mutated the input of applied()",
            backend.kind()
        );
    }
}

#[test]
fn bytes_and_path_decode_alike() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path());
    let bytes = std::fs::read(&source).unwrap();

    for backend in available_backends() {
        let from_bytes = backend
            .open(SourceData::Bytes(&bytes), Some(ImageFormat::Jpeg))
            .unwrap();
        assert_eq!(backend.size(&from_bytes), Dimensions::new(1200, 1200));
    }
}

#[test]
fn out_of_bounds_crop_fails_everywhere() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path());

    for backend in available_backends() {
        let mut resource = backend.open(SourceData::Path(&source), None).unwrap();
        let err = backend
            .crop(&mut resource, ImageArea::new(1000, 0, 400, 10))
            .unwrap_err();
        assert!(
            matches!(err, BackendError::UnsupportedOperation(_)),
            "{}: {err}",
            backend.kind()
        );
    }
}

#[test]
fn resources_do_not_cross_backends() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path());
    let backends = available_backends();

    let resource = backends[0].open(SourceData::Path(&source), None).unwrap();
    for other in &backends[1..] {
        let out = tmp.path().join("cross.png");
        let err = other.save(&resource, &out, ImageFormat::Png).unwrap_err();
        assert!(matches!(err, BackendError::ForeignResource(_)), "{err}");
    }
}

#[test]
fn resize_keeps_translucent_alpha() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("translucent.png");
    RgbaImage::from_fn(200, 160, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 64, 200]))
        .save_with_format(&source, ImageFormat::Png)
        .unwrap();

    for backend in available_backends() {
        let out = tmp.path().join(format!("translucent-{}.png", backend.kind()));
        let resized = resize_to_png(backend.as_ref(), &source, Dimensions::new(100, 80), &out);
        assert!(resized.color().has_alpha(), "{} dropped alpha", backend.kind());
        assert_eq!(resized.dimensions(), (100, 80));
        for pixel in resized.to_rgba8().pixels() {
            assert!(
                pixel[3].abs_diff(200) <= 2,
                "{}: alpha {} drifted from 200",
                backend.kind(),
                pixel[3]
            );
        }
    }
}

#[test]
fn palette_transparency_survives_resize() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("indexed.gif");
    // Left half is the palette's transparent index, right half opaque red.
    RgbaImage::from_fn(200, 100, |x, _| {
        if x < 100 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([220, 30, 30, 255])
        }
    })
    .save_with_format(&source, ImageFormat::Gif)
    .unwrap();

    for backend in available_backends() {
        let out = tmp.path().join(format!("indexed-{}.png", backend.kind()));
        let resized = resize_to_png(backend.as_ref(), &source, Dimensions::new(100, 50), &out);
        let rgba = resized.to_rgba8();
        let clear = rgba.get_pixel(10, 25);
        let solid = rgba.get_pixel(90, 25);
        assert!(clear[3] <= 5, "{}: transparent area became {clear:?}", backend.kind());
        assert!(solid[3] >= 250, "{}: opaque area became {solid:?}", backend.kind());
        assert!(solid[0] > 200 && solid[1] < 60, "{}: {solid:?}", backend.kind());
    }
}
