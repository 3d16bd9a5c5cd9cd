//! Scaled thumbnail sets.
//!
//! A request names a base box (say 200×150), a [`ResizePolicy`] and a list of
//! scales (say `[1, 2]` for regular and high-density screens). Each scale
//! multiplies the box; scales whose box would not be strictly smaller than
//! the original are skipped, since upscaling a thumbnail is pointless.
//!
//! ```text
//! 1600×1200 original, base 200×150, scales [1, 10, 2]
//!   1  → 200×150   kept
//!   10 → 2000×1500 skipped (not smaller)
//!   2  → 400×300   kept
//! ```
//!
//! Planning ([`plan_thumbnails`]) is pure arithmetic; [`ThumbnailsMaker`]
//! decodes the original once and cuts the planned thumbnails in parallel
//! with rayon, each worker on its own clone of the pixels.

pub mod strategy;

pub use strategy::{Area, Fit, ResizePolicy, ResizeStrategy, StrategyError, Stretch};

use crate::config::{ConfigError, ThumbnailSettings};
use crate::entity::{ImageError, ImageFactory, ImageInfo, ImmutableImage};
use crate::imaging::codec;
use crate::types::{Dimensions, ImageArea, ImageSize};
use image::ImageFormat;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A thumbnail scale factor. Totally ordered so it can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
pub struct Scale(pub f64);

impl PartialEq for Scale {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scale {}

impl PartialOrd for Scale {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scale {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// One thumbnail worth producing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedThumbnail {
    pub scale: Scale,
    pub requested: ImageSize,
    pub area: ImageArea,
    pub size: Dimensions,
}

/// Work out which thumbnails to make, without touching pixels.
///
/// Non-positive and non-finite scales are ignored; repeated scales count once.
/// A scale whose box or target rounds a side down to zero pixels is skipped.
pub fn plan_thumbnails(
    strategy: &dyn ResizeStrategy,
    original: Dimensions,
    base: ImageSize,
    scales: &[f64],
) -> Result<Vec<PlannedThumbnail>, StrategyError> {
    if base.is_empty() {
        return Err(StrategyError::AmbiguousDimension(base));
    }
    let mut plan: Vec<PlannedThumbnail> = Vec::new();
    for &factor in scales {
        let scale = Scale(factor);
        if !(factor.is_finite() && factor > 0.0) || plan.iter().any(|p| p.scale == scale) {
            continue;
        }
        let requested = base.scale(factor);
        if requested.is_degenerate() {
            debug!(%scale, %requested, "skipping thumbnail scale with a zero-pixel side");
            continue;
        }
        if !requested.less_than(original) {
            debug!(%scale, %requested, %original, "skipping thumbnail scale that would not shrink");
            continue;
        }
        let size = strategy.target_size(original, requested)?;
        if size.width == 0 || size.height == 0 {
            debug!(%scale, %size, "skipping thumbnail scale with a zero-pixel target");
            continue;
        }
        plan.push(PlannedThumbnail {
            scale,
            requested,
            area: strategy.original_area(original, requested),
            size,
        });
    }
    Ok(plan)
}

/// A produced thumbnail and where it was written.
#[derive(Debug)]
pub struct Thumbnail {
    pub image: ImmutableImage,
    pub path: PathBuf,
    pub size: Dimensions,
}

/// Produces thumbnail sets under one resize strategy.
pub struct ThumbnailsMaker<S = ResizePolicy> {
    strategy: S,
}

impl<S: ResizeStrategy> ThumbnailsMaker<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// Cut and save one thumbnail per usable scale into `output_dir`.
    pub fn create_thumbnails(
        &self,
        image: &ImmutableImage,
        base: ImageSize,
        output_dir: &Path,
        scales: &[f64],
    ) -> Result<BTreeMap<Scale, Thumbnail>, ThumbnailError> {
        let original = image.size()?;
        let plan = plan_thumbnails(&self.strategy, original, base, scales)?;
        if plan.is_empty() {
            return Ok(BTreeMap::new());
        }

        image.decode()?;
        std::fs::create_dir_all(output_dir)?;
        let OutputName { stem, ext, format } = output_naming(image)?;

        let made = plan
            .par_iter()
            .map(|planned| -> Result<(Scale, Thumbnail), ThumbnailError> {
                let size = planned.size;
                let path = output_dir.join(format!("{stem}-{}x{}.{ext}", size.width, size.height));
                let thumbnail = image.crop_and_resize_area(planned.area, size)?;
                thumbnail.save_as(&path, format)?;
                Ok((
                    planned.scale,
                    Thumbnail {
                        image: thumbnail,
                        path,
                        size,
                    },
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = made.len(), dir = %output_dir.display(), "created thumbnails");
        Ok(made.into_iter().collect())
    }
}

struct OutputName {
    stem: String,
    ext: String,
    format: ImageFormat,
}

/// How thumbnails of `image` are named and encoded.
///
/// The source's own extension is kept (`photo.JPEG` → `photo-WxH.JPEG`) when
/// it names the format being written. Images built from bytes are named
/// `image`; formats without an encoder fall back to PNG.
fn output_naming(image: &ImmutableImage) -> Result<OutputName, ImageError> {
    let name = image.location().and_then(|l| l.file_name());
    let name = name.as_deref().map(Path::new);
    let stem = name
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    let format = Some(image.image_type()?)
        .filter(|f| codec::is_writable(*f))
        .unwrap_or(ImageFormat::Png);
    let ext = name
        .and_then(Path::extension)
        .map(|e| e.to_string_lossy().into_owned())
        .filter(|e| ImageFormat::from_extension(e) == Some(format))
        .unwrap_or_else(|| codec::extension_for(format).to_string());
    Ok(OutputName { stem, ext, format })
}

// =============================================================================
// Factory integration
// =============================================================================

/// Everything needed to make a thumbnail set.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRequest {
    pub size: ImageSize,
    pub policy: ResizePolicy,
    pub scales: Vec<f64>,
    pub output_dir: PathBuf,
}

impl ThumbnailRequest {
    pub fn from_settings(settings: &ThumbnailSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            size: settings.size()?,
            policy: settings.policy,
            scales: settings.scales.clone(),
            output_dir: PathBuf::from(&settings.output_dir),
        })
    }
}

/// An original image together with its thumbnails, keyed by scale.
#[derive(Debug)]
pub struct ImageWithThumbnails {
    pub image: ImmutableImage,
    pub thumbnails: BTreeMap<Scale, Thumbnail>,
}

impl ImageFactory {
    /// Load `src` and make its thumbnail set in one go.
    pub fn create_with_thumbnails(
        &self,
        src: &str,
        request: &ThumbnailRequest,
    ) -> Result<ImageWithThumbnails, ThumbnailError> {
        let image = self.create_immutable(src)?;
        with_thumbnails(image, request)
    }

    pub fn create_with_thumbnails_from_bytes(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        request: &ThumbnailRequest,
    ) -> Result<ImageWithThumbnails, ThumbnailError> {
        with_thumbnails(self.create_immutable_from_bytes(bytes), request)
    }
}

fn with_thumbnails(
    image: ImmutableImage,
    request: &ThumbnailRequest,
) -> Result<ImageWithThumbnails, ThumbnailError> {
    let thumbnails = ThumbnailsMaker::new(request.policy).create_thumbnails(
        &image,
        request.size,
        &request.output_dir,
        &request.scales,
    )?;
    Ok(ImageWithThumbnails { image, thumbnails })
}
