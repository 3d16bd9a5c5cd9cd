//! How a requested thumbnail box maps onto the original image.
//!
//! A strategy answers two questions: which region of the original to sample,
//! and what size the thumbnail actually gets. Every strategy here samples the
//! whole original; they differ only in the output size.
//!
//! | Policy | Output size for 1600×1200 into 400×100 |
//! |---|---|
//! | [`Stretch`] | 400×100 (aspect ignored) |
//! | [`Fit`] | 133×100 (height needs the larger shrink) |
//! | [`Area`] | 231×173 (same pixel count as 400×100) |

use crate::types::{Dimensions, ImageArea, ImageSize};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("cannot pick a thumbnail dimension from {0}")]
    AmbiguousDimension(ImageSize),
}

pub trait ResizeStrategy: Send + Sync {
    /// Region of the original to sample.
    fn original_area(&self, original: Dimensions, requested: ImageSize) -> ImageArea;

    /// Final thumbnail size.
    fn target_size(
        &self,
        original: Dimensions,
        requested: ImageSize,
    ) -> Result<Dimensions, StrategyError>;
}

fn round(v: f64) -> u32 {
    v.round().max(1.0) as u32
}

/// Exactly the requested box; a missing side keeps the original aspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stretch;

impl ResizeStrategy for Stretch {
    fn original_area(&self, original: Dimensions, _requested: ImageSize) -> ImageArea {
        ImageArea::whole(original)
    }

    fn target_size(
        &self,
        original: Dimensions,
        requested: ImageSize,
    ) -> Result<Dimensions, StrategyError> {
        let (ow, oh) = (original.width as f64, original.height as f64);
        match (requested.width, requested.height) {
            (Some(w), Some(h)) => Ok(Dimensions::new(w, h)),
            (Some(w), None) => Ok(Dimensions::new(w, round(oh * w as f64 / ow))),
            (None, Some(h)) => Ok(Dimensions::new(round(ow * h as f64 / oh), h)),
            (None, None) => Err(StrategyError::AmbiguousDimension(requested)),
        }
    }
}

/// Largest size that fits inside the box with the original aspect.
///
/// The side needing the larger shrink (`original / requested`) is kept exact
/// and the other derived. Ties go to width.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fit;

impl ResizeStrategy for Fit {
    fn original_area(&self, original: Dimensions, _requested: ImageSize) -> ImageArea {
        ImageArea::whole(original)
    }

    fn target_size(
        &self,
        original: Dimensions,
        requested: ImageSize,
    ) -> Result<Dimensions, StrategyError> {
        let (ow, oh) = (original.width as f64, original.height as f64);
        let use_width = match (requested.width, requested.height) {
            (Some(w), Some(h)) => ow / w as f64 >= oh / h as f64,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return Err(StrategyError::AmbiguousDimension(requested)),
        };
        Ok(match (use_width, requested.width, requested.height) {
            (true, Some(w), _) => Dimensions::new(w, round(oh * w as f64 / ow)),
            (false, _, Some(h)) => Dimensions::new(round(ow * h as f64 / oh), h),
            _ => return Err(StrategyError::AmbiguousDimension(requested)),
        })
    }
}

/// Same pixel count as the box, original aspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Area;

impl ResizeStrategy for Area {
    fn original_area(&self, original: Dimensions, _requested: ImageSize) -> ImageArea {
        ImageArea::whole(original)
    }

    fn target_size(
        &self,
        original: Dimensions,
        requested: ImageSize,
    ) -> Result<Dimensions, StrategyError> {
        let (ow, oh) = (original.width as f64, original.height as f64);
        let ratio = match (requested.width, requested.height) {
            (Some(w), Some(h)) => (original.area() as f64 / (w as f64 * h as f64)).sqrt(),
            (Some(w), None) => ow / w as f64,
            (None, Some(h)) => oh / h as f64,
            (None, None) => return Err(StrategyError::AmbiguousDimension(requested)),
        };
        Ok(Dimensions::new(round(ow / ratio), round(oh / ratio)))
    }
}

/// Named strategy, as written in configuration and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizePolicy {
    Stretch,
    #[default]
    Fit,
    Area,
}

impl ResizePolicy {
    pub fn strategy(self) -> &'static dyn ResizeStrategy {
        match self {
            ResizePolicy::Stretch => &Stretch,
            ResizePolicy::Fit => &Fit,
            ResizePolicy::Area => &Area,
        }
    }
}

impl ResizeStrategy for ResizePolicy {
    fn original_area(&self, original: Dimensions, requested: ImageSize) -> ImageArea {
        self.strategy().original_area(original, requested)
    }

    fn target_size(
        &self,
        original: Dimensions,
        requested: ImageSize,
    ) -> Result<Dimensions, StrategyError> {
        self.strategy().target_size(original, requested)
    }
}

impl fmt::Display for ResizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizePolicy::Stretch => "stretch",
            ResizePolicy::Fit => "fit",
            ResizePolicy::Area => "area",
        })
    }
}

impl FromStr for ResizePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stretch" => Ok(ResizePolicy::Stretch),
            "fit" => Ok(ResizePolicy::Fit),
            "area" => Ok(ResizePolicy::Area),
            other => Err(format!(
                "unknown resize policy \"{other}\" (expected stretch, fit or area)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: Dimensions = Dimensions {
        width: 1600,
        height: 1200,
    };

    fn size(w: Option<u32>, h: Option<u32>) -> ImageSize {
        ImageSize::new(w, h).unwrap()
    }

    #[test]
    fn every_strategy_samples_whole_original() {
        let requested = ImageSize::exact(400, 100);
        for policy in [ResizePolicy::Stretch, ResizePolicy::Fit, ResizePolicy::Area] {
            assert_eq!(
                policy.original_area(ORIGINAL, requested),
                ImageArea::new(0, 0, 1600, 1200)
            );
        }
    }

    #[test]
    fn stretch_is_verbatim() {
        let out = Stretch.target_size(ORIGINAL, ImageSize::exact(400, 100)).unwrap();
        assert_eq!(out, Dimensions::new(400, 100));
    }

    #[test]
    fn stretch_fills_missing_side() {
        let out = Stretch.target_size(ORIGINAL, size(None, Some(300))).unwrap();
        assert_eq!(out, Dimensions::new(400, 300));
    }

    #[test]
    fn fit_width_only() {
        let out = Fit.target_size(ORIGINAL, size(Some(400), None)).unwrap();
        assert_eq!(out, Dimensions::new(400, 300));
    }

    #[test]
    fn fit_height_only() {
        let out = Fit.target_size(ORIGINAL, size(None, Some(600))).unwrap();
        assert_eq!(out, Dimensions::new(800, 600));
    }

    #[test]
    fn fit_picks_larger_shrink() {
        // 1600/400 = 4 < 1200/100 = 12 → height controls
        let out = Fit.target_size(ORIGINAL, ImageSize::exact(400, 100)).unwrap();
        assert_eq!(out, Dimensions::new(133, 100));
        // 1600/100 = 16 > 1200/400 = 3 → width controls
        let out = Fit.target_size(ORIGINAL, ImageSize::exact(100, 400)).unwrap();
        assert_eq!(out, Dimensions::new(100, 75));
    }

    #[test]
    fn fit_same_aspect_is_exact() {
        let out = Fit.target_size(ORIGINAL, ImageSize::exact(200, 150)).unwrap();
        assert_eq!(out, Dimensions::new(200, 150));
    }

    #[test]
    fn area_keeps_pixel_count() {
        let out = Area.target_size(ORIGINAL, ImageSize::exact(400, 100)).unwrap();
        assert_eq!(out, Dimensions::new(231, 173));
    }

    #[test]
    fn area_single_side_is_direct_ratio() {
        let out = Area.target_size(ORIGINAL, size(Some(800), None)).unwrap();
        assert_eq!(out, Dimensions::new(800, 600));
        let out = Area.target_size(ORIGINAL, size(None, Some(300))).unwrap();
        assert_eq!(out, Dimensions::new(400, 300));
    }

    #[test]
    fn empty_request_is_ambiguous() {
        let empty = ImageSize {
            width: None,
            height: None,
        };
        for policy in [ResizePolicy::Stretch, ResizePolicy::Fit, ResizePolicy::Area] {
            assert!(matches!(
                policy.target_size(ORIGINAL, empty),
                Err(StrategyError::AmbiguousDimension(_))
            ));
        }
    }

    #[test]
    fn policy_parses_and_displays() {
        for policy in [ResizePolicy::Stretch, ResizePolicy::Fit, ResizePolicy::Area] {
            assert_eq!(policy.to_string().parse::<ResizePolicy>().unwrap(), policy);
        }
        assert_eq!("FIT".parse::<ResizePolicy>().unwrap(), ResizePolicy::Fit);
        assert!("crop".parse::<ResizePolicy>().is_err());
    }
}
