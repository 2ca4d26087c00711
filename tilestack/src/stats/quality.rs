//! Classification quality indicators derived from a histogram.

use serde::{Deserialize, Serialize};

use super::ClassificationHistogram;

/// One class count plus its percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub count: u64,
    pub percentage: f64,
}

/// Classification-QI block written into the product metadata.
///
/// The data percentage is relative to all pixels; every other percentage
/// is relative to the data pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub total_pixels: u64,
    pub data: ClassShare,
    pub nodata: ClassShare,
    pub good: ClassShare,
    pub bad: ClassShare,
    pub saturated_defective: ClassShare,
    pub dark_features: ClassShare,
    pub cloud_shadows: ClassShare,
    pub vegetation: ClassShare,
    pub not_vegetated: ClassShare,
    pub water: ClassShare,
    pub unclassified: ClassShare,
    pub medium_proba_clouds: ClassShare,
    pub high_proba_clouds: ClassShare,
    pub thin_cirrus: ClassShare,
    pub snow_ice: ClassShare,
}

fn share(count: u64, base: u64) -> ClassShare {
    let percentage = if base == 0 {
        0.0
    } else {
        count as f64 * 100.0 / base as f64
    };
    ClassShare { count, percentage }
}

impl QualityIndicators {
    pub fn from_histogram(h: &ClassificationHistogram) -> Self {
        let d = h.data_pixels;
        Self {
            total_pixels: h.total_pixels,
            data: share(d, h.total_pixels),
            nodata: share(h.nodata_pixels, h.total_pixels),
            good: share(h.good_pixels, d),
            bad: share(h.bad_pixels, d),
            saturated_defective: share(h.saturated_defective, d),
            dark_features: share(h.dark_features, d),
            cloud_shadows: share(h.cloud_shadows, d),
            vegetation: share(h.vegetation, d),
            not_vegetated: share(h.not_vegetated, d),
            water: share(h.water, d),
            unclassified: share(h.unclassified, d),
            medium_proba_clouds: share(h.medium_proba_clouds, d),
            high_proba_clouds: share(h.high_proba_clouds, d),
            thin_cirrus: share(h.thin_cirrus, d),
            snow_ice: share(h.snow_ice, d),
        }
    }
}
