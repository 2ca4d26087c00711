//! Pixel-classification histogram.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::config::Classifiers;

/// Pixel counts per scene class for one tile's composite.
///
/// `data_pixels` is every pixel that is not no-data. `bad_pixels` counts the
/// invalid classes (saturated or defective, cloud shadows, medium and high
/// probability clouds, thin cirrus); `good_pixels` counts the surface classes
/// (dark features, vegetation, bare soil, water, snow and ice).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationHistogram {
    pub total_pixels: u64,
    pub data_pixels: u64,
    pub nodata_pixels: u64,
    pub good_pixels: u64,
    pub bad_pixels: u64,
    pub saturated_defective: u64,
    pub dark_features: u64,
    pub cloud_shadows: u64,
    pub vegetation: u64,
    pub not_vegetated: u64,
    pub water: u64,
    pub unclassified: u64,
    pub medium_proba_clouds: u64,
    pub high_proba_clouds: u64,
    pub thin_cirrus: u64,
    pub snow_ice: u64,
}

impl ClassificationHistogram {
    /// Count the classes of a classification map.
    pub fn from_classification(pixels: &[u8], classifiers: &Classifiers) -> Self {
        let mut h = ClassificationHistogram {
            total_pixels: pixels.len() as u64,
            ..Default::default()
        };
        let c = classifiers;
        for &p in pixels {
            if p == c.no_data {
                h.nodata_pixels += 1;
                continue;
            }
            h.data_pixels += 1;
            if p == c.saturated_defective {
                h.saturated_defective += 1;
                h.bad_pixels += 1;
            } else if p == c.dark_features {
                h.dark_features += 1;
                h.good_pixels += 1;
            } else if p == c.cloud_shadows {
                h.cloud_shadows += 1;
                h.bad_pixels += 1;
            } else if p == c.vegetation {
                h.vegetation += 1;
                h.good_pixels += 1;
            } else if p == c.not_vegetated {
                h.not_vegetated += 1;
                h.good_pixels += 1;
            } else if p == c.water {
                h.water += 1;
                h.good_pixels += 1;
            } else if p == c.unclassified {
                h.unclassified += 1;
            } else if p == c.medium_proba_clouds {
                h.medium_proba_clouds += 1;
                h.bad_pixels += 1;
            } else if p == c.high_proba_clouds {
                h.high_proba_clouds += 1;
                h.bad_pixels += 1;
            } else if p == c.thin_cirrus {
                h.thin_cirrus += 1;
                h.bad_pixels += 1;
            } else if p == c.snow_ice {
                h.snow_ice += 1;
                h.good_pixels += 1;
            }
        }
        h
    }

    /// `count` as a percentage of data pixels; `None` without data pixels.
    pub fn percent_of_data(&self, count: u64) -> Option<f64> {
        if self.data_pixels == 0 {
            None
        } else {
            Some(count as f64 * 100.0 / self.data_pixels as f64)
        }
    }
}

impl AddAssign for ClassificationHistogram {
    fn add_assign(&mut self, rhs: Self) {
        self.total_pixels += rhs.total_pixels;
        self.data_pixels += rhs.data_pixels;
        self.nodata_pixels += rhs.nodata_pixels;
        self.good_pixels += rhs.good_pixels;
        self.bad_pixels += rhs.bad_pixels;
        self.saturated_defective += rhs.saturated_defective;
        self.dark_features += rhs.dark_features;
        self.cloud_shadows += rhs.cloud_shadows;
        self.vegetation += rhs.vegetation;
        self.not_vegetated += rhs.not_vegetated;
        self.water += rhs.water;
        self.unclassified += rhs.unclassified;
        self.medium_proba_clouds += rhs.medium_proba_clouds;
        self.high_proba_clouds += rhs.high_proba_clouds;
        self.thin_cirrus += rhs.thin_cirrus;
        self.snow_ice += rhs.snow_ice;
    }
}
