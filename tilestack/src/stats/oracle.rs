//! Early-termination policy.

use std::fmt;

use tracing::{debug, info};

use super::{ClassificationHistogram, StatsError, StatsStore};
use crate::band::Resolution;
use crate::config::Thresholds;

/// Why further time-steps are not worth processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationReason {
    /// Unclassified, medium and high cloud shares are all below the limit.
    CloudCoverReached {
        unclassified: f64,
        medium_clouds: f64,
        high_clouds: f64,
    },
    /// Invalid pixel share exceeds the limit.
    InvalidPixelsExceeded { bad: f64 },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::CloudCoverReached {
                unclassified,
                medium_clouds,
                high_clouds,
            } => write!(
                f,
                "cloud cover reached (unclassified {:.2}%, medium clouds {:.2}%, high clouds {:.2}%)",
                unclassified, medium_clouds, high_clouds
            ),
            TerminationReason::InvalidPixelsExceeded { bad } => {
                write!(f, "invalid pixels exceeded ({:.2}%)", bad)
            }
        }
    }
}

/// Pure evaluation of aggregated counters against the configured thresholds.
#[derive(Debug, Clone, Copy)]
pub struct TerminationOracle {
    thresholds: Thresholds,
}

impl TerminationOracle {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Decide on a histogram. The low-cloud condition is checked before the
    /// invalid-pixel breach. Without data pixels nothing is decided.
    pub fn evaluate(&self, histogram: &ClassificationHistogram) -> Option<TerminationReason> {
        let bad = histogram.percent_of_data(histogram.bad_pixels)?;
        let unclassified = histogram.percent_of_data(histogram.unclassified)?;
        let medium_clouds = histogram.percent_of_data(histogram.medium_proba_clouds)?;
        let high_clouds = histogram.percent_of_data(histogram.high_proba_clouds)?;

        debug!(bad, unclassified, medium_clouds, high_clouds, "Evaluating termination");

        let limit = self.thresholds.max_cloud_probability;
        if unclassified < limit && medium_clouds < limit && high_clouds < limit {
            return Some(TerminationReason::CloudCoverReached {
                unclassified,
                medium_clouds,
                high_clouds,
            });
        }
        if bad > self.thresholds.max_invalid_pixels_percentage {
            return Some(TerminationReason::InvalidPixelsExceeded { bad });
        }
        None
    }

    /// Evaluate the aggregate of every footprint at `resolution`.
    pub fn should_terminate(
        &self,
        store: &StatsStore,
        resolution: Resolution,
    ) -> Result<Option<TerminationReason>, StatsError> {
        let aggregate = store.aggregate(resolution)?;
        let decision = self.evaluate(&aggregate);
        if let Some(reason) = decision {
            info!(resolution = resolution.meters(), %reason, "Termination condition met");
        }
        Ok(decision)
    }
}
