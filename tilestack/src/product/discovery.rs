//! Source product discovery.
//!
//! Products are found once per run by scanning the source directory. Each
//! is classified, its acquisition window parsed, and the list filtered to the
//! configured time range and sorted by window start.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::naming::SOURCE_PRODUCT_MASK;
use super::{AcquisitionWindow, Granule, NamingConvention, ProductError};

/// A Level-2A source product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProduct {
    path: PathBuf,
    identifier: String,
    convention: NamingConvention,
    window: AcquisitionWindow,
}

impl SourceProduct {
    /// Classify a product directory and parse its window.
    pub fn from_dir(path: impl Into<PathBuf>) -> Result<Self, ProductError> {
        let path = path.into();
        let identifier = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProductError::InvalidIdentifier {
                identifier: path.display().to_string(),
                reason: "not a valid directory name".to_string(),
            })?
            .to_string();
        let convention =
            NamingConvention::classify(&identifier).ok_or_else(|| ProductError::InvalidIdentifier {
                identifier: identifier.clone(),
                reason: "unknown naming convention".to_string(),
            })?;
        let window = AcquisitionWindow::parse(&identifier, convention)?;
        Ok(Self {
            path,
            identifier,
            convention,
            window,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn convention(&self) -> NamingConvention {
        self.convention
    }

    pub fn window(&self) -> &AcquisitionWindow {
        &self.window
    }

    /// `GRANULE` directory.
    pub fn granule_dir(&self) -> PathBuf {
        self.path.join("GRANULE")
    }

    /// Granules of this product, sorted by name.
    ///
    /// Directories matching the granule mask but not carrying a parseable
    /// tile identity are skipped.
    pub fn granules(&self) -> Result<Vec<Granule>, ProductError> {
        let dir = self.granule_dir();
        let entries = fs::read_dir(&dir).map_err(|source| ProductError::ReadDir {
            path: dir.clone(),
            source,
        })?;
        let mask = glob::Pattern::new(self.convention.layout().granule_mask).map_err(|e| {
            ProductError::InvalidIdentifier {
                identifier: self.identifier.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut granules = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProductError::ReadDir {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let matches_mask = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| mask.matches(n));
            if !path.is_dir() || !matches_mask {
                continue;
            }
            match Granule::from_dir(&path, self.convention) {
                Some(granule) => granules.push(granule),
                None => debug!(path = %path.display(), "Ignoring granule without tile identity"),
            }
        }
        granules.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(granules)
    }
}

/// Scan `source_dir` for Level-2A products acquired within `[min, max]`.
///
/// # Returns
///
/// Products sorted ascending by window start (ties broken by identifier).
///
/// # Errors
///
/// Fails if the directory cannot be read or a product identifier follows
/// neither naming convention.
pub fn discover_products(
    source_dir: &Path,
    min: &NaiveDateTime,
    max: &NaiveDateTime,
) -> Result<Vec<SourceProduct>, ProductError> {
    let mask = glob::Pattern::new(SOURCE_PRODUCT_MASK).map_err(|e| ProductError::InvalidIdentifier {
        identifier: SOURCE_PRODUCT_MASK.to_string(),
        reason: e.to_string(),
    })?;
    let entries = fs::read_dir(source_dir).map_err(|source| ProductError::ReadDir {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut products = Vec::new();
    let mut scanned = 0usize;
    for entry in entries {
        let entry = entry.map_err(|source| ProductError::ReadDir {
            path: source_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_product = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| mask.matches(n));
        if !is_product {
            continue;
        }
        scanned += 1;

        let product = SourceProduct::from_dir(&path)?;
        if product.window().intersects(min, max) {
            products.push(product);
        } else {
            debug!(product = %product.identifier(), "Outside configured time range");
        }
    }

    products.sort_by(|a, b| {
        a.window
            .start
            .cmp(&b.window.start)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    info!(
        source = %source_dir.display(),
        scanned,
        eligible = products.len(),
        "Source products discovered"
    );
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::parse_timestamp;
    use tempfile::TempDir;

    fn mkdir(root: &Path, name: &str) -> PathBuf {
        let path = root.join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn t(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        mkdir(dir.path(), "S2A_MSIL2A_20170620T100431_N0205_R122_T32TQM_20170620T100435.SAFE");
        mkdir(dir.path(), "S2A_MSIL2A_20170601T100431_N0205_R122_T32TQM_20170601T100435.SAFE");
        mkdir(
            dir.path(),
            "S2A_USER_PRD_MSIL2A_PDMC_20170610T123456_R022_V20170610T101032_20170610T101032.SAFE",
        );
        mkdir(dir.path(), "S2A_MSIL2A_20180101T100431_N0205_R122_T32TQM_20180101T100435.SAFE");
        mkdir(dir.path(), "unrelated");

        let products =
            discover_products(dir.path(), &t("20170501T000000"), &t("20171231T235959")).unwrap();

        let ids: Vec<&str> = products.iter().map(|p| p.identifier()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids[0].contains("20170601T100435"));
        assert_eq!(products[1].convention(), NamingConvention::Standard);
        assert!(ids[2].contains("20170620T100435"));
    }

    #[test]
    fn test_discover_ignores_target_product() {
        let dir = TempDir::new().unwrap();
        mkdir(dir.path(), "S2A_MSIL03_20170601T100431_N0205_R122_T32TQM_20170501T000000.SAFE");

        let products =
            discover_products(dir.path(), &t("20170101T000000"), &t("20171231T235959")).unwrap();
        assert!(products.is_empty());
    }

    #[test]
    fn test_unknown_convention_is_error() {
        let dir = TempDir::new().unwrap();
        mkdir(dir.path(), "S2A_XXX_MSIL2A_broken");

        let err = discover_products(dir.path(), &t("20170101T000000"), &t("20171231T235959"))
            .unwrap_err();
        assert!(matches!(err, ProductError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_missing_source_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let err = discover_products(
            &dir.path().join("missing"),
            &t("20170101T000000"),
            &t("20171231T235959"),
        )
        .unwrap_err();
        assert!(matches!(err, ProductError::ReadDir { .. }));
    }

    #[test]
    fn test_granules_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let product_dir = mkdir(
            dir.path(),
            "S2A_MSIL2A_20170601T100431_N0205_R122_T32TQM_20170601T100435.SAFE",
        );
        mkdir(&product_dir, "GRANULE/L2A_T32TQN_A010440_20170601T100435");
        mkdir(&product_dir, "GRANULE/L2A_T32TQM_A010440_20170601T100435");
        mkdir(&product_dir, "GRANULE/QI_DATA");
        mkdir(&product_dir, "GRANULE/L2A_bogus");

        let product = SourceProduct::from_dir(&product_dir).unwrap();
        let granules = product.granules().unwrap();

        let footprints: Vec<&str> = granules.iter().map(|g| g.tile().footprint.as_str()).collect();
        assert_eq!(footprints, vec!["T32TQM", "T32TQN"]);
    }
}
