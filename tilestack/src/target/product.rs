use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::{io_error, AggregateTile, TargetError, AGGREGATE_TILE_PREFIX};
use crate::product::{
    format_compact, Granule, NamingConvention, SourceProduct, TARGET_PRODUCT_MASK,
};
use crate::stats::StatsStore;

/// Directories copied from the first source product.
const SCAFFOLD_DIRS: [&str; 4] = ["AUX_DATA", "DATASTRIP", "HTML", "rep_info"];

/// Files copied from the first source product.
const SCAFFOLD_FILES: [&str; 2] = ["INSPIRE.xml", "manifest.safe"];

/// Masks of the source product metadata file.
const PRODUCT_METADATA_MASKS: [&str; 2] = ["MTD_MSIL2A.xml", "S2?_USER_MTD_SAFL2A_*.xml"];

/// Identifier of the target product created from `source`.
///
/// The Level-2A marker becomes `L03_` and the trailing time field becomes
/// `min_time`. Standard identifiers are rewritten into the compact layout.
pub fn target_identifier(
    source: &SourceProduct,
    min_time: &NaiveDateTime,
) -> Result<String, TargetError> {
    let min_time = format_compact(min_time);
    let renamed = source.identifier().replace("L2A_", "L03_");
    let fields: Vec<&str> = renamed.split('_').collect();
    let invalid = |reason: &str| TargetError::InvalidIdentifier {
        identifier: source.identifier().to_string(),
        reason: reason.to_string(),
    };

    match source.convention() {
        NamingConvention::Standard => {
            if fields.len() < 6 {
                return Err(invalid("too few fields"));
            }
            Ok(format!(
                "{}_{}_{}_N0000_R000_T00XXX_{}.SAFE",
                fields[0], fields[3], fields[5], min_time
            ))
        }
        NamingConvention::Compact => {
            let Some((_, head)) = fields.split_last() else {
                return Err(invalid("empty identifier"));
            };
            if head.len() < 6 {
                return Err(invalid("too few fields"));
            }
            Ok(format!("{}_{}.SAFE", head.join("_"), min_time))
        }
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<u64, TargetError> {
    fs::create_dir_all(to).map_err(io_error(to))?;
    let mut copied = 0;
    for entry in fs::read_dir(from).map_err(io_error(from))? {
        let entry = entry.map_err(io_error(from))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());
        if source.is_dir() {
            copied += copy_tree(&source, &dest)?;
        } else {
            fs::copy(&source, &dest).map_err(io_error(&source))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn matches_any(name: &str, masks: &[&str]) -> bool {
    masks
        .iter()
        .filter_map(|m| glob::Pattern::new(m).ok())
        .any(|p| p.matches(name))
}

fn sorted_dir_names(dir: &Path) -> Result<Vec<String>, TargetError> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

/// A Level-3 product directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProduct {
    path: PathBuf,
    identifier: String,
}

impl TargetProduct {
    /// Find an existing target product in `target_dir`.
    pub fn locate(target_dir: &Path) -> Result<Option<Self>, TargetError> {
        if !target_dir.is_dir() {
            return Ok(None);
        }
        let pattern = glob::Pattern::new(TARGET_PRODUCT_MASK).map_err(|e| {
            TargetError::InvalidIdentifier {
                identifier: TARGET_PRODUCT_MASK.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(sorted_dir_names(target_dir)?
            .into_iter()
            .find(|name| pattern.matches(name) && target_dir.join(name).is_dir())
            .map(|identifier| Self {
                path: target_dir.join(&identifier),
                identifier,
            }))
    }

    /// Create the target product from the first eligible source product.
    ///
    /// Ancillary directories and files are deep-copied when the source has
    /// them; `GRANULE/` and a fresh statistics store are created.
    pub fn materialize(
        target_dir: &Path,
        source: &SourceProduct,
        min_time: &NaiveDateTime,
    ) -> Result<Self, TargetError> {
        let identifier = target_identifier(source, min_time)?;
        let path = target_dir.join(&identifier);
        fs::create_dir_all(&path).map_err(io_error(&path))?;

        for dir in SCAFFOLD_DIRS {
            let from = source.path().join(dir);
            if from.is_dir() {
                let files = copy_tree(&from, &path.join(dir))?;
                debug!(dir, files, "Scaffolding copied");
            } else {
                warn!(source = %source.identifier(), dir, "Scaffolding directory missing");
            }
        }
        let source_files = sorted_dir_names(source.path())?;
        for name in source_files {
            let wanted =
                SCAFFOLD_FILES.contains(&name.as_str()) || matches_any(&name, &PRODUCT_METADATA_MASKS);
            let from = source.path().join(&name);
            if wanted && from.is_file() {
                fs::copy(&from, path.join(&name)).map_err(io_error(&from))?;
            }
        }

        let product = Self { path, identifier };
        let granule_dir = product.granule_dir();
        fs::create_dir_all(&granule_dir).map_err(io_error(&granule_dir))?;
        StatsStore::create(product.stats_path())?;

        info!(
            target = %product.identifier,
            source = %source.identifier(),
            "Target product created"
        );
        Ok(product)
    }

    /// Reattach to an existing target product, or create one from `source`.
    ///
    /// # Returns
    ///
    /// The product and whether it was created by this call.
    pub fn locate_or_materialize(
        target_dir: &Path,
        source: &SourceProduct,
        min_time: &NaiveDateTime,
    ) -> Result<(Self, bool), TargetError> {
        match Self::locate(target_dir)? {
            Some(existing) => {
                info!(target = %existing.identifier, "Target product reattached");
                Ok((existing, false))
            }
            None => Ok((Self::materialize(target_dir, source, min_time)?, true)),
        }
    }

    /// Remove every target product in `target_dir`.
    ///
    /// Returns the number of products removed.
    pub fn clean(target_dir: &Path) -> Result<usize, TargetError> {
        let mut removed = 0;
        while let Some(product) = Self::locate(target_dir)? {
            fs::remove_dir_all(&product.path).map_err(io_error(&product.path))?;
            info!(target = %product.identifier, "Target product removed");
            removed += 1;
        }
        Ok(removed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `GRANULE` directory.
    pub fn granule_dir(&self) -> PathBuf {
        self.path.join("GRANULE")
    }

    pub fn stats_path(&self) -> PathBuf {
        StatsStore::in_product(&self.path)
    }

    /// Statistics store of the product, created if a reattached product
    /// lacks one.
    pub fn stats(&self) -> Result<StatsStore, TargetError> {
        Ok(StatsStore::open_or_create(self.stats_path())?)
    }

    /// Aggregate tiles of the product, sorted by name.
    pub fn aggregate_tiles(&self) -> Result<Vec<AggregateTile>, TargetError> {
        let dir = self.granule_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(sorted_dir_names(&dir)?
            .into_iter()
            .filter(|name| name.starts_with(AGGREGATE_TILE_PREFIX))
            .filter_map(|name| AggregateTile::from_dir(dir.join(name)))
            .collect())
    }

    /// The aggregate tile covering `granule`'s footprint, created on first
    /// use.
    pub fn aggregate_tile_for(&self, granule: &Granule) -> Result<AggregateTile, TargetError> {
        let footprint = &granule.tile().footprint;
        if let Some(existing) = self
            .aggregate_tiles()?
            .into_iter()
            .find(|t| t.footprint() == footprint)
        {
            return Ok(existing);
        }
        AggregateTile::create(&self.granule_dir(), granule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const COMPACT_ID: &str = "S2A_MSIL2A_20170608T100431_N0205_R122_T32TQM_20170608T100435.SAFE";
    const STANDARD_ID: &str =
        "S2A_USER_PRD_MSIL2A_PDMC_20160615T123456_R022_V20160615T101032_20160615T101032.SAFE";

    fn min_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn source(dir: &Path, identifier: &str) -> SourceProduct {
        let path = dir.join(identifier);
        fs::create_dir_all(path.join("GRANULE")).unwrap();
        SourceProduct::from_dir(path).unwrap()
    }

    #[test]
    fn test_target_identifier_compact() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path(), COMPACT_ID);
        assert_eq!(
            target_identifier(&src, &min_time()).unwrap(),
            "S2A_MSIL03_20170608T100431_N0205_R122_T32TQM_20170101T000000.SAFE"
        );
    }

    #[test]
    fn test_target_identifier_standard() {
        let dir = TempDir::new().unwrap();
        let src = source(dir.path(), STANDARD_ID);
        assert_eq!(
            target_identifier(&src, &min_time()).unwrap(),
            "S2A_MSIL03_20160615T123456_N0000_R000_T00XXX_20170101T000000.SAFE"
        );
    }

    #[test]
    fn test_materialize_copies_scaffolding() {
        let src_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let src = source(src_dir.path(), COMPACT_ID);
        fs::create_dir_all(src.path().join("DATASTRIP/DS_X")).unwrap();
        fs::write(src.path().join("DATASTRIP/DS_X/MTD_DS.xml"), "<ds/>").unwrap();
        fs::write(src.path().join("manifest.safe"), "m").unwrap();
        fs::write(src.path().join("MTD_MSIL2A.xml"), "<p/>").unwrap();
        fs::write(src.path().join("unrelated.txt"), "x").unwrap();

        let product = TargetProduct::materialize(target_dir.path(), &src, &min_time()).unwrap();

        assert!(product.granule_dir().is_dir());
        assert!(product.stats_path().is_file());
        assert_eq!(
            fs::read_to_string(product.path().join("DATASTRIP/DS_X/MTD_DS.xml")).unwrap(),
            "<ds/>"
        );
        assert!(product.path().join("manifest.safe").is_file());
        assert!(product.path().join("MTD_MSIL2A.xml").is_file());
        assert!(!product.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_locate_or_materialize_reattaches() {
        let src_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let src = source(src_dir.path(), COMPACT_ID);

        let (first, created) =
            TargetProduct::locate_or_materialize(target_dir.path(), &src, &min_time()).unwrap();
        assert!(created);
        let (second, created) =
            TargetProduct::locate_or_materialize(target_dir.path(), &src, &min_time()).unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clean_removes_products() {
        let src_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let src = source(src_dir.path(), COMPACT_ID);
        TargetProduct::materialize(target_dir.path(), &src, &min_time()).unwrap();

        assert_eq!(TargetProduct::clean(target_dir.path()).unwrap(), 1);
        assert!(TargetProduct::locate(target_dir.path()).unwrap().is_none());
        assert_eq!(TargetProduct::clean(target_dir.path()).unwrap(), 0);
    }
}
