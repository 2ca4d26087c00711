use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MetadataError, MetadataRepository, ProvenanceEntry};
use crate::band::Resolution;
use crate::stats::QualityIndicators;

/// File name of the metadata document inside the target product.
pub const METADATA_FILE_NAME: &str = "MTD_MSIL03.json";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct GranuleEntry {
    name: String,
    resolution: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
    /// Keyed by resolution in metres.
    #[serde(default)]
    quality: BTreeMap<u32, QualityIndicators>,
    #[serde(default)]
    granules: Vec<GranuleEntry>,
    #[serde(default)]
    provenance: Vec<ProvenanceEntry>,
}

/// Keeps product metadata as a JSON document next to the product's
/// statistics.
#[derive(Debug, Clone)]
pub struct JsonMetadataRepository {
    path: PathBuf,
}

impl JsonMetadataRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository stored inside `product_dir`.
    pub fn in_product(product_dir: &Path) -> Self {
        Self::new(product_dir.join(METADATA_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classification-QI block of `resolution`, if written.
    pub fn classification_qi(
        &self,
        resolution: Resolution,
    ) -> Result<Option<QualityIndicators>, MetadataError> {
        Ok(self.load()?.quality.remove(&resolution.meters()))
    }

    /// Listed granule names at `resolution`, sorted.
    pub fn granules(&self, resolution: Resolution) -> Result<Vec<String>, MetadataError> {
        let meters = resolution.meters();
        Ok(self
            .load()?
            .granules
            .into_iter()
            .filter(|g| g.resolution == meters)
            .map(|g| g.name)
            .collect())
    }

    /// Provenance entries in append order.
    pub fn provenance(&self) -> Result<Vec<ProvenanceEntry>, MetadataError> {
        Ok(self.load()?.provenance)
    }

    fn load(&self) -> Result<MetadataDocument, MetadataError> {
        if !self.path.exists() {
            return Ok(MetadataDocument::default());
        }
        let file = File::open(&self.path).map_err(|source| MetadataError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| MetadataError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, document: &MetadataDocument) -> Result<(), MetadataError> {
        let temp_path = self.path.with_extension("json.tmp");
        let write_err = |source| MetadataError::Write {
            path: temp_path.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&temp_path).map_err(write_err)?);
        serde_json::to_writer_pretty(&mut writer, document).map_err(|e| MetadataError::Parse {
            path: temp_path.clone(),
            reason: e.to_string(),
        })?;
        writer.flush().map_err(write_err)?;
        drop(writer);
        fs::rename(&temp_path, &self.path).map_err(|source| MetadataError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn update(&self, f: impl FnOnce(&mut MetadataDocument)) -> Result<(), MetadataError> {
        let mut document = self.load()?;
        f(&mut document);
        self.save(&document)
    }
}

impl MetadataRepository for JsonMetadataRepository {
    fn write_classification_qi(
        &self,
        resolution: Resolution,
        indicators: &QualityIndicators,
    ) -> Result<(), MetadataError> {
        self.update(|doc| {
            doc.quality.insert(resolution.meters(), indicators.clone());
        })?;
        debug!(resolution = resolution.meters(), "Classification QI written");
        Ok(())
    }

    fn record_granule(&self, granule: &str, resolution: Resolution) -> Result<(), MetadataError> {
        let entry = GranuleEntry {
            name: granule.to_string(),
            resolution: resolution.meters(),
        };
        self.update(|doc| {
            if !doc.granules.contains(&entry) {
                doc.granules.push(entry);
                doc.granules.sort();
            }
        })
    }

    fn record_provenance(&self, entry: &ProvenanceEntry) -> Result<(), MetadataError> {
        self.update(|doc| doc.provenance.push(entry.clone()))
    }
}
