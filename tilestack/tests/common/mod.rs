//! Synthetic source products for integration tests.
//!
//! Products use the compact naming convention:
//! `S2A_MSIL2A_<sensing>_N0205_R022_<footprint>_<sensing>.SAFE`, with one
//! granule `L2A_<footprint>_<orbit>_<sensing>` holding PNG band files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tilestack::band::{Band, Resolution};
use tilestack::cache::TileCache;
use tilestack::codec::{EncodeProfile, GeoRefBlock, PngCodec, RasterCodec};
use tilestack::raster::{Raster, RasterData};
use tilestack::stats::ClassificationHistogram;
use tilestack::synthesis::{Synthesis, SynthesisError, SynthesisParams, TimeStep};

pub const FOOTPRINT: &str = "T32TQM";

/// One band file to write into a granule.
pub struct BandFile {
    pub band: Band,
    pub resolution: Resolution,
    pub raster: Raster,
    pub georef: Option<Vec<u8>>,
}

impl BandFile {
    pub fn u16(band: Band, resolution: Resolution, rows: usize, cols: usize, values: Vec<u16>) -> Self {
        Self {
            band,
            resolution,
            raster: Raster::new(rows, cols, RasterData::U16(values)).unwrap(),
            georef: None,
        }
    }

    pub fn u8(band: Band, resolution: Resolution, rows: usize, cols: usize, values: Vec<u8>) -> Self {
        Self {
            band,
            resolution,
            raster: Raster::new(rows, cols, RasterData::U8(values)).unwrap(),
            georef: None,
        }
    }

    pub fn with_georef(mut self, block: &[u8]) -> Self {
        self.georef = Some(block.to_vec());
        self
    }
}

pub fn product_id(sensing: &str) -> String {
    format!("S2A_MSIL2A_{sensing}_N0205_R022_{FOOTPRINT}_{sensing}.SAFE")
}

pub fn granule_name(orbit: &str, sensing: &str) -> String {
    format!("L2A_{FOOTPRINT}_{orbit}_{sensing}")
}

/// Write a product with a single granule and return the product directory.
pub fn write_product(source_dir: &Path, sensing: &str, orbit: &str, bands: &[BandFile]) -> PathBuf {
    let product = source_dir.join(product_id(sensing));
    let granule = product.join("GRANULE").join(granule_name(orbit, sensing));
    fs::create_dir_all(&granule).unwrap();
    fs::write(granule.join("MTD_TL.xml"), format!("<tile sensing=\"{sensing}\"/>")).unwrap();
    fs::create_dir_all(product.join("DATASTRIP/DS_TEST")).unwrap();
    fs::write(product.join("DATASTRIP/DS_TEST/MTD_DS.xml"), "<ds/>").unwrap();
    fs::write(product.join("MTD_MSIL2A.xml"), "<product/>").unwrap();

    let codec = PngCodec::new();
    for file in bands {
        let dir = granule.join("IMG_DATA").join(file.resolution.dir_name());
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!(
            "{FOOTPRINT}_{sensing}_{}_{}m.png",
            file.band.name(),
            file.resolution.meters()
        ));
        codec
            .encode(&file.raster, &EncodeProfile::for_resolution(file.resolution), &path)
            .unwrap();
        if let Some(block) = &file.georef {
            codec
                .splice_georef(&path, &GeoRefBlock::new(block.clone()))
                .unwrap();
        }
    }
    product
}

/// A minimal 60 m tile: reference band plus classification map.
pub fn write_simple_product(
    source_dir: &Path,
    sensing: &str,
    orbit: &str,
    b02: Vec<u16>,
    scl: Vec<u8>,
) -> PathBuf {
    let n = b02.len();
    write_product(
        source_dir,
        sensing,
        orbit,
        &[
            BandFile::u16(Band::B02, Resolution::R60, 1, n, b02)
                .with_georef(format!("GEO-{sensing}").as_bytes()),
            BandFile::u8(Band::SCL, Resolution::R60, 1, n, scl),
        ],
    )
}

/// Histogram over 100 data pixels.
pub fn histogram(bad: u64, unclassified: u64, medium: u64, high: u64) -> ClassificationHistogram {
    ClassificationHistogram {
        total_pixels: 100,
        data_pixels: 100,
        bad_pixels: bad,
        good_pixels: 100 - bad - unclassified,
        unclassified,
        medium_proba_clouds: medium,
        high_proba_clouds: high,
        ..Default::default()
    }
}

/// Synthesis that returns scripted histograms and records what it saw.
#[derive(Clone, Default)]
pub struct ScriptedSynthesis {
    state: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    histograms: Vec<ClassificationHistogram>,
    calls: Vec<(String, u32)>,
}

impl ScriptedSynthesis {
    pub fn new(histograms: Vec<ClassificationHistogram>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Script {
                histograms,
                calls: Vec::new(),
            })),
        }
    }

    /// `(tile, pass)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl Synthesis for ScriptedSynthesis {
    fn synthesize(
        &self,
        _cache: &TileCache,
        step: &TimeStep<'_>,
        _params: &SynthesisParams,
    ) -> Result<ClassificationHistogram, SynthesisError> {
        let mut state = self.state.lock().unwrap();
        let index = state.calls.len();
        state.calls.push((step.tile.to_string(), step.pass));
        Ok(state.histograms.get(index).copied().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
