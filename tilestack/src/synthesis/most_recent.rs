//! Most-recent-valid-observation compositing.

use tracing::debug;

use super::{Synthesis, SynthesisError, SynthesisParams, TimeStep};
use crate::band::Band;
use crate::cache::{CacheLevel, TileCache};
use crate::raster::{ElementType, Raster, RasterData};
use crate::stats::ClassificationHistogram;

/// Replaces composite pixels with every valid pixel of the newer time-step.
///
/// A raw pixel is valid when its class is a surface class, or cirrus,
/// shadow or snow with the matching removal switched off. A composite pixel
/// without data is also filled by any raw pixel that carries data. The
/// mosaic map records the pass number of the time-step that contributed
/// each pixel.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostRecentSynthesis;

impl MostRecentSynthesis {
    pub fn new() -> Self {
        Self
    }
}

fn is_valid(class: u8, params: &SynthesisParams) -> bool {
    let c = &params.classifiers;
    if class == c.dark_features
        || class == c.vegetation
        || class == c.not_vegetated
        || class == c.water
    {
        true
    } else if class == c.snow_ice {
        !params.snow_removal
    } else if class == c.thin_cirrus {
        !params.cirrus_removal
    } else if class == c.cloud_shadows {
        !params.shadow_removal
    } else {
        false
    }
}

fn classes(raster: &Raster) -> Vec<u8> {
    match raster.to_element_type(ElementType::U8).into_data() {
        RasterData::U8(values) => values,
        RasterData::U16(values) => values.into_iter().map(|v| v.min(255) as u8).collect(),
    }
}

fn copy_masked<T: Copy>(base: &mut [T], top: &[T], mask: &[bool]) {
    for ((b, t), &take) in base.iter_mut().zip(top).zip(mask) {
        if take {
            *b = *t;
        }
    }
}

fn overlay(band: Band, base: Raster, top: &Raster, mask: &[bool]) -> Result<Raster, SynthesisError> {
    let (rows, cols) = base.dims();
    let top = top.to_element_type(base.element_type());
    let data = match (base.into_data(), top.into_data()) {
        (RasterData::U8(mut b), RasterData::U8(t)) => {
            copy_masked(&mut b, &t, mask);
            RasterData::U8(b)
        }
        (RasterData::U16(mut b), RasterData::U16(t)) => {
            copy_masked(&mut b, &t, mask);
            RasterData::U16(b)
        }
        (b, _) => b,
    };
    Raster::new(rows, cols, data).map_err(|source| SynthesisError::Raster { band, source })
}

impl MostRecentSynthesis {
    fn write_mosaic(
        &self,
        cache: &TileCache,
        dims: (usize, usize),
        mask: &[bool],
        pass: u32,
    ) -> Result<(), SynthesisError> {
        let marker = pass.min(u8::MAX as u32) as u8;
        let mut mosaic = match cache.get_band(CacheLevel::Aggregate, Band::MSC)? {
            Some(existing) if existing.dims() == dims => classes(&existing),
            _ => vec![0u8; dims.0 * dims.1],
        };
        for (value, &take) in mosaic.iter_mut().zip(mask) {
            if take {
                *value = marker;
            }
        }
        let raster = Raster::new(dims.0, dims.1, RasterData::U8(mosaic)).map_err(|source| {
            SynthesisError::Raster {
                band: Band::MSC,
                source,
            }
        })?;
        cache.set_band(CacheLevel::Aggregate, Band::MSC, &raster)?;
        Ok(())
    }

    /// First time-step: the composite is the staged tile itself.
    fn seed(
        &self,
        cache: &TileCache,
        step: &TimeStep<'_>,
        params: &SynthesisParams,
    ) -> Result<ClassificationHistogram, SynthesisError> {
        let Some(scl) = cache.get_band(CacheLevel::Aggregate, Band::SCL)? else {
            debug!(tile = %step.tile, "No classification map, histogram left empty");
            return Ok(ClassificationHistogram::default());
        };
        let scl_classes = classes(&scl);
        let mask: Vec<bool> = scl_classes
            .iter()
            .map(|&c| c != params.classifiers.no_data)
            .collect();
        self.write_mosaic(cache, scl.dims(), &mask, step.pass)?;
        Ok(ClassificationHistogram::from_classification(
            &scl_classes,
            &params.classifiers,
        ))
    }
}

impl Synthesis for MostRecentSynthesis {
    fn synthesize(
        &self,
        cache: &TileCache,
        step: &TimeStep<'_>,
        params: &SynthesisParams,
    ) -> Result<ClassificationHistogram, SynthesisError> {
        if step.stage.seeded() {
            return self.seed(cache, step, params);
        }

        let raw_scl = cache
            .get_band(CacheLevel::RawInput, Band::SCL)?
            .ok_or(SynthesisError::MissingBand {
                level: CacheLevel::RawInput,
                band: Band::SCL,
            })?;
        let dims = raw_scl.dims();
        let no_data = params.classifiers.no_data;
        let raw_classes = classes(&raw_scl);
        let aggregate_classes = match cache.get_band(CacheLevel::Aggregate, Band::SCL)? {
            Some(scl) if scl.dims() != dims => {
                return Err(SynthesisError::ShapeMismatch {
                    band: Band::SCL,
                    expected: scl.dims(),
                    found: dims,
                })
            }
            Some(scl) => classes(&scl),
            None => vec![no_data; raw_classes.len()],
        };

        let mask: Vec<bool> = raw_classes
            .iter()
            .zip(&aggregate_classes)
            .map(|(&raw, &agg)| is_valid(raw, params) || (agg == no_data && raw != no_data))
            .collect();

        for band in cache.bands(CacheLevel::RawInput)? {
            if band == Band::MSC {
                continue;
            }
            let Some(raw) = cache.get_band(CacheLevel::RawInput, band)? else {
                continue;
            };
            if raw.dims() != dims {
                return Err(SynthesisError::ShapeMismatch {
                    band,
                    expected: dims,
                    found: raw.dims(),
                });
            }
            let base = match cache.get_band(CacheLevel::Aggregate, band)? {
                Some(existing) if existing.dims() != dims => {
                    return Err(SynthesisError::ShapeMismatch {
                        band,
                        expected: existing.dims(),
                        found: dims,
                    })
                }
                Some(existing) => existing,
                None => Raster::zeros(dims.0, dims.1, band.element_type()),
            };
            let merged = overlay(band, base, &raw, &mask)?;
            cache.set_band(CacheLevel::Aggregate, band, &merged)?;
        }

        self.write_mosaic(cache, dims, &mask, step.pass)?;

        let replaced = mask.iter().filter(|&&m| m).count();
        debug!(
            tile = %step.tile,
            pass = step.pass,
            replaced,
            pixels = mask.len(),
            "Time-step merged into composite"
        );

        let composite = cache
            .get_band(CacheLevel::Aggregate, Band::SCL)?
            .ok_or(SynthesisError::MissingBand {
                level: CacheLevel::Aggregate,
                band: Band::SCL,
            })?;
        Ok(ClassificationHistogram::from_classification(
            &classes(&composite),
            &params.classifiers,
        ))
    }

    fn name(&self) -> &'static str {
        "most-recent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::band::Resolution;
    use crate::cache::{StageReport, CACHE_DIR_NAME};
    use crate::codec::PngCodec;
    use crate::config::EngineConfig;
    use crate::product::TileId;
    use crate::stats::StatsStore;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        cache: TileCache,
        stats: StatsStore,
        tile: TileId,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = TileCache::open(
            dir.path().join(CACHE_DIR_NAME),
            Resolution::R60,
            Arc::new(PngCodec::new()),
        )
        .unwrap();
        let stats = StatsStore::create(dir.path().join(".statistics.json")).unwrap();
        Fixture {
            _dir: dir,
            cache,
            stats,
            tile: TileId::new("T32TQM", "A010440"),
        }
    }

    fn stage(level: CacheLevel) -> StageReport {
        StageReport {
            level,
            shape: (2, 2),
            imported: vec![Band::B02, Band::SCL],
            missing: vec![],
        }
    }

    fn u8_raster(values: Vec<u8>) -> Raster {
        Raster::new(2, 2, RasterData::U8(values)).unwrap()
    }

    fn u16_raster(values: Vec<u16>) -> Raster {
        Raster::new(2, 2, RasterData::U16(values)).unwrap()
    }

    fn params() -> SynthesisParams {
        SynthesisParams::from_config(&EngineConfig::new("/tmp", Resolution::R60))
    }

    #[test]
    fn test_seed_marks_data_pixels() {
        let f = fixture();
        f.cache
            .set_band(CacheLevel::Aggregate, Band::SCL, &u8_raster(vec![0, 4, 9, 4]))
            .unwrap();
        let report = stage(CacheLevel::Aggregate);
        let step = TimeStep {
            tile: &f.tile,
            pass: 1,
            stage: &report,
            stats: &f.stats,
        };

        let h = MostRecentSynthesis::new()
            .synthesize(&f.cache, &step, &params())
            .unwrap();

        assert_eq!(h.data_pixels, 3);
        assert_eq!(h.high_proba_clouds, 1);
        assert_eq!(
            f.cache.get_band(CacheLevel::Aggregate, Band::MSC).unwrap(),
            Some(u8_raster(vec![0, 1, 1, 1]))
        );
    }

    #[test]
    fn test_valid_raw_pixels_replace_composite() {
        let f = fixture();
        let agg = CacheLevel::Aggregate;
        let raw = CacheLevel::RawInput;
        f.cache.set_band(agg, Band::SCL, &u8_raster(vec![0, 9, 8, 4])).unwrap();
        f.cache.set_band(agg, Band::B02, &u16_raster(vec![0, 10, 20, 30])).unwrap();
        f.cache.set_band(raw, Band::SCL, &u8_raster(vec![5, 4, 9, 7])).unwrap();
        f.cache.set_band(raw, Band::B02, &u16_raster(vec![1, 11, 21, 31])).unwrap();

        let report = stage(raw);
        let step = TimeStep {
            tile: &f.tile,
            pass: 2,
            stage: &report,
            stats: &f.stats,
        };
        let h = MostRecentSynthesis::new()
            .synthesize(&f.cache, &step, &params())
            .unwrap();

        assert_eq!(
            f.cache.get_band(agg, Band::B02).unwrap(),
            Some(u16_raster(vec![1, 11, 20, 30]))
        );
        assert_eq!(
            f.cache.get_band(agg, Band::SCL).unwrap(),
            Some(u8_raster(vec![5, 4, 8, 4]))
        );
        assert_eq!(
            f.cache.get_band(agg, Band::MSC).unwrap(),
            Some(u8_raster(vec![2, 2, 0, 0]))
        );
        assert_eq!(h.data_pixels, 4);
        assert_eq!(h.good_pixels, 3);
        assert_eq!(h.medium_proba_clouds, 1);
    }

    #[test]
    fn test_cirrus_removal_rejects_cirrus() {
        let mut p = params();
        assert!(is_valid(p.classifiers.thin_cirrus, &p));
        p.cirrus_removal = true;
        assert!(!is_valid(p.classifiers.thin_cirrus, &p));
        assert!(!is_valid(p.classifiers.unclassified, &p));
    }

    #[test]
    fn test_missing_raw_classification_fails() {
        let f = fixture();
        f.cache
            .set_band(CacheLevel::RawInput, Band::B02, &u16_raster(vec![1, 2, 3, 4]))
            .unwrap();
        let report = stage(CacheLevel::RawInput);
        let step = TimeStep {
            tile: &f.tile,
            pass: 2,
            stage: &report,
            stats: &f.stats,
        };
        let result = MostRecentSynthesis::new().synthesize(&f.cache, &step, &params());
        assert!(matches!(
            result,
            Err(SynthesisError::MissingBand {
                band: Band::SCL,
                ..
            })
        ));
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let f = fixture();
        f.cache
            .set_band(CacheLevel::Aggregate, Band::SCL, &u8_raster(vec![0, 0, 0, 0]))
            .unwrap();
        f.cache
            .set_band(
                CacheLevel::RawInput,
                Band::SCL,
                &Raster::new(1, 2, RasterData::U8(vec![4, 4])).unwrap(),
            )
            .unwrap();
        let report = stage(CacheLevel::RawInput);
        let step = TimeStep {
            tile: &f.tile,
            pass: 2,
            stage: &report,
            stats: &f.stats,
        };
        let result = MostRecentSynthesis::new().synthesize(&f.cache, &step, &params());
        assert!(matches!(result, Err(SynthesisError::ShapeMismatch { .. })));
    }
}
