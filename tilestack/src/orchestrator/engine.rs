use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, warn};

use super::{ProgressCallback, RunOutcome, RunReport, RunStage};
use crate::band::Band;
use crate::cache::{CacheLevel, TileCache};
use crate::codec::{PngCodec, RasterCodec};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::metadata::{JsonMetadataRepository, MetadataRepository, ProvenanceEntry};
use crate::product::{check_granule, discover_products, Granule, SourceProduct};
use crate::progress::{ProgressTracker, TimeEstimates};
use crate::raster::{ElementType, Raster, RasterData};
use crate::stats::{QualityIndicators, StatsStore, TerminationOracle};
use crate::synthesis::{self, Synthesis, SynthesisParams, TimeStep};
use crate::target::{AggregateTile, TargetProduct};

/// A source product and its eligible granules.
struct PlannedProduct {
    product: SourceProduct,
    granules: Vec<Granule>,
}

#[derive(Debug, Default)]
struct ScanSummary {
    skipped_completed: usize,
    skipped_inconsistent: usize,
    filtered: usize,
}

/// Everything a tile commit writes to.
struct RunContext<'a> {
    target: &'a TargetProduct,
    stats: &'a StatsStore,
    metadata: &'a dyn MetadataRepository,
    ledger: &'a Ledger,
    synthesis: &'a dyn Synthesis,
    params: &'a SynthesisParams,
}

/// Drives one engine run over the source directory.
///
/// # Example
///
/// ```no_run
/// use tilestack::{EngineConfig, Orchestrator, Resolution, RunOutcome};
///
/// let config = EngineConfig::new("/data/l2a", Resolution::R60);
/// match Orchestrator::new(config).run(None)? {
///     RunOutcome::NothingToDo => println!("All tiles already processed."),
///     RunOutcome::Completed(report) => println!("{} tiles", report.tiles_processed),
/// }
/// # Ok::<(), tilestack::EngineError>(())
/// ```
pub struct Orchestrator {
    config: EngineConfig,
    codec: Arc<dyn RasterCodec>,
    synthesis: Option<Box<dyn Synthesis>>,
}

impl Orchestrator {
    /// Orchestrator with the PNG codec and the synthesis shipped for the
    /// configured algorithm.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            codec: Arc::new(PngCodec::new()),
            synthesis: None,
        }
    }

    /// Use a different band codec.
    pub fn with_codec(mut self, codec: Arc<dyn RasterCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different synthesis implementation.
    pub fn with_synthesis(mut self, synthesis: Box<dyn Synthesis>) -> Self {
        self.synthesis = Some(synthesis);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ledger of the configured source directory.
    pub fn ledger(&self) -> Ledger {
        Ledger::in_directory(&self.config.source_dir)
    }

    /// Run the engine once at the configured resolution.
    ///
    /// # Arguments
    ///
    /// * `on_progress` - Optional progress callback
    ///
    /// # Errors
    ///
    /// Configuration, codec, synthesis and infrastructure failures end the
    /// run. Tiles that are structurally incomplete are skipped instead.
    pub fn run(&self, on_progress: Option<ProgressCallback>) -> Result<RunOutcome> {
        let report_stage = |stage: RunStage, percentage: f64, message: &str| {
            if let Some(ref cb) = on_progress {
                cb(stage, percentage, message);
            }
        };

        let config = &self.config;
        config.validate()?;
        let started = Instant::now();
        let started_at = Local::now();
        let resolution = config.resolution;
        let ledger = self.ledger();

        if config.clean {
            let removed = TargetProduct::clean(&config.target_dir)?;
            let ledger_removed = ledger.remove()?;
            info!(
                products = removed,
                ledger = ledger_removed,
                "Clean run: previous target and ledger removed"
            );
        }

        let shipped;
        let synthesis: &dyn Synthesis = match &self.synthesis {
            Some(custom) => custom.as_ref(),
            None => {
                shipped = synthesis::for_algorithm(config.algorithm)?;
                shipped.as_ref()
            }
        };

        report_stage(RunStage::Scanning, 0.0, "Scanning source products");
        let products = discover_products(
            &config.source_dir,
            &config.time_range.min,
            &config.time_range.max,
        )?;
        let products_considered = products.len();
        let (plan, mut summary) = self.plan(products, &ledger)?;
        let eligible: usize = plan.iter().map(|p| p.granules.len()).sum();
        info!(
            resolution = resolution.meters(),
            products = plan.len(),
            tiles = eligible,
            skipped_completed = summary.skipped_completed,
            skipped_inconsistent = summary.skipped_inconsistent,
            filtered = summary.filtered,
            "Run planned"
        );

        let Some(first) = plan.first() else {
            info!("All tiles already processed");
            report_stage(RunStage::Complete, 100.0, "All tiles already processed");
            return Ok(RunOutcome::NothingToDo);
        };

        let mut estimates = TimeEstimates::load_or_init(&config.log_dir)?;
        let mut tracker =
            ProgressTracker::start(&config.log_dir, estimates.per_tile(resolution), eligible)?;

        let (target, target_created) = TargetProduct::locate_or_materialize(
            &config.target_dir,
            &first.product,
            &config.time_range.min,
        )?;
        let stats = target.stats()?;
        let metadata = JsonMetadataRepository::in_product(target.path());
        let params = SynthesisParams::from_config(config);
        let oracle = TerminationOracle::new(config.thresholds);
        let context = RunContext {
            target: &target,
            stats: &stats,
            metadata: &metadata,
            ledger: &ledger,
            synthesis,
            params: &params,
        };

        let mut tiles_processed = 0usize;
        let mut products_processed = 0usize;
        let mut termination = None;

        for planned in &plan {
            info!(
                product = %planned.product.identifier(),
                tiles = planned.granules.len(),
                "Aggregating product"
            );
            for granule in &planned.granules {
                if ledger.contains(granule.tile(), resolution)? {
                    summary.skipped_completed += 1;
                    continue;
                }
                let step_started = Instant::now();
                self.process_tile(&context, &planned.product, granule)?;
                tiles_processed += 1;
                let measured = step_started.elapsed();

                let baseline = estimates.blend(resolution, measured);
                estimates.save()?;
                debug!(baseline_secs = baseline, "Duration baseline updated");

                let percentage = tracker.record_step(measured)?;
                report_stage(RunStage::Aggregating, percentage, granule.name());
            }
            products_processed += 1;

            if let Some(reason) = oracle.should_terminate(&stats, resolution)? {
                info!(
                    product = %planned.product.identifier(),
                    %reason,
                    "Stopping early, remaining products are not needed"
                );
                termination = Some(reason.to_string());
                break;
            }
        }

        report_stage(
            RunStage::Finalizing,
            tracker.percentage(),
            "Exporting aggregate tiles",
        );
        let bands_exported = self.finalize(&target)?;
        let quality = QualityIndicators::from_histogram(&stats.aggregate(resolution)?);
        metadata.write_classification_qi(resolution, &quality)?;

        let report = RunReport {
            engine_version: crate::VERSION.to_string(),
            resolution: resolution.meters(),
            target_product: target.identifier().to_string(),
            target_created,
            started_at: started_at.to_rfc3339(),
            finished_at: Local::now().to_rfc3339(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            products_considered,
            products_processed,
            tiles_processed,
            tiles_skipped_completed: summary.skipped_completed,
            tiles_skipped_inconsistent: summary.skipped_inconsistent,
            tiles_filtered: summary.filtered,
            termination,
            bands_exported,
            quality,
        };
        let report_path = report.write(target.path())?;
        info!(
            report = %report_path.display(),
            tiles = tiles_processed,
            elapsed_secs = report.elapsed_secs,
            "Run complete"
        );
        report_stage(RunStage::Complete, 100.0, "Run complete");
        Ok(RunOutcome::Completed(report))
    }

    /// Select the eligible granules of each product, in product order.
    fn plan(
        &self,
        products: Vec<SourceProduct>,
        ledger: &Ledger,
    ) -> Result<(Vec<PlannedProduct>, ScanSummary)> {
        let config = &self.config;
        let resolution = config.resolution;
        let extension = self.codec.extension();
        let completed: HashSet<String> = ledger.entries()?.into_iter().collect();
        let mut summary = ScanSummary::default();
        let mut plan = Vec::new();

        for product in products {
            let mut granules = Vec::new();
            for granule in product.granules()? {
                if !config.tile_filter.matches(granule.name()) {
                    debug!(granule = %granule.name(), "Not selected by tile filter");
                    summary.filtered += 1;
                    continue;
                }
                if completed.contains(&granule.tile().ledger_key(resolution)) {
                    debug!(granule = %granule.name(), "Already processed");
                    summary.skipped_completed += 1;
                    continue;
                }
                if let Err(problem) =
                    check_granule(&granule, resolution, config.requires_aerosol(), extension)
                {
                    warn!(granule = %granule.name(), %problem, "Tile skipped");
                    summary.skipped_inconsistent += 1;
                    continue;
                }
                granules.push(granule);
            }
            if !granules.is_empty() {
                plan.push(PlannedProduct { product, granules });
            }
        }
        Ok((plan, summary))
    }

    /// Stage, synthesise and commit one tile.
    fn process_tile(
        &self,
        context: &RunContext<'_>,
        product: &SourceProduct,
        granule: &Granule,
    ) -> Result<()> {
        let resolution = self.config.resolution;
        let aggregate_tile = context.target.aggregate_tile_for(granule)?;
        let cache = TileCache::open(
            aggregate_tile.cache_dir(resolution),
            resolution,
            Arc::clone(&self.codec),
        )?;

        let stage = cache.stage_input_tile(granule)?;
        let footprint = &granule.tile().footprint;
        let pass = context
            .stats
            .row(footprint, resolution)?
            .map_or(1, |row| row.passes + 1);
        let step = TimeStep {
            tile: granule.tile(),
            pass,
            stage: &stage,
            stats: context.stats,
        };
        let histogram = context.synthesis.synthesize(&cache, &step, context.params)?;

        // The ledger is authoritative on resume; a crash after this line
        // leaves the stats row one pass behind.
        context.ledger.append(granule.tile(), resolution)?;
        context.stats.upsert_row(footprint, resolution, &histogram)?;
        context
            .metadata
            .record_granule(aggregate_tile.name(), resolution)?;
        context.metadata.record_provenance(&ProvenanceEntry {
            source_product: product.identifier().to_string(),
            granule: granule.name().to_string(),
            resolution: resolution.meters(),
            pass,
            processed_at: Local::now().to_rfc3339(),
            engine_version: crate::VERSION.to_string(),
        })?;

        info!(
            granule = %granule.name(),
            tile = %aggregate_tile.name(),
            pass,
            seeded = stage.seeded(),
            synthesis = context.synthesis.name(),
            "Tile committed"
        );
        Ok(())
    }

    /// Export every cached composite of the target product.
    ///
    /// Returns the number of band files written.
    fn finalize(&self, target: &TargetProduct) -> Result<usize> {
        let resolution = self.config.resolution;
        let mut exported = 0;
        for tile in target.aggregate_tiles()? {
            if !tile.has_cache(resolution) {
                continue;
            }
            exported += self.export_tile(&tile)?;
        }
        info!(bands = exported, "Aggregate tiles exported");
        Ok(exported)
    }

    fn export_tile(&self, tile: &AggregateTile) -> Result<usize> {
        let resolution = self.config.resolution;
        let extension = self.codec.extension();
        let cache = TileCache::open(tile.cache_dir(resolution), resolution, Arc::clone(&self.codec))?;
        self.ensure_mosaic(&cache)?;

        let present = cache.bands(CacheLevel::Aggregate)?;
        let mut exported = 0;
        for band in resolution.export_bands() {
            if !present.contains(&band) {
                debug!(tile = %tile.name(), band = %band, "Nothing cached, not exported");
                continue;
            }
            // Class maps are labels, smoothing them is meaningless.
            let median = if band.is_quality() {
                0
            } else {
                self.config.median_filter
            };
            let dest = tile.export_path(band, resolution, extension);
            cache.export_band(CacheLevel::Aggregate, band, &dest, median)?;
            exported += 1;
        }
        Ok(exported)
    }

    /// Derive a mosaic map from the classification map when synthesis left
    /// none: every data pixel is attributed to the first pass.
    fn ensure_mosaic(&self, cache: &TileCache) -> Result<()> {
        if cache.get_band(CacheLevel::Aggregate, Band::MSC)?.is_some() {
            return Ok(());
        }
        let Some(scl) = cache.get_band(CacheLevel::Aggregate, Band::SCL)? else {
            return Ok(());
        };
        let (rows, cols) = scl.dims();
        let no_data = self.config.classifiers.no_data;
        let mosaic: Vec<u8> = match scl.to_element_type(ElementType::U8).into_data() {
            RasterData::U8(classes) => classes.into_iter().map(|c| u8::from(c != no_data)).collect(),
            RasterData::U16(classes) => classes
                .into_iter()
                .map(|c| u8::from(c != u16::from(no_data)))
                .collect(),
        };
        let raster = Raster::new(rows, cols, RasterData::U8(mosaic)).map_err(|source| {
            crate::cache::CacheError::Raster {
                band: Band::MSC,
                source,
            }
        })?;
        cache.set_band(CacheLevel::Aggregate, Band::MSC, &raster)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::Resolution;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_empty_source_is_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path(), Resolution::R60)
            .with_log_dir(dir.path().join("log"));

        let outcome = Orchestrator::new(config).run(None).unwrap();
        assert_eq!(outcome, RunOutcome::NothingToDo);
        assert!(!dir.path().join("log/.progress").exists());
    }

    #[test]
    fn test_missing_source_dir_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("missing"), Resolution::R60);
        assert!(matches!(
            Orchestrator::new(config).run(None),
            Err(crate::EngineError::Config(_))
        ));
    }

    #[test]
    fn test_unsupported_algorithm_fails_before_scanning() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path(), Resolution::R60)
            .with_algorithm(crate::config::Algorithm::Average);
        assert!(matches!(
            Orchestrator::new(config).run(None),
            Err(crate::EngineError::Synthesis(_))
        ));
    }

    #[test]
    fn test_progress_callback_reports_completion() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path(), Resolution::R60)
            .with_log_dir(dir.path().join("log"));
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);

        Orchestrator::new(config)
            .run(Some(Box::new(move |stage, _, _| {
                sink.lock().unwrap().push(stage);
            })))
            .unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![RunStage::Scanning, RunStage::Complete]
        );
    }
}
