//! End-to-end runs of the orchestrator over synthetic source products.

mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::{histogram, write_product, write_simple_product, BandFile, ScriptedSynthesis};
use tempfile::TempDir;
use tilestack::band::{Band, Resolution};
use tilestack::cache::{CacheLevel, TileCache};
use tilestack::codec::{PngCodec, RasterCodec};
use tilestack::config::{Thresholds, TileFilter};
use tilestack::metadata::JsonMetadataRepository;
use tilestack::orchestrator::RunStage;
use tilestack::progress::{TimeEstimates, ESTIMATION_FILE_NAME, PROGRESS_FILE_NAME};
use tilestack::target::TargetProduct;
use tilestack::{EngineConfig, Orchestrator, RunOutcome};

const P1: &str = "20170608T100431";
const P2: &str = "20170618T100431";
const P3: &str = "20170628T100431";

fn config(dir: &TempDir, thresholds: Thresholds) -> EngineConfig {
    EngineConfig::new(dir.path().join("source"), Resolution::R60)
        .with_log_dir(dir.path().join("log"))
        .with_thresholds(thresholds)
}

fn thresholds(max_cloud: f64, max_invalid: f64) -> Thresholds {
    Thresholds {
        max_cloud_probability: max_cloud,
        max_invalid_pixels_percentage: max_invalid,
        ..Default::default()
    }
}

fn three_products(dir: &TempDir) {
    let source = dir.path().join("source");
    write_simple_product(&source, P1, "A010441", vec![1, 2, 3, 4], vec![4, 4, 9, 7]);
    write_simple_product(&source, P2, "A010442", vec![5, 6, 7, 8], vec![4, 4, 4, 4]);
    write_simple_product(&source, P3, "A010443", vec![9, 9, 9, 9], vec![4, 4, 4, 4]);
}

fn cache_of(config: &EngineConfig) -> TileCache {
    let target = TargetProduct::locate(&config.target_dir).unwrap().unwrap();
    let tile = target.aggregate_tiles().unwrap().remove(0);
    TileCache::open(tile.cache_dir(Resolution::R60), Resolution::R60, Arc::new(PngCodec::new()))
        .unwrap()
}

#[test]
fn test_run_stops_when_cloud_cover_is_reached() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(10.0, 50.0));
    let synthesis = ScriptedSynthesis::new(vec![histogram(10, 40, 0, 0), histogram(5, 5, 3, 2)]);

    let outcome = Orchestrator::new(config.clone())
        .with_synthesis(Box::new(synthesis.clone()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.products_considered, 3);
    assert_eq!(report.products_processed, 2);
    assert_eq!(report.tiles_processed, 2);
    assert!(report.target_created);
    assert!(report.termination.as_deref().unwrap().contains("cloud cover"));

    let ledger = Orchestrator::new(config.clone()).ledger();
    assert_eq!(
        ledger.entries().unwrap(),
        vec!["T32TQM_A010441_60".to_string(), "T32TQM_A010442_60".to_string()]
    );
    assert_eq!(
        synthesis.calls(),
        vec![("T32TQM_A010441".to_string(), 1), ("T32TQM_A010442".to_string(), 2)]
    );

    let target = TargetProduct::locate(&config.target_dir).unwrap().unwrap();
    let row = target.stats().unwrap().row("T32TQM", Resolution::R60).unwrap().unwrap();
    assert_eq!(row.passes, 2);
    assert_eq!(row.counters.unclassified, 5);

    // The third product was never staged.
    let raw = cache_of(&config)
        .get_band(CacheLevel::RawInput, Band::B02)
        .unwrap()
        .unwrap();
    assert_eq!(raw.as_u16().unwrap(), &[5, 6, 7, 8]);
}

#[test]
fn test_invalid_pixels_terminate_after_first_product() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(10.0, 50.0));
    let synthesis = ScriptedSynthesis::new(vec![histogram(60, 30, 20, 20)]);

    let outcome = Orchestrator::new(config)
        .with_synthesis(Box::new(synthesis.clone()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.tiles_processed, 1);
    assert!(report.termination.as_deref().unwrap().contains("invalid"));
    assert_eq!(synthesis.calls().len(), 1);
}

#[test]
fn test_resume_appends_to_ledger() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(10.0, 50.0));

    Orchestrator::new(config.clone())
        .with_synthesis(Box::new(ScriptedSynthesis::new(vec![
            histogram(10, 40, 0, 0),
            histogram(5, 5, 3, 2),
        ])))
        .run(None)
        .unwrap();
    let before = Orchestrator::new(config.clone()).ledger().entries().unwrap();

    // Empty histograms have no data pixels and never terminate.
    let resumed = ScriptedSynthesis::default();
    let outcome = Orchestrator::new(config.clone())
        .with_synthesis(Box::new(resumed.clone()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert!(!report.target_created);
    assert_eq!(report.tiles_processed, 1);
    assert_eq!(report.tiles_skipped_completed, 2);
    assert_eq!(resumed.calls(), vec![("T32TQM_A010443".to_string(), 3)]);

    let after = Orchestrator::new(config).ledger().entries().unwrap();
    assert_eq!(&after[..before.len()], before.as_slice());
    assert_eq!(after.last().map(String::as_str), Some("T32TQM_A010443_60"));
}

#[test]
fn test_second_run_has_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(0.0, 100.0));

    let first = Orchestrator::new(config.clone())
        .with_synthesis(Box::new(ScriptedSynthesis::new(vec![histogram(1, 1, 0, 0); 3])))
        .run(None)
        .unwrap();
    assert_eq!(first.report().unwrap().tiles_processed, 3);

    let target = TargetProduct::locate(&config.target_dir).unwrap().unwrap();
    let rows_before = target.stats().unwrap().rows().unwrap();

    let second = ScriptedSynthesis::default();
    let outcome = Orchestrator::new(config)
        .with_synthesis(Box::new(second.clone()))
        .run(None)
        .unwrap();

    assert_eq!(outcome, RunOutcome::NothingToDo);
    assert!(second.calls().is_empty());
    assert_eq!(target.stats().unwrap().rows().unwrap(), rows_before);
}

#[test]
fn test_clean_run_starts_over() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(0.0, 100.0));

    Orchestrator::new(config.clone())
        .with_synthesis(Box::new(ScriptedSynthesis::default()))
        .run(None)
        .unwrap();

    let rerun = ScriptedSynthesis::default();
    let outcome = Orchestrator::new(config.clone().with_clean(true))
        .with_synthesis(Box::new(rerun.clone()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert!(report.target_created);
    assert_eq!(report.tiles_processed, 3);
    assert_eq!(rerun.calls()[0].1, 1);
    assert_eq!(Orchestrator::new(config).ledger().entries().unwrap().len(), 3);
}

#[test]
fn test_inconsistent_tile_is_skipped() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source");
    write_simple_product(&source, P1, "A010441", vec![1, 2], vec![4, 4]);
    // No classification map.
    write_product(
        &source,
        P2,
        "A010442",
        &[BandFile::u16(Band::B02, Resolution::R60, 1, 2, vec![3, 4])],
    );
    let config = config(&dir, thresholds(0.0, 100.0));

    let outcome = Orchestrator::new(config.clone())
        .with_synthesis(Box::new(ScriptedSynthesis::default()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.tiles_processed, 1);
    assert_eq!(report.tiles_skipped_inconsistent, 1);
    assert_eq!(
        Orchestrator::new(config).ledger().entries().unwrap(),
        vec!["T32TQM_A010441_60".to_string()]
    );
}

#[test]
fn test_most_recent_composite_is_exported() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source");
    write_product(
        &source,
        P1,
        "A010441",
        &[
            BandFile::u16(Band::B02, Resolution::R60, 2, 3, vec![100, 101, 102, 103, 104, 105])
                .with_georef(b"GEO-P1"),
            BandFile::u8(Band::SCL, Resolution::R60, 2, 3, vec![4, 4, 9, 9, 0, 7]),
        ],
    );
    write_product(
        &source,
        P2,
        "A010442",
        &[
            BandFile::u16(Band::B02, Resolution::R60, 2, 3, vec![200, 201, 202, 203, 204, 205])
                .with_georef(b"GEO-P2"),
            BandFile::u8(Band::SCL, Resolution::R60, 2, 3, vec![4, 9, 4, 8, 5, 7]),
        ],
    );
    let config = config(&dir, Thresholds::default());

    let outcome = Orchestrator::new(config.clone()).run(None).unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.tiles_processed, 2);
    assert_eq!(report.termination, None);
    assert_eq!(report.bands_exported, 3);

    let codec = PngCodec::new();
    let target = TargetProduct::locate(&config.target_dir).unwrap().unwrap();
    let tile = target.aggregate_tiles().unwrap().remove(0);

    let b02_path = tile.export_path(Band::B02, Resolution::R60, codec.extension());
    let b02 = codec.decode(&b02_path).unwrap();
    assert_eq!(
        b02.raster.as_u16().unwrap(),
        &[200, 101, 202, 103, 204, 105]
    );
    assert_eq!(b02.georef.unwrap().as_bytes(), b"GEO-P1");

    let msc_path = tile.export_path(Band::MSC, Resolution::R60, codec.extension());
    assert!(msc_path.starts_with(tile.qi_data_dir()));
    let msc = codec.decode(&msc_path).unwrap();
    assert_eq!(msc.raster.as_u8().unwrap(), &[2, 1, 2, 1, 2, 1]);

    let metadata = JsonMetadataRepository::in_product(target.path());
    let quality = metadata.classification_qi(Resolution::R60).unwrap().unwrap();
    assert_eq!(quality.total_pixels, 6);
    assert_eq!(metadata.granules(Resolution::R60).unwrap(), vec![tile.name().to_string()]);
    assert_eq!(metadata.provenance().unwrap().len(), 2);

    assert!(dir.path().join("log").join(PROGRESS_FILE_NAME).is_file());
    assert!(dir.path().join("log").join(ESTIMATION_FILE_NAME).is_file());
    assert!(target.path().join("L3_REPORT_R60m.json").is_file());
}

#[test]
fn test_progress_never_decreases() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(0.0, 100.0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    Orchestrator::new(config)
        .with_synthesis(Box::new(ScriptedSynthesis::default()))
        .run(Some(Box::new(move |stage, percentage, _| {
            sink.lock().unwrap().push((stage, percentage));
        })))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().map(|s| s.0), Some(RunStage::Scanning));
    assert_eq!(seen.last().copied(), Some((RunStage::Complete, 100.0)));
    assert_eq!(seen.iter().filter(|s| s.0 == RunStage::Aggregating).count(), 3);
    for pair in seen.windows(2) {
        assert!(pair[1].1 >= pair[0].1, "progress went backwards: {:?}", pair);
    }
    assert!(seen.iter().all(|s| (0.0..=100.0).contains(&s.1)));
    drop(seen);

    let on_disk = fs::read_to_string(dir.path().join("log").join(PROGRESS_FILE_NAME)).unwrap();
    assert!(on_disk.trim().parse::<f64>().is_ok());
}

#[test]
fn test_tile_filter_selects_listed_granules() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(0.0, 100.0)).with_tile_filter(TileFilter::Only(vec![
        "T99ZZZ".to_string(),
        "A010442".to_string(),
    ]));
    let synthesis = ScriptedSynthesis::default();

    let outcome = Orchestrator::new(config.clone())
        .with_synthesis(Box::new(synthesis.clone()))
        .run(None)
        .unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.tiles_filtered, 2);
    assert_eq!(report.tiles_processed, 1);
    assert_eq!(synthesis.calls(), vec![("T32TQM_A010442".to_string(), 1)]);
    assert_eq!(
        Orchestrator::new(config).ledger().entries().unwrap(),
        vec!["T32TQM_A010442_60".to_string()]
    );
}

#[test]
fn test_duration_baseline_blends_after_every_tile() {
    let dir = TempDir::new().unwrap();
    three_products(&dir);
    let config = config(&dir, thresholds(0.0, 100.0));

    let outcome = Orchestrator::new(config)
        .with_synthesis(Box::new(ScriptedSynthesis::default()))
        .run(None)
        .unwrap();
    assert_eq!(outcome.report().unwrap().tiles_processed, 3);

    // 150 -> 75 -> 37.5 -> 18.75, plus the measured tile durations.
    let estimates = TimeEstimates::load_or_init(&dir.path().join("log")).unwrap();
    let baseline = estimates.per_tile(Resolution::R60).as_secs_f64();
    assert!(baseline >= 18.75 && baseline < 20.0, "baseline {baseline}");
}
