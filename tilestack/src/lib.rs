//! Tilestack - incremental multi-temporal tile aggregation
//!
//! This library folds a time-ordered series of Level-2A acquisitions of the
//! same ground footprints into a single cloud-minimised Level-3 composite.
//! Runs are long and unattended, so every piece of state that matters for a
//! resume is persisted as soon as a tile completes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   discover    ┌──────────────┐
//! │ Orchestrator │──────────────►│   product    │  source products, granules
//! └──────┬───────┘               └──────────────┘
//!        │ stage / export        ┌──────────────┐   decode / encode
//!        ├──────────────────────►│  TileCache   │──────────────────► RasterCodec
//!        │ synthesize            └──────────────┘
//!        ├──────────────────────► Synthesis (external)
//!        │ commit                ┌──────────────┐
//!        ├──────────────────────►│    Ledger    │  completed (tile, resolution)
//!        │                       ├──────────────┤
//!        ├──────────────────────►│  StatsStore  │──► TerminationOracle
//!        │                       ├──────────────┤
//!        └──────────────────────►│   progress   │  percent + duration baselines
//!                                └──────────────┘
//! ```
//!
//! Everything runs on one thread. One tile is staged, synthesised and
//! committed before the next one starts, and no file handle outlives the
//! operation that opened it.

pub mod band;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod product;
pub mod progress;
pub mod raster;
pub mod stats;
pub mod synthesis;
pub mod target;

pub use band::{Band, Resolution};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use orchestrator::{Orchestrator, RunOutcome};

/// Version string recorded in provenance entries and run reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
