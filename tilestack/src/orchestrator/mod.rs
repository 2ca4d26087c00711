//! Run orchestration.
//!
//! One run aggregates one resolution:
//!
//! 1. Scan the source directory and plan the eligible tiles, skipping
//!    completed, filtered and structurally incomplete ones
//! 2. Reattach to the target product or create it from the first eligible
//!    source product
//! 3. For each product in time order, stage, synthesise and commit each of
//!    its tiles, then ask the termination oracle whether to go on
//! 4. Export every cached composite, write the quality metadata and the run
//!    report
//!
//! A tile is committed by appending it to the ledger after its statistics
//! and metadata are written, so an interrupted run resumes at the first
//! uncommitted tile.

mod engine;
mod report;

pub use engine::Orchestrator;
pub use report::RunReport;

/// Progress callback for engine runs.
///
/// # Arguments
///
/// * `stage` - Current run stage
/// * `percentage` - Reported completion, 0.0 - 100.0
/// * `message` - Human-readable message
pub type ProgressCallback = Box<dyn Fn(RunStage, f64, &str) + Send + Sync>;

/// Stages of a run, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Discovering and planning source tiles.
    Scanning,
    /// Staging, synthesising and committing tiles.
    Aggregating,
    /// Exporting composites and writing metadata.
    Finalizing,
    /// Run finished.
    Complete,
}

impl RunStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scanning => "Scanning",
            Self::Aggregating => "Aggregating",
            Self::Finalizing => "Finalizing",
            Self::Complete => "Complete",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No eligible tile was found; nothing was written.
    NothingToDo,
    /// At least one tile was aggregated and the product finalised.
    Completed(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::NothingToDo => None,
            RunOutcome::Completed(report) => Some(report),
        }
    }
}
