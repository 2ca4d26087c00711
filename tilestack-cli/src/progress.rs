//! Terminal progress bar fed by the engine's progress callback.

use indicatif::{ProgressBar, ProgressStyle};
use tilestack::orchestrator::{ProgressCallback, RunStage};

use crate::error::CliError;

/// Bar positions per percent.
const SCALE: f64 = 10.0;

const TEMPLATE: &str = "{spinner:.green} {prefix:>4} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}";

/// Progress bar of one resolution run.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    /// Create a bar labelled with the run's resolution in meters.
    pub fn new(meters: u32) -> Result<Self, CliError> {
        let style = ProgressStyle::with_template(TEMPLATE)
            .map_err(|e| CliError::Progress(e.to_string()))?
            .progress_chars("=> ");
        let bar = ProgressBar::new((100.0 * SCALE) as u64);
        bar.set_style(style);
        bar.set_prefix(format!("{}m", meters));
        Ok(Self { bar })
    }

    /// Callback to hand to the orchestrator.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |stage: RunStage, percentage: f64, message: &str| {
            bar.set_position(position(percentage));
            bar.set_message(format!("{}: {}", stage.name(), message));
        })
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn position(percentage: f64) -> u64 {
    (percentage.clamp(0.0, 100.0) * SCALE).round() as u64
}
