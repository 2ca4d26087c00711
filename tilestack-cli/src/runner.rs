//! Runs the engine once per requested resolution.

use std::env;
use std::path::{Path, PathBuf};

use console::style;
use tilestack::config::default_config_path;
use tilestack::logging::{init_logging, LoggingGuard};
use tilestack::{EngineConfig, Orchestrator, Resolution, RunOutcome};
use tracing::{info, warn};

use crate::error::CliError;
use crate::progress::RunProgress;

/// Parsed command-line options.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub directory: PathBuf,
    pub resolution: Option<Resolution>,
    pub clean: bool,
    pub config: Option<PathBuf>,
}

/// Resolve the source directory against the working directory.
///
/// # Errors
///
/// Fails if the directory does not exist.
pub fn resolve_directory(directory: &Path) -> Result<PathBuf, CliError> {
    let absolute = if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|e| CliError::Config(format!("cannot determine working directory: {}", e)))?
            .join(directory)
    };
    if !absolute.is_dir() {
        return Err(CliError::Config(format!(
            "directory does not exist: {}",
            absolute.display()
        )));
    }
    Ok(absolute)
}

/// Resolutions to process, coarse to fine when none was requested.
pub fn resolutions(requested: Option<Resolution>) -> Vec<Resolution> {
    match requested {
        Some(resolution) => vec![resolution],
        None => Resolution::COARSE_TO_FINE.to_vec(),
    }
}

/// Load the configuration file, or defaults when none exists.
///
/// An explicitly given file must exist.
pub fn load_config(
    explicit: Option<&Path>,
    source_dir: &Path,
    resolution: Resolution,
) -> Result<EngineConfig, CliError> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(CliError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )))
        }
        Some(path) => path.to_path_buf(),
        None => default_config_path(),
    };
    if path.is_file() {
        Ok(EngineConfig::from_ini_file(&path, source_dir, resolution)?)
    } else {
        Ok(EngineConfig::new(source_dir, resolution))
    }
}

/// Run every requested resolution.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let source_dir = resolve_directory(&args.directory)?;
    let plan = resolutions(args.resolution);
    let first = plan.first().copied().unwrap_or(Resolution::R60);
    let base = load_config(args.config.as_deref(), &source_dir, first)?;

    let guard: LoggingGuard = init_logging(&base.log_dir, &base.log_level)?;
    info!(
        version = tilestack::VERSION,
        source = %source_dir.display(),
        target = %base.target_dir.display(),
        log_file = %guard.log_file().display(),
        "Starting"
    );

    for (index, resolution) in plan.into_iter().enumerate() {
        let config = base
            .clone()
            .with_resolution(resolution)
            .with_clean(args.clean && index == 0);
        run_resolution(config)?;
    }

    println!("{}", style("Application terminated successfully.").green());
    Ok(())
}

fn run_resolution(config: EngineConfig) -> Result<(), CliError> {
    let meters = config.resolution.meters();
    println!("{} {} m", style("Processing resolution").bold(), meters);

    let progress = RunProgress::new(meters)?;
    let result = Orchestrator::new(config).run(Some(progress.callback()));
    progress.finish();

    match result? {
        RunOutcome::NothingToDo => {
            println!("All tiles already processed.");
        }
        RunOutcome::Completed(report) => {
            if let Some(reason) = &report.termination {
                warn!(resolution = meters, %reason, "Run ended early");
            }
            println!(
                "  {} tiles aggregated from {} products, {} bands exported ({:.1}s)",
                report.tiles_processed,
                report.products_processed,
                report.bands_exported,
                report.elapsed_secs
            );
        }
    }
    Ok(())
}
