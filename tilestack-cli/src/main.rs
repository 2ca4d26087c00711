//! Tilestack CLI
//!
//! Aggregates the Level-2A products of a directory into a Level-3
//! composite, one resolution after another.

mod error;
mod progress;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use tilestack::Resolution;

use runner::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "tilestack")]
#[command(version = tilestack::VERSION)]
#[command(about = "Incremental multi-temporal tile aggregation", long_about = None)]
struct Cli {
    /// Directory holding the Level-2A source products
    directory: PathBuf,

    /// Target resolution in meters (10, 20 or 60); all three when omitted
    #[arg(short, long, value_parser = parse_resolution)]
    resolution: Option<Resolution>,

    /// Remove an existing target product and ledger first
    #[arg(long)]
    clean: bool,

    /// Configuration file [default: ~/.tilestack/config.ini]
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_resolution(value: &str) -> Result<Resolution, String> {
    value
        .parse::<u32>()
        .ok()
        .and_then(Resolution::from_meters)
        .ok_or_else(|| format!("unsupported resolution '{}', expected 10, 20 or 60", value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let args = RunArgs {
        directory: cli.directory,
        resolution: cli.resolution,
        clean: cli.clean,
        config: cli.config,
    };

    match runner::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {}",
                style("Fatal error occurred, application will terminate. Reason:").red(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("20"), Ok(Resolution::R20));
        assert!(parse_resolution("30").is_err());
        assert!(parse_resolution("sixty").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["tilestack", "data", "--resolution", "60", "--clean"]).unwrap();
        assert_eq!(cli.directory, PathBuf::from("data"));
        assert_eq!(cli.resolution, Some(Resolution::R60));
        assert!(cli.clean);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_rejects_unknown_resolution() {
        assert!(Cli::try_parse_from(["tilestack", "data", "-r", "15"]).is_err());
    }
}
