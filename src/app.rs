//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs the build pipeline or a single conversion
//! - prints the summary and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{BuildArgs, Command, ConvertArgs};
use crate::data::{PRIMARY_SOURCE_ENV, SECONDARY_SOURCE_ENV, source_from_env};
use crate::domain::{DatasetSource, PipelineConfig};
use crate::error::AppError;

pub mod pipeline;

const DEFAULT_LOG_FILTER: &str = "school_atlas=info";

/// Entry point for the `atlas` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Build(args) => handle_build(args),
        Command::Convert(args) => handle_convert(args),
    }
}

/// Logs go to stderr so stdout stays clean for the summary.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_build(args: BuildArgs) -> Result<(), AppError> {
    let config = build_config_from_args(&args)?;
    let output = pipeline::run_build(&config)?;

    if !args.quiet {
        println!("{}", crate::report::format_run_summary(&output));
    }

    if let Some(path) = &config.out {
        crate::io::export::write_output_json(path, &output)?;
        info!(path = %path.display(), entities = output.entities.len(), "run output written");
    }
    if let Some(path) = &config.export_csv {
        crate::io::export::write_entities_csv(path, &output.entities)?;
        info!(path = %path.display(), "entity table exported");
    }

    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let coord = crate::geo::transform_with_datum(args.easting, args.northing, args.datum);
    println!(
        "{}",
        crate::report::format_conversion(args.easting, args.northing, args.datum, coord)
    );
    Ok(())
}

/// Build a pipeline config from CLI flags, falling back to the environment
/// (`ATLAS_PRIMARY_SOURCE` / `ATLAS_SECONDARY_SOURCE`) for unset sources.
pub fn build_config_from_args(args: &BuildArgs) -> Result<PipelineConfig, AppError> {
    build_config_with(args, source_from_env)
}

fn build_config_with(
    args: &BuildArgs,
    env: impl Fn(&str) -> Option<DatasetSource>,
) -> Result<PipelineConfig, AppError> {
    let primary = args
        .primary
        .as_deref()
        .map(DatasetSource::parse)
        .or_else(|| env(PRIMARY_SOURCE_ENV))
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("No primary dataset configured. Pass --primary or set {PRIMARY_SOURCE_ENV}."),
            )
        })?;

    let secondary = args
        .secondary
        .as_deref()
        .map(DatasetSource::parse)
        .or_else(|| env(SECONDARY_SOURCE_ENV));

    if args.open_marker.trim().is_empty() {
        return Err(AppError::new(2, "--open-marker must not be empty."));
    }

    Ok(PipelineConfig {
        primary,
        secondary,
        out: args.out.clone(),
        export_csv: args.export_csv.clone(),
        datum: args.datum,
        open_marker: args.open_marker.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use std::path::PathBuf;

    fn build_args(argv: &[&str]) -> BuildArgs {
        let mut full = vec!["atlas", "build"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Build(args) => args,
            Command::Convert(_) => panic!("expected build"),
        }
    }

    #[test]
    fn flags_take_precedence_over_env() {
        let args = build_args(&["--primary", "gias.csv"]);
        let config = build_config_with(&args, |_| Some(DatasetSource::parse("https://env.example/x.csv"))).unwrap();
        assert_eq!(config.primary, DatasetSource::File(PathBuf::from("gias.csv")));
        assert_eq!(
            config.secondary,
            Some(DatasetSource::Url("https://env.example/x.csv".to_string()))
        );
    }

    #[test]
    fn env_fills_missing_sources() {
        let args = build_args(&[]);
        let config = build_config_with(&args, |var| {
            (var == PRIMARY_SOURCE_ENV).then(|| DatasetSource::parse("/data/gias.csv"))
        })
        .unwrap();
        assert_eq!(config.primary, DatasetSource::File(PathBuf::from("/data/gias.csv")));
        assert_eq!(config.secondary, None);
    }

    #[test]
    fn missing_primary_is_a_config_error() {
        let args = build_args(&["--secondary", "ofsted.csv"]);
        let err = build_config_with(&args, |_| None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("--primary"));
    }

    #[test]
    fn blank_open_marker_is_rejected() {
        let args = build_args(&["--primary", "gias.csv", "--open-marker", " "]);
        let err = build_config_with(&args, |_| None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
