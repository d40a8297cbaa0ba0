//! Command-line parsing for the school registry builder.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline and the coordinate math.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::DatumMode;
use crate::normalize::DEFAULT_OPEN_MARKER;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "atlas", version, about = "School registry builder (GIAS + Ofsted, National Grid -> lat/lon)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load both registries, merge, normalize and emit the enriched school list.
    Build(BuildArgs),
    /// Convert a single National Grid easting/northing to latitude/longitude.
    Convert(ConvertArgs),
}

/// Options for a full build.
#[derive(Debug, Parser, Clone)]
pub struct BuildArgs {
    /// Location registry CSV (path or http(s) URL). Falls back to `ATLAS_PRIMARY_SOURCE`.
    #[arg(long, value_name = "SRC")]
    pub primary: Option<String>,

    /// Outcome registry CSV (path or http(s) URL). Falls back to `ATLAS_SECONDARY_SOURCE`.
    #[arg(long, value_name = "SRC")]
    pub secondary: Option<String>,

    /// Write the run output (metadata + entities) as JSON.
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,

    /// Export the entities as a flat CSV table.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Coordinate datum for grid conversions.
    #[arg(long, value_enum, default_value_t = DatumMode::Airy)]
    pub datum: DatumMode,

    /// Case-sensitive token the status column must contain for a school to count as open.
    #[arg(long, default_value = DEFAULT_OPEN_MARKER)]
    pub open_marker: String,

    /// Suppress the terminal summary.
    #[arg(long)]
    pub quiet: bool,
}

/// Options for a single conversion.
#[derive(Debug, Parser, Clone)]
pub struct ConvertArgs {
    /// Easting in meters.
    #[arg(allow_negative_numbers = true)]
    pub easting: f64,

    /// Northing in meters.
    #[arg(allow_negative_numbers = true)]
    pub northing: f64,

    /// Coordinate datum for the conversion.
    #[arg(long, value_enum, default_value_t = DatumMode::Airy)]
    pub datum: DatumMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_flags() {
        let cli = Cli::parse_from([
            "atlas",
            "build",
            "--primary",
            "gias.csv",
            "--secondary",
            "https://example.org/ofsted.csv",
            "--out",
            "schools.json",
            "--datum",
            "wgs84",
        ]);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.primary.as_deref(), Some("gias.csv"));
        assert_eq!(args.out, Some(PathBuf::from("schools.json")));
        assert_eq!(args.datum, DatumMode::Wgs84);
        assert_eq!(args.open_marker, "Open");
        assert!(!args.quiet);
    }

    #[test]
    fn parses_convert_positionals() {
        let cli = Cli::parse_from(["atlas", "convert", "651409.903", "313177.270"]);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.easting, 651409.903);
        assert_eq!(args.northing, 313177.270);
        assert_eq!(args.datum, DatumMode::Airy);
    }
}
