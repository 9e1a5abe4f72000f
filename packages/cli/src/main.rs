#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Command-line runner for the tract-level green space tables.
//!
//! `greenspace run` executes every selected `(year, percentile)` pair of a
//! project and prints one summary line per run, `greenspace check`
//! validates a project's inputs without reading pixels, and
//! `greenspace schemas` lists the embedded land-use schemas.

mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use greenspace_models::Percentile;
use greenspace_pipeline::{CheckReport, ProjectConfig, RunOutcome, RunSelection, RunSummary};

use crate::progress::{IndicatifProgress, init_logger};

#[derive(Parser)]
#[command(name = "greenspace", about = "Tract-level green space by land use")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write one CSV table per year and percentile
    Run {
        /// Project file (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Comma-separated list of years to run (e.g., "1990,2015").
        /// If not specified, runs every configured year.
        #[arg(long)]
        years: Option<String>,
        /// Comma-separated list of percentiles (e.g., "70,90").
        /// If not specified, runs the project's percentiles.
        #[arg(long)]
        percentiles: Option<String>,
        /// Directory for the tables, overriding the project's `output_dir`
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Load every input without reading pixels and report what a run would see
    Check {
        /// Project file (TOML)
        #[arg(long)]
        config: PathBuf,
    },
    /// List the embedded land-use schemas
    Schemas,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            years,
            percentiles,
            output_dir,
        } => {
            let mut config = ProjectConfig::load(&config)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let selection = RunSelection {
                years: years.as_deref().map(parse_years).transpose()?,
                percentiles: percentiles.as_deref().map(parse_percentiles).transpose()?,
            };

            let progress = IndicatifProgress::runs_bar(&multi, "Loading project");
            let summaries = greenspace_pipeline::run_all(&config, &selection, progress.as_ref())?;
            print_summaries(&summaries);

            let failed = summaries.iter().filter(|s| !s.is_completed()).count();
            if failed > 0 {
                return Err(format!("{failed} of {} runs failed", summaries.len()).into());
            }
        }
        Commands::Check { config } => {
            let config = ProjectConfig::load(&config)?;
            let report = greenspace_pipeline::check(&config)?;
            print_check(&report);
            if !report.is_ok() {
                return Err("project check found problems".into());
            }
        }
        Commands::Schemas => {
            println!("{:<6} {:<4} {:<12} {:>5}  NAME", "YEAR", "TAG", "ATTRIBUTE", "CODES");
            println!("{}", "-".repeat(60));
            for schema in greenspace_schema::all_schemas() {
                println!(
                    "{:<6} {:<4} {:<12} {:>5}  {}",
                    schema.year,
                    schema.imagery.tag,
                    schema.attribute,
                    schema.codes.len(),
                    schema.name
                );
            }
        }
    }

    Ok(())
}

fn parse_years(list: &str) -> Result<Vec<u16>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("invalid year '{s}'")))
        .collect()
}

fn parse_percentiles(list: &str) -> Result<Vec<Percentile>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("invalid percentile '{s}'")))
        .collect()
}

fn print_summaries(summaries: &[RunSummary]) {
    println!(
        "{:<6} {:<5} {:>10} {:>7} {:>9} {:>11} {:>16} {:>14} {:>10}",
        "YEAR",
        "PCT",
        "THRESHOLD",
        "ROWS",
        "REJECTED",
        "INCOMPLETE",
        "UNCLASSIFIED_M2",
        "UNKNOWN_M2",
        "UNCOVERED"
    );
    println!("{}", "-".repeat(97));
    for summary in summaries {
        match &summary.outcome {
            RunOutcome::Completed(stats) => println!(
                "{:<6} {:<5} {:>10.4} {:>7} {:>9} {:>11} {:>16.1} {:>14.1} {:>10}",
                summary.key.year,
                summary.key.percentile.to_string(),
                stats.threshold,
                stats.rows,
                stats.rejected_tracts,
                stats.incomplete_tracts,
                stats.unclassified_area,
                stats.unknown_code_area,
                stats.uncovered_study_area_pixels
            ),
            RunOutcome::Failed { stage, message } => println!(
                "{:<6} {:<5} FAILED at {stage}: {message}",
                summary.key.year,
                summary.key.percentile.to_string()
            ),
        }
    }
}

fn print_check(report: &CheckReport) {
    println!(
        "Tracts: {} usable, {} rejected; study area: {} polygons",
        report.tracts,
        report.rejected.len(),
        report.study_area_polygons
    );
    for rejected in &report.rejected {
        println!(
            "  rejected feature {} ({}): {}",
            rejected.index,
            rejected.cluster_id.as_deref().unwrap_or("?"),
            rejected.reason
        );
    }

    for year in &report.years {
        println!();
        println!(
            "{} {}",
            year.year,
            year.schema_name.as_deref().unwrap_or("(no schema)")
        );
        println!(
            "  schema codes: {}, catalog scenes: {}, in window: {}, reference found: {}",
            year.schema_codes,
            year.catalog_scenes,
            year.scenes_in_window.len(),
            year.reference_found
        );
        for scene in &year.scenes_in_window {
            println!("    {scene}");
        }
        println!(
            "  land-use polygons: {}, null codes: {}",
            year.land_use_polygons, year.null_codes
        );
        if !year.unknown_codes.is_empty() {
            let codes: Vec<String> = year.unknown_codes.iter().map(ToString::to_string).collect();
            println!("  codes outside the schema: {}", codes.join(", "));
        }
        for error in &year.errors {
            println!("  ERROR: {error}");
        }
    }
}
