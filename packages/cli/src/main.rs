#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch entry point for the coverage map toolchain.
//!
//! Fetches target features and the reference boundary for the selected
//! study area, clips targets to the boundary, writes both snapshots, then
//! reloads them and prints the coverage report.
//!
//! Takes no flags. The study area comes from `COVERAGE_MAP_AREA` and the
//! log filter from `RUST_LOG`. Exits non-zero on any unrecovered error.

mod pipeline;
mod report;

use std::error::Error as _;
use std::process::ExitCode;

use clap::Parser;
use coverage_map_config::PipelineSettings;

#[derive(Parser)]
#[command(
    name = "coverage_map",
    version,
    about = "Measure how much of a region is covered by an OpenStreetMap feature class"
)]
struct Cli {}

#[tokio::main]
async fn main() -> ExitCode {
    let multi = coverage_map_cli_utils::init_logger();
    let _cli = Cli::parse();

    let settings = PipelineSettings::from_env();

    match pipeline::run(&multi, &settings).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
