//! Membership Projection CLI
//!
//! Command-line interface for running the regional membership projection

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use membership_projection::inputs::loader::DEFAULT_DATA_PATH;
use membership_projection::{
    AgeBucket, CohortStore, CsvDirStore, ProjectionConfig, ProjectionRunner, RegionStatus,
    NATIONAL_REGION_CODE,
};

#[derive(Debug, Parser)]
#[command(name = "membership_projection", version, about = "Project membership by region and age bucket")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Project every region and write one CSV per region and year
    Run {
        /// Directory holding population.csv, change_rates.csv, survival_rates.csv and membership.json
        #[arg(long, default_value = DEFAULT_DATA_PATH)]
        data_dir: PathBuf,

        /// Directory the projected sets are written to
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// JSON run configuration (base year, target years)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Project regions one at a time instead of in parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Print one stored region/year set
    Show {
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        #[arg(long)]
        region: String,

        #[arg(long)]
        year: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Run {
            data_dir,
            output_dir,
            config,
            sequential,
        } => run(data_dir, output_dir, config, sequential),
        Command::Show {
            output_dir,
            region,
            year,
        } => show(output_dir, &region, year),
    }
}

fn run(
    data_dir: PathBuf,
    output_dir: PathBuf,
    config_path: Option<PathBuf>,
    sequential: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ProjectionConfig::from_json_path(&path)?,
        None => ProjectionConfig::default(),
    };
    if sequential {
        config.parallel = false;
    }

    println!("Membership Projection v{}", env!("CARGO_PKG_VERSION"));
    println!("=============================\n");

    let runner = ProjectionRunner::from_dir(&data_dir, config)
        .with_context(|| format!("loading inputs from {}", data_dir.display()))?;
    let store = CsvDirStore::create(&output_dir)?;

    let report = runner.run(&store);

    // National aggregate alongside the regional sets
    for year in runner.config().all_years() {
        store.remove(NATIONAL_REGION_CODE, year)?;
    }
    for set in report.national_totals(&store)? {
        store.write(&set)?;
    }

    let report_path = output_dir.join("run_report.json");
    let file = File::create(&report_path)
        .with_context(|| format!("creating {}", report_path.display()))?;
    serde_json::to_writer_pretty(file, &report)?;

    println!("Membership reference: {}", report.membership_version);
    println!("{:<8} {:<12} {:>6} {:>9}  Detail", "Region", "Status", "Years", "Defaults");
    println!("{}", "-".repeat(60));
    for outcome in &report.regions {
        let (status, detail) = match &outcome.status {
            RegionStatus::Completed => ("completed", String::new()),
            RegionStatus::Unsupported { reason } => ("unsupported", reason.clone()),
            RegionStatus::Failed { error } => ("failed", error.clone()),
        };
        println!(
            "{:<8} {:<12} {:>6} {:>9}  {}",
            outcome.region_code,
            status,
            outcome.years_written.len(),
            outcome.defaulted_change_rates,
            detail
        );
    }

    println!(
        "\n{} completed, {} unsupported, {} failed",
        report.completed().count(),
        report.unsupported().count(),
        report.failed().count()
    );
    println!("Output written to: {}", output_dir.display());

    Ok(())
}

fn show(output_dir: PathBuf, region: &str, year: u32) -> Result<()> {
    let store = CsvDirStore::open(&output_dir)
        .with_context(|| format!("opening {}", output_dir.display()))?;
    let Some(set) = store.read(region, year)? else {
        bail!("no projection stored for region {} in {}", region, year);
    };

    println!("Region {} - {}", set.region_code, set.year);
    println!("{:>7} {:>12}", "Age", "Members(k)");
    for bucket in AgeBucket::ALL {
        println!("{:>7} {:>12.1}", bucket.label(), set.get(bucket));
    }
    println!("{:>7} {:>12.1}", "Total", set.total());

    Ok(())
}
