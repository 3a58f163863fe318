use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use ccbench_abstract::{CampaignFile, SimTime};
use ccbench_experiment::{Campaign, render_report, write_report_file};
use ccbench_simulator::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "TCP congestion-control benchmark over a simulated dumbbell")]
struct Args {
    /// Load a campaign from disk instead of running the default study.
    #[arg(long)]
    campaign: Option<PathBuf>,

    /// Where to write the results table.
    #[arg(long, default_value = "tcp_results.csv")]
    output: PathBuf,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Override the simulator seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the simulation stop time, in seconds.
    #[arg(long)]
    stop_secs: Option<f64>,

    /// Also print the results table to stdout.
    #[arg(long, default_value_t = false)]
    print: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("ccbench starting…");

    let mut campaign = match &args.campaign {
        Some(path) => load_campaign(path)?,
        None => Campaign::default_study(),
    };
    if let Some(seed) = args.seed {
        campaign.sim.seed = seed;
    }
    if let Some(stop) = args.stop_secs {
        campaign.timing.stop = SimTime::from_secs_f64(stop);
    }

    let mut sim = Simulator::new(campaign.sim.clone());
    let outcome = campaign
        .run(&mut sim)
        .with_context(|| format!("Campaign '{}' is misconfigured", campaign.name))?;

    let experiments = &outcome.attribution.experiments;
    write_report_file(&args.output, experiments)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;
    if args.print {
        print!("{}", render_report(experiments)?);
    }

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &sim.export_report())?;
    }

    info!("Simulation completed. Results written to {}", args.output.display());
    Ok(())
}

fn load_campaign(path: &Path) -> Result<Campaign> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read campaign file {}", path.display()))?;
    let file: CampaignFile = toml::from_str(&content).context("Failed to parse campaign file")?;
    let campaign = Campaign::from_file(file)
        .with_context(|| format!("Invalid campaign file {}", path.display()))?;
    Ok(campaign)
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
