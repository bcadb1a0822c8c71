use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scholarsim_core::init_logging;
use scholarsim_io::SqliteSource;
use scholarsim_lib::{AppConfig, SimulationService};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "scholarsim.toml", global = true)]
    config: PathBuf,

    /// Override the run id from the config file
    #[arg(long, global = true)]
    run_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the memory state from the relational source and cache it
    Load,
    /// Advance the cached run and print every row as JSON
    Step {
        #[arg(short, long, default_value_t = 1)]
        ticks: u32,
    },
    /// Load and step in one process; the only useful mode with the memory cache
    Run {
        #[arg(short, long, default_value_t = 1)]
        ticks: u32,
    },
    /// Print the cached lookup of one category
    Lookup { tag: String },
    /// Summarise the cached state
    Inspect,
}

fn load(service: &SimulationService, config: &AppConfig) -> Result<()> {
    let source = SqliteSource::open(&config.source.database, config.source.timeout())
        .with_context(|| format!("opening {}", config.source.database.display()))?;
    let summary = service.load_memory(&source)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn step(service: &SimulationService, ticks: u32) -> Result<()> {
    for _ in 0..ticks {
        let report = service.run_step()?;
        for row in report.rows() {
            println!("{}", serde_json::to_string(&row)?);
        }
        for warning in &report.warnings {
            eprintln!("{}", serde_json::to_string(warning)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(run_id) = args.run_id {
        config.cache.run_id = run_id;
    }
    let service = SimulationService::from_config(&config)?;

    match args.command {
        Command::Load => load(&service, &config)?,
        Command::Step { ticks } => step(&service, ticks)?,
        Command::Run { ticks } => {
            load(&service, &config)?;
            step(&service, ticks)?;
        }
        Command::Lookup { tag } => {
            let lookup = service.build_lookup(&tag)?;
            println!("{}", serde_json::to_string_pretty(&lookup)?);
        }
        Command::Inspect => {
            println!("{}", serde_json::to_string_pretty(&service.inspect()?)?);
        }
    }
    Ok(())
}
