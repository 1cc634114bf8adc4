use bottling_plant::{Factory, FactoryConfig, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bottling-plant")]
#[command(about = "Simulates juice bottling plants running side by side")]
#[command(version)]
struct Args {
    /// JSON configuration file; command line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of plants
    #[arg(short, long)]
    plants: Option<usize>,

    /// Workers per plant
    #[arg(short, long)]
    workers: Option<usize>,

    /// How long the plants produce, in seconds
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Oranges needed to fill one bottle
    #[arg(long)]
    oranges_per_bottle: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> Result<FactoryConfig> {
        let mut config = match &self.config {
            Some(path) => FactoryConfig::from_json_file(path)?,
            None => FactoryConfig::default(),
        };

        if let Some(plants) = self.plants {
            config.plants = plants;
        }
        if let Some(workers) = self.workers {
            config.plant.workers = workers;
        }
        if let Some(secs) = self.duration_secs {
            config = config.with_run_duration(Duration::from_secs(secs));
        }
        if let Some(ratio) = self.oranges_per_bottle {
            config.plant.oranges_per_bottle = ratio;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(args: Args) -> Result<()> {
    let json = args.json;
    let report = Factory::new(args.into_config()?)?.run()?;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(encoded) => println!("{}", encoded),
            Err(e) => log::error!("Failed to encode report: {}", e),
        }
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
