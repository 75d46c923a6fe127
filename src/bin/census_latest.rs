//! census_latest - print the most recent census record

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use traffic_census::storage::latest_record;
use traffic_census::CensusConfig;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Result store to read (defaults to paths.results_path).
    #[arg(long)]
    results: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let path = match args.results {
        Some(path) => path,
        None => CensusConfig::load()?.paths.results_path,
    };

    if !path.exists() {
        println!("No results yet: {} not found.", path.display());
        return Ok(());
    }
    match latest_record(&path) {
        Ok(Some(record)) => println!("{}", serde_json::to_string_pretty(&record)?),
        Ok(None) => println!("No image available yet."),
        Err(e) => {
            log::warn!("{:#}", e);
            println!("Results are unavailable (maintenance in progress). Please try again later.");
        }
    }
    Ok(())
}
