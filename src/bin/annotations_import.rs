//! annotations_import - download the images referenced by a labelling export

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_census::annotations::{load_export, AnnotationImporter, ImageOutcome};
use traffic_census::CensusConfig;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON export of the labelling project.
    export: PathBuf,
    /// Destination directory (defaults to paths.labels_dir).
    #[arg(long)]
    labels_dir: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        CensusConfig::load()?
    };
    if cfg.annotations.token.is_none() {
        log::warn!("TOKEN is not set; downloads will be sent without authorization");
    }
    let labels_dir = args.labels_dir.unwrap_or(cfg.paths.labels_dir);
    let importer = AnnotationImporter::new(
        &cfg.annotations.base_url,
        cfg.annotations.token,
        &labels_dir,
        cfg.source.timeout,
    );

    let (images, malformed) = {
        let _stage = ui.stage("Read export");
        load_export(&args.export)?
    };
    log::info!("{} images referenced, {} malformed entries", images.len(), malformed);

    let summary = {
        let mut counter = ui.counter("images", images.len() as u64);
        importer.import_with(&images, |image, outcome| {
            let tag = match outcome {
                ImageOutcome::Downloaded => "downloaded",
                ImageOutcome::AlreadyPresent => "present",
                ImageOutcome::Failed => "FAILED",
            };
            counter.tick(&format!("{} {}", image.file_name, tag));
        })?
        .with_malformed(malformed)
    };

    if summary.failed.is_empty() && summary.malformed == 0 {
        println!("All images downloaded successfully ({} total).", summary.total);
    } else {
        println!(
            "Some images could not be downloaded: {}/{}",
            summary.succeeded(),
            summary.total
        );
        if summary.malformed > 0 {
            println!("{} malformed export entries skipped", summary.malformed);
        }
        for name in &summary.failed {
            println!("  {}", name);
        }
    }
    Ok(())
}
