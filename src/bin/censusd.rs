//! censusd - traffic camera census loop
//!
//! 1. Resolves configuration (file, environment, command line)
//! 2. Loads the region mask and the detector (both fatal when missing)
//! 3. Resumes from the newest frame already on disk
//! 4. Polls the camera, skipping duplicate frames, and rewrites the result
//!    store after every processed frame
//! 5. Stops after the requested number of loops or on Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;

use traffic_census::{
    last_retained_frame, Census, CensusConfig, Detector, HttpSource, LocalClock, LoopSettings,
    Mask, ResultStore, RunPaths, Shutdown,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Poll a traffic camera and count road users per category"
)]
struct Args {
    /// Number of fetch iterations. Non-numeric values fall back to the
    /// defaults (50 loops, 60 s wait).
    loops: Option<String>,

    /// Seconds to wait between two fetches.
    #[arg(long, env = "CENSUS_WAIT_SECS")]
    wait: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = CensusConfig::load()?;
    let url = cfg.require_source_url()?;
    let settings = LoopSettings::from_cli(args.loops.as_deref(), args.wait);

    let mask = Mask::load(&cfg.paths.mask_path)?;
    log::info!(
        "mask {} loaded ({}x{})",
        cfg.paths.mask_path.display(),
        mask.dimensions().0,
        mask.dimensions().1
    );

    let mut detector = Detector::load(&cfg.model)?;
    if let Err(e) = detector.warm_up() {
        log::warn!("detector warm-up failed: {:#}", e);
    }
    log::info!(
        "detector backend={} confidence={} iou={}",
        detector.backend_name(),
        detector.params().confidence,
        detector.params().iou
    );

    let last = last_retained_frame(&cfg.paths.images_dir)?;
    match &last {
        Some(path) => log::info!("resuming after {}", path.display()),
        None => log::info!("no previous frame in {}", cfg.paths.images_dir.display()),
    }

    let (tx, shutdown) = Shutdown::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let mut census = Census::new(
        HttpSource::new(url, cfg.source.timeout),
        LocalClock,
        mask,
        detector,
        ResultStore::new(&cfg.paths.results_path),
        RunPaths {
            images_dir: cfg.paths.images_dir.clone(),
            annotated_dir: cfg.paths.annotated_dir.clone(),
        },
        last,
    )?;

    let summary = census.run(settings, &shutdown);
    let stats = census.source().stats();
    log::info!(
        "{}: {} frames fetched, {} failed fetches",
        stats.url,
        stats.frames_fetched,
        stats.failures
    );
    log::info!(
        "results written to {} ({} records)",
        census.store().path().display(),
        census.store().len()
    );
    if summary.interrupted {
        log::info!("census interrupted by user");
    }
    Ok(())
}
