//! Acquisition loop.
//!
//! Per iteration: wait (not before the first), fetch a frame, drop it if it
//! hashes identical to the last retained frame, mask it, detect, count per
//! category, append to the result store and rewrite the store file. Frames
//! are handled strictly one at a time in capture order; duplicate detection
//! relies on that.
//!
//! The loop is the error boundary for every per-frame step. A failure skips
//! the current frame and the loop carries on.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::categories;
use crate::detect::Detector;
use crate::frame::{Clock, FrameName};
use crate::ingest::FrameSource;
use crate::mask::Mask;
use crate::phash;
use crate::storage::{ResultStore, VehicleResult};

pub const DEFAULT_LOOPS: u32 = 50;
pub const DEFAULT_WAIT: Duration = Duration::from_secs(60);

/// Stop request observed during the inter-frame wait.
pub struct Shutdown {
    rx: Receiver<()>,
}

impl Shutdown {
    /// Signal plus the sender that triggers it.
    pub fn channel() -> (Sender<()>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// Signal that never fires.
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Sleep for `wait`, returning early with `true` if a stop was requested.
    pub fn wait(&self, wait: Duration) -> bool {
        match self.rx.recv_timeout(wait) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(wait);
                false
            }
        }
    }
}

/// Loop pacing.
#[derive(Clone, Copy, Debug)]
pub struct LoopSettings {
    pub loops: u32,
    pub wait: Duration,
}

impl LoopSettings {
    /// Settings from the command line. A loop count that is not a number
    /// falls back to the defaults (50 loops, 60 s) with a warning.
    pub fn from_cli(loops: Option<&str>, wait_secs: Option<u64>) -> Self {
        let defaults = Self::default();
        let wait = wait_secs.map(Duration::from_secs).unwrap_or(defaults.wait);
        match loops.map(|raw| raw.trim().parse::<u32>()) {
            None => Self { wait, ..defaults },
            Some(Ok(loops)) => Self { loops, wait },
            Some(Err(_)) => {
                log::warn!(
                    "invalid loop count {:?}; using defaults ({} loops, {}s wait)",
                    loops.unwrap_or_default(),
                    defaults.loops,
                    defaults.wait.as_secs()
                );
                defaults
            }
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            loops: DEFAULT_LOOPS,
            wait: DEFAULT_WAIT,
        }
    }
}

/// Output locations owned by one run.
#[derive(Clone, Debug)]
pub struct RunPaths {
    pub images_dir: PathBuf,
    pub annotated_dir: PathBuf,
}

impl RunPaths {
    pub fn annotated_path(&self, frame: &FrameName) -> PathBuf {
        frame.path_in(&self.annotated_dir)
    }
}

/// Counters reported when the loop ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u32,
    pub fetch_failures: u32,
    pub duplicates: u32,
    pub processed: u32,
    pub skipped: u32,
    pub interrupted: bool,
}

pub struct Census<S: FrameSource, C: Clock> {
    source: S,
    clock: C,
    mask: Mask,
    detector: Detector,
    store: ResultStore,
    paths: RunPaths,
    last: Option<PathBuf>,
}

impl<S: FrameSource, C: Clock> Census<S, C> {
    /// Assemble a run. `last` is the last retained frame of a previous run,
    /// as found by `frame::last_retained_frame`.
    pub fn new(
        source: S,
        clock: C,
        mask: Mask,
        detector: Detector,
        store: ResultStore,
        paths: RunPaths,
        last: Option<PathBuf>,
    ) -> Result<Self> {
        for dir in [&paths.images_dir, &paths.annotated_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self {
            source,
            clock,
            mask,
            detector,
            store,
            paths,
            last,
        })
    }

    pub fn last_retained(&self) -> Option<&Path> {
        self.last.as_deref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn run(&mut self, settings: LoopSettings, shutdown: &Shutdown) -> RunSummary {
        let mut summary = RunSummary::default();
        log::info!(
            "census starting: {} loops, {}s wait, source {}",
            settings.loops,
            settings.wait.as_secs(),
            self.source.describe()
        );

        for i in 0..settings.loops {
            if i > 0 && shutdown.wait(settings.wait) {
                log::info!("stop requested; ending after {} iterations", summary.iterations);
                summary.interrupted = true;
                break;
            }
            summary.iterations += 1;
            self.step(&mut summary);
        }

        log::info!(
            "census finished: iterations={} processed={} duplicates={} fetch_failures={} skipped={} records={}",
            summary.iterations,
            summary.processed,
            summary.duplicates,
            summary.fetch_failures,
            summary.skipped,
            self.store.len()
        );
        summary
    }

    fn step(&mut self, summary: &mut RunSummary) {
        let frame = FrameName::from_datetime(self.clock.now());
        let path = frame.path_in(&self.paths.images_dir);

        // Names have one-second resolution; never overwrite a frame on disk.
        if path.exists() {
            log::warn!("{} already on disk, skipping capture in the same second", frame);
            summary.skipped += 1;
            return;
        }

        if !self.source.fetch(&path) {
            summary.fetch_failures += 1;
            return;
        }

        if let Some(last) = &self.last {
            if phash::are_identical(last, &path) {
                log::info!("{} identical to previous frame, removing", frame);
                remove_frame(&path);
                summary.duplicates += 1;
                return;
            }
        }

        let started = Instant::now();
        let record = match self.process(&frame, &path) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("skipping {}: {:#}", frame, e);
                summary.skipped += 1;
                return;
            }
        };
        log::info!(
            "{} -> {:?} ({} ms)",
            frame,
            record.categories,
            started.elapsed().as_millis()
        );

        if let Err(e) = self.store.append(record) {
            log::error!("{:#}", e);
        }
        summary.processed += 1;
        self.last = Some(path);
    }

    fn process(&mut self, frame: &FrameName, path: &Path) -> Result<VehicleResult> {
        let image: RgbImage = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .into_rgb8();
        let masked = self.mask.apply(&image);
        let detections = self.detector.detect(&masked)?;

        let annotated = self.paths.annotated_path(frame);
        if let Err(e) = self.detector.draw(&image, &detections, &annotated) {
            log::warn!("annotated copy of {} not written: {:#}", frame, e);
        }

        Ok(VehicleResult {
            image: frame.file_name(),
            categories: categories::remap(&detections),
        })
    }
}

fn remove_frame(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
