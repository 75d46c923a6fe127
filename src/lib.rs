//! Traffic Census
//!
//! Polls a traffic camera's still-image endpoint, discards frames that are
//! perceptually identical to the previous one, masks out irrelevant regions,
//! runs an object detector and keeps a per-frame count of road users by
//! category in `vehicle_results.json`.
//!
//! # Module Structure
//!
//! - `config`: file + environment configuration, resolved once per process
//! - `frame`: timestamp frame names, resume point after restart
//! - `ingest`: frame sources (HTTP snapshot endpoint)
//! - `phash`: perceptual fingerprints for duplicate detection
//! - `mask`: static region mask
//! - `detect`: detector backends, NMS, audit overlays
//! - `categories`: detector class -> census category counts
//! - `storage`: result store with atomic rewrites
//! - `pipeline`: the acquisition loop
//! - `annotations`: labelled-image import for model work

pub mod annotations;
pub mod categories;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod mask;
pub mod phash;
pub mod pipeline;
pub mod storage;

pub use categories::{remap, CategoryCounts};
pub use config::CensusConfig;
pub use detect::{Annotator, BBox, DetectParams, Detection, Detector, DetectorBackend, StubBackend};
pub use frame::{last_retained_frame, Clock, FrameName, LocalClock};
pub use ingest::{FrameSource, HttpSource};
pub use mask::Mask;
pub use pipeline::{Census, LoopSettings, RunPaths, RunSummary, Shutdown};
pub use storage::{ResultStore, VehicleResult};
