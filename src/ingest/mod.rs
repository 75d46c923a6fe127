//! Frame acquisition.
//!
//! A `FrameSource` pulls one still image per call and stores it at the path
//! chosen by the caller. Sources report failure as `false` and never return
//! an error: a missed frame is an ordinary event for a polling camera feed.
//!
//! Sources MUST NOT:
//! - Leave a partial file at the destination when the fetch fails
//! - Retry internally (the acquisition loop owns pacing)

pub mod http;

use std::path::Path;

pub use http::{download_image, HttpSource};

/// One-shot image source.
pub trait FrameSource {
    /// Short description for logs (endpoint URL, fixture name).
    fn describe(&self) -> String;

    /// Fetch the current image into `destination`.
    ///
    /// Returns `true` only when the image was written in full.
    fn fetch(&mut self, destination: &Path) -> bool;
}
