use anyhow::Result;
use image::RgbImage;

use crate::detect::result::{DetectParams, Detection};

/// Object-detection model behind the census.
///
/// Implementations treat the image as read-only and return detections in the
/// image's own pixel coordinates, already restricted by `params` (class
/// allow-list, confidence floor, overlap suppression).
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB image.
    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
