use anyhow::Result;
use image::RgbImage;
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{postprocess, DetectParams, Detection};

/// Stub backend for tests and dry runs. Replays scripted detection batches,
/// one batch per `detect` call, then reports empty frames.
#[derive(Default)]
pub struct StubBackend {
    script: VecDeque<Vec<Detection>>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that returns `batches` in order.
    pub fn scripted(batches: Vec<Vec<Detection>>) -> Self {
        Self {
            script: batches.into(),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>> {
        self.calls += 1;
        let (width, height) = image.dimensions();
        let batch = self
            .script
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .map(|d| Detection {
                bbox: d.bbox.clamp_to(width, height),
                ..d
            })
            .collect();
        Ok(postprocess(batch, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BBox;

    #[test]
    fn stub_backend_replays_script_then_goes_quiet() -> Result<()> {
        let car = Detection {
            bbox: BBox::new(2.0, 2.0, 30.0, 12.0),
            class_id: 2,
            confidence: 0.9,
        };
        let dog = Detection {
            bbox: BBox::new(0.0, 0.0, 4.0, 4.0),
            class_id: 16,
            confidence: 0.9,
        };
        let mut backend = StubBackend::scripted(vec![vec![car.clone(), dog], vec![]]);
        let image = RgbImage::new(20, 20);
        let params = DetectParams::default();

        let first = backend.detect(&image, &params)?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].class_id, 2);
        assert_eq!(first[0].bbox.xmax, 20.0);

        assert!(backend.detect(&image, &params)?.is_empty());
        assert!(backend.detect(&image, &params)?.is_empty());
        assert_eq!(backend.calls(), 3);
        Ok(())
    }
}
