//! Object detection adapter.
//!
//! `Detector` pairs a `DetectorBackend` (the model) with the inference-time
//! filter settings and the audit-overlay renderer.

mod backend;
mod backends;
mod draw;
mod result;

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::path::Path;

use crate::config::ModelSettings;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use draw::{label_color, Annotator};
pub use result::{class_label, postprocess, BBox, DetectParams, Detection, ALLOWED_CLASSES};

/// Which backend to build from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Tract,
    Stub,
}

impl BackendKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "tract" | "onnx" => Ok(Self::Tract),
            "stub" => Ok(Self::Stub),
            other => Err(anyhow!("unknown detector backend '{}'; expected tract or stub", other)),
        }
    }
}

/// Model variants; each only selects a default weights file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ModelSize {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(anyhow!(
                "unknown model size '{}'; expected small, medium or large",
                other
            )),
        }
    }

    pub fn default_weights_file(&self) -> &'static str {
        match self {
            Self::Small => "yolov9t.onnx",
            Self::Medium => "yolov9m.onnx",
            Self::Large => "yolov5x6u.onnx",
        }
    }
}

pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    params: DetectParams,
    annotator: Annotator,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>, params: DetectParams, annotator: Annotator) -> Self {
        Self {
            backend,
            params,
            annotator,
        }
    }

    /// Build the configured backend, loading weights where the backend needs them.
    pub fn load(settings: &ModelSettings) -> Result<Self> {
        let backend: Box<dyn DetectorBackend> = match settings.backend {
            BackendKind::Stub => {
                log::warn!("stub detector backend selected; frames will report no detections");
                Box::new(StubBackend::new())
            }
            BackendKind::Tract => load_tract(&settings.resolved_weights_path(), settings.input_size)?,
        };
        let annotator = Annotator::new(settings.font_path.as_deref())?;
        Ok(Self::new(backend, settings.detect_params(), annotator))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.backend.warm_up()
    }

    /// Detections on `image`, restricted to the allow-list and thresholds.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let detections = self.backend.detect(image, &self.params)?;
        for d in &detections {
            log::debug!(
                "{} {:.2} at ({:.0}, {:.0})-({:.0}, {:.0})",
                class_label(d.class_id),
                d.confidence,
                d.bbox.xmin,
                d.bbox.ymin,
                d.bbox.xmax,
                d.bbox.ymax
            );
        }
        Ok(detections)
    }

    /// Write an annotated copy of `image` to `output_path`.
    pub fn draw(&self, image: &RgbImage, detections: &[Detection], output_path: &Path) -> Result<()> {
        self.annotator.draw(image, detections, output_path)
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(weights: &Path, input_size: u32) -> Result<Box<dyn DetectorBackend>> {
    log::info!("loading detector weights from {}", weights.display());
    Ok(Box::new(TractBackend::new(weights, input_size)?))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_weights: &Path, _input_size: u32) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "tract detector backend requires the backend-tract feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_applies_configured_thresholds() -> Result<()> {
        let weak_car = Detection {
            bbox: BBox::new(0.0, 0.0, 8.0, 8.0),
            class_id: 2,
            confidence: 0.3,
        };
        let backend = StubBackend::scripted(vec![vec![weak_car]]);
        let params = DetectParams {
            confidence: 0.5,
            ..DetectParams::default()
        };
        let mut detector = Detector::new(Box::new(backend), params, Annotator::boxes_only());

        assert!(detector.detect(&RgbImage::new(16, 16))?.is_empty());
        assert_eq!(detector.backend_name(), "stub");
        Ok(())
    }

    #[test]
    fn names_parse_case_insensitively() -> Result<()> {
        assert_eq!(BackendKind::from_name("Stub")?, BackendKind::Stub);
        assert_eq!(ModelSize::from_name(" LARGE ")?, ModelSize::Large);
        assert_eq!(ModelSize::Small.default_weights_file(), "yolov9t.onnx");
        assert!(BackendKind::from_name("opencv").is_err());
        Ok(())
    }
}
