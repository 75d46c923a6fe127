#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{postprocess, BBox, DetectParams, Detection};

/// Tract-based backend for YOLO-family ONNX models.
///
/// Expects a single `[1, 3, S, S]` float input and a `[1, 4 + C, N]` output
/// (box centre, size, then one score per class). Frames are stretched to the
/// square model input and boxes are scaled back to frame coordinates.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load ONNX weights from disk and prepare them for inference.
    pub fn new<P: AsRef<Path>>(weights_path: P, input_size: u32) -> Result<Self> {
        let weights_path = weights_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(weights_path)
            .with_context(|| format!("failed to load ONNX model from {}", weights_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(image, side, side, FilterType::Triangle);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        width: u32,
        height: u32,
        params: &DetectParams,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not a [1, 4 + C, N] tensor")?;

        // Some exports emit [1, N, 4 + C]; the attribute axis is the short one.
        let (rows, cols) = (view.shape()[1], view.shape()[2]);
        let transposed = rows > cols;
        let (attributes, proposals) = if transposed { (cols, rows) } else { (rows, cols) };
        if attributes <= 4 {
            return Err(anyhow!("model output has {} attributes per box", attributes));
        }
        let value = |attr: usize, i: usize| {
            if transposed {
                view[[0, i, attr]]
            } else {
                view[[0, attr, i]]
            }
        };

        let num_classes = (attributes - 4) as u32;
        let scale_x = width as f32 / self.input_size as f32;
        let scale_y = height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..proposals {
            let best = params
                .allowed_classes
                .iter()
                .filter(|class| **class < num_classes)
                .map(|class| (*class, value(4 + *class as usize, i)))
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let Some((class_id, score)) = best else {
                continue;
            };
            if score < params.confidence {
                continue;
            }
            let (cx, cy, w, h) = (value(0, i), value(1, i), value(2, i), value(3, i));
            let bbox = BBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
            )
            .clamp_to(width, height);
            candidates.push(Detection {
                bbox,
                class_id,
                confidence: score,
            });
        }
        Ok(postprocess(candidates, params))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, image: &RgbImage, params: &DetectParams) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot run detection on an empty image"));
        }
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, width, height, params)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        self.detect(&RgbImage::new(side, side), &DetectParams::default())
            .map(|_| ())
    }
}
