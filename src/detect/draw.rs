//! Audit overlays: one rectangle and one `"<category> <confidence>"` caption
//! per detection, drawn on a copy of the frame.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::categories;
use crate::detect::result::{class_label, Detection};

const LABEL_SCALE: f32 = 16.0;
const BOX_THICKNESS: i32 = 2;

/// Fonts probed when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Annotator using `font_path`, or the first system font found.
    ///
    /// A configured font that cannot be read is an error. Without any font,
    /// boxes are drawn without captions.
    pub fn new(font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => Some(load_font(path)?),
            None => SYSTEM_FONTS
                .iter()
                .map(Path::new)
                .filter(|path| path.exists())
                .find_map(|path| load_font(path).ok()),
        };
        if font.is_none() {
            log::warn!("no font available; annotated frames will carry boxes only");
        }
        Ok(Self { font })
    }

    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `detections` over a copy of `image`.
    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        let (width, height) = canvas.dimensions();
        for detection in detections {
            let label = caption_label(detection.class_id);
            let color = label_color(&label);
            let bbox = detection.bbox.clamp_to(width, height);
            let x = bbox.xmin as i32;
            let y = bbox.ymin as i32;
            let w = (bbox.width() as u32).max(1);
            let h = (bbox.height() as u32).max(1);

            for inset in 0..BOX_THICKNESS {
                let iw = w.saturating_sub(2 * inset as u32).max(1);
                let ih = h.saturating_sub(2 * inset as u32).max(1);
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x + inset, y + inset).of_size(iw, ih),
                    color,
                );
            }

            if let Some(font) = &self.font {
                let caption = format!("{} {:.2}", label, detection.confidence);
                let text_y = if y >= LABEL_SCALE as i32 + 2 {
                    y - LABEL_SCALE as i32 - 2
                } else {
                    y + BOX_THICKNESS + 1
                };
                draw_text_mut(
                    &mut canvas,
                    color,
                    x,
                    text_y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &caption,
                );
            }
        }
        canvas
    }

    /// Render and write the annotated copy to `output_path`.
    pub fn draw(&self, image: &RgbImage, detections: &[Detection], output_path: &Path) -> Result<()> {
        self.render(image, detections)
            .save(output_path)
            .with_context(|| format!("failed to write annotated image {}", output_path.display()))
    }
}

/// Census category name where the class is counted, model label otherwise.
fn caption_label(class_id: u32) -> String {
    categories::category_for_class(class_id)
        .map(str::to_string)
        .unwrap_or_else(|| class_label(class_id))
}

/// Stable color for a label, derived from a digest of its text.
pub fn label_color(label: &str) -> Rgb<u8> {
    let digest = Sha256::digest(label.as_bytes());
    Rgb([digest[0], digest[1], digest[2]])
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}
