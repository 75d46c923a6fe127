/// Axis-aligned box in pixel coordinates of the frame it was detected on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.xmin.max(other.xmin);
        let iy1 = self.ymin.max(other.ymin);
        let ix2 = self.xmax.min(other.xmax);
        let iy2 = self.ymax.min(other.ymax);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clamp to a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
        let (w, h) = (width as f32, height as f32);
        BBox {
            xmin: self.xmin.clamp(0.0, w),
            ymin: self.ymin.clamp(0.0, h),
            xmax: self.xmax.clamp(0.0, w),
            ymax: self.ymax.clamp(0.0, h),
        }
    }
}

/// One model output.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    /// Raw detector class index (COCO numbering).
    pub class_id: u32,
    /// Score in [0, 1].
    pub confidence: f32,
}

/// Detector classes relevant to a road census: person, bicycle, car,
/// motorcycle, bus, truck.
pub const ALLOWED_CLASSES: &[u32] = &[0, 1, 2, 3, 5, 7];

/// Inference-time filtering applied by every backend.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectParams {
    pub allowed_classes: Vec<u32>,
    /// Minimum confidence kept.
    pub confidence: f32,
    /// Overlap above which the weaker of two same-class boxes is suppressed.
    pub iou: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            allowed_classes: ALLOWED_CLASSES.to_vec(),
            confidence: 0.2,
            iou: 0.8,
        }
    }
}

impl DetectParams {
    pub fn allows(&self, class_id: u32) -> bool {
        self.allowed_classes.contains(&class_id)
    }
}

/// Allow-list and confidence filter followed by class-aware NMS.
///
/// Output is ordered by descending confidence.
pub fn postprocess(candidates: Vec<Detection>, params: &DetectParams) -> Vec<Detection> {
    let mut candidates: Vec<Detection> = candidates
        .into_iter()
        .filter(|d| params.allows(d.class_id) && d.confidence >= params.confidence)
        .collect();
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > params.iou
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// COCO class names, indexed by detector class id.
const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Model label for a raw class id.
pub fn class_label(class_id: u32) -> String {
    COCO_NAMES
        .get(class_id as usize)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class{}", class_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32, x: f32) -> Detection {
        Detection {
            bbox: BBox::new(x, 0.0, x + 10.0, 10.0),
            class_id,
            confidence,
        }
    }

    #[test]
    fn iou_of_disjoint_and_equal_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&BBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let half = BBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn filters_classes_and_low_scores() {
        let params = DetectParams::default();
        let kept = postprocess(
            vec![det(2, 0.9, 0.0), det(16, 0.9, 50.0), det(7, 0.1, 100.0)],
            &params,
        );
        assert_eq!(kept, vec![det(2, 0.9, 0.0)]);
    }

    #[test]
    fn suppresses_heavy_overlap_within_a_class() {
        let params = DetectParams::default();
        let kept = postprocess(
            vec![det(2, 0.6, 0.5), det(2, 0.9, 0.0), det(2, 0.7, 40.0)],
            &params,
        );
        assert_eq!(kept, vec![det(2, 0.9, 0.0), det(2, 0.7, 40.0)]);
    }

    #[test]
    fn overlapping_boxes_of_different_classes_survive() {
        let params = DetectParams::default();
        let kept = postprocess(vec![det(0, 0.8, 0.0), det(1, 0.7, 0.0)], &params);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn labels_follow_coco_numbering() {
        assert_eq!(class_label(2), "car");
        assert_eq!(class_label(7), "truck");
        assert_eq!(class_label(200), "class200");
    }
}
