use std::collections::BTreeMap;

use crate::detect::Detection;

/// Category reported for a frame without any counted detection.
pub const NOTHING: &str = "nothing";

/// Detector class id -> census category id.
///
/// Census ids 3 and 6 have no detector class mapped onto them.
const CLASS_TO_CATEGORY: &[(u32, u32)] = &[(0, 5), (1, 0), (2, 2), (3, 4), (5, 1), (7, 7)];

/// Census category id -> category name.
const CATEGORY_NAMES: &[(u32, &str)] = &[
    (0, "Bicycle"),
    (1, "Bus"),
    (2, "Car"),
    (4, "Motorcycle"),
    (5, "Pedestrian"),
    (7, "Truck"),
];

/// Category name -> count. Key order is stable for serialization.
pub type CategoryCounts = BTreeMap<String, u32>;

pub fn category_id(class_id: u32) -> Option<u32> {
    CLASS_TO_CATEGORY
        .iter()
        .find(|(class, _)| *class == class_id)
        .map(|(_, category)| *category)
}

pub fn category_name(category_id: u32) -> Option<&'static str> {
    CATEGORY_NAMES
        .iter()
        .find(|(id, _)| *id == category_id)
        .map(|(_, name)| *name)
}

/// Census category name for a raw detector class, if the class is counted.
pub fn category_for_class(class_id: u32) -> Option<&'static str> {
    category_id(class_id).and_then(category_name)
}

/// Count detections per census category.
///
/// Unmapped classes are ignored. When nothing is counted the result is
/// `{"nothing": 0}`.
pub fn remap(detections: &[Detection]) -> CategoryCounts {
    let mut counts = CategoryCounts::new();
    for detection in detections {
        if let Some(name) = category_for_class(detection.class_id) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        counts.insert(NOTHING.to_string(), 0);
    }
    counts
}
