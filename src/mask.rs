//! Static region mask applied before detection.
//!
//! The mask is a grayscale image loaded once per run. Each frame gets its own
//! resized copy of the mask; the loaded mask itself is never modified.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use std::path::Path;

pub struct Mask {
    gray: GrayImage,
}

impl Mask {
    /// Load the mask from disk.
    ///
    /// A missing or undecodable mask is an error the caller treats as fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to load mask {}", path.display()))?;
        Ok(Self {
            gray: image.into_luma8(),
        })
    }

    pub fn from_gray(gray: GrayImage) -> Self {
        Self { gray }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }

    /// Mask resized to exactly `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> GrayImage {
        if self.gray.dimensions() == (width, height) {
            return self.gray.clone();
        }
        imageops::resize(&self.gray, width, height, FilterType::Nearest)
    }

    /// Per-pixel bitwise AND of `frame` with the mask resized to the frame.
    ///
    /// Frame pixels under a zero mask value come out black.
    pub fn apply(&self, frame: &RgbImage) -> RgbImage {
        let (width, height) = frame.dimensions();
        let mask = self.resized(width, height);
        let mut out = frame.clone();
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            let m = m.0[0];
            for channel in pixel.0.iter_mut() {
                *channel &= m;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn left_half_mask(width: u32, height: u32) -> Mask {
        Mask::from_gray(GrayImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }

    #[test]
    fn zero_mask_blacks_out_pixels() {
        let mask = left_half_mask(4, 2);
        let frame = RgbImage::from_pixel(4, 2, Rgb([200, 150, 100]));
        let out = mask.apply(&frame);

        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 150, 100]));
        assert_eq!(out.get_pixel(1, 1), &Rgb([200, 150, 100]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(3, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn mask_is_resized_to_frame() {
        let mask = left_half_mask(4, 2);
        let frame = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        let out = mask.apply(&frame);

        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(5, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(35, 10), &Rgb([0, 0, 0]));
        // the loaded mask keeps its own size
        assert_eq!(mask.dimensions(), (4, 2));
    }

    #[test]
    fn input_frame_is_not_modified() {
        let mask = left_half_mask(2, 2);
        let frame = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
        let _ = mask.apply(&frame);
        assert_eq!(frame.get_pixel(1, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn missing_mask_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Mask::load(&dir.path().join("mask.png")).is_err());
    }
}
