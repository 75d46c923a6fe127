use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use std::path::Path;

/// 8x8 average hash of an image, packed into 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Number of differing bits.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

pub fn fingerprint(image: &DynamicImage) -> Result<Fingerprint> {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .hash_size(8, 8)
        .to_hasher();
    let hash = hasher.hash_image(image);
    let bytes: [u8; 8] = hash
        .as_bytes()
        .try_into()
        .map_err(|_| anyhow!("unexpected hash width {} bytes", hash.as_bytes().len()))?;
    Ok(Fingerprint(u64::from_be_bytes(bytes)))
}

pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let image =
        image::open(path).with_context(|| format!("failed to decode {}", path.display()))?;
    fingerprint(&image)
}

/// True when both images hash to the same fingerprint.
///
/// Any failure to read or decode either file is reported as "not identical".
pub fn are_identical(previous: &Path, current: &Path) -> bool {
    let compared = fingerprint_file(previous)
        .and_then(|prev| Ok(prev.distance(&fingerprint_file(current)?)));
    match compared {
        Ok(distance) => {
            log::debug!(
                "hash distance {} between {} and {}",
                distance,
                previous.display(),
                current.display()
            );
            distance == 0
        }
        Err(e) => {
            log::debug!("duplicate check skipped: {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn scene(width: u32, height: u32, invert: bool) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let lit = ((x * 8 / width) + (y * 8 / height)) % 3 == 0;
            if lit != invert {
                Rgb([230, 225, 210])
            } else {
                Rgb([20, 25, 30])
            }
        })
    }

    #[test]
    fn byte_identical_images_have_zero_distance() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        scene(64, 48, false).save_with_format(&a, ImageFormat::Jpeg)?;
        std::fs::copy(&a, &b)?;

        assert_eq!(fingerprint_file(&a)?.distance(&fingerprint_file(&b)?), 0);
        assert!(are_identical(&a, &b));
        Ok(())
    }

    #[test]
    fn recompressed_copy_is_still_identical() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        let image = scene(96, 64, false);
        image.save_with_format(&a, ImageFormat::Jpeg)?;
        image::open(&a)?.save_with_format(&b, ImageFormat::Jpeg)?;

        assert!(are_identical(&a, &b));
        Ok(())
    }

    #[test]
    fn different_scenes_are_not_identical() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        scene(64, 64, false).save(&a)?;
        scene(64, 64, true).save(&b)?;

        assert!(!are_identical(&a, &b));
        Ok(())
    }

    #[test]
    fn unreadable_previous_frame_is_not_identical() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing.jpg");
        let corrupt = dir.path().join("corrupt.jpg");
        let current = dir.path().join("current.png");
        std::fs::write(&corrupt, b"not an image")?;
        scene(32, 32, false).save(&current)?;

        assert!(!are_identical(&missing, &current));
        assert!(!are_identical(&corrupt, &current));
        Ok(())
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(Fingerprint(0b1011).distance(&Fingerprint(0b0001)), 2);
        assert_eq!(Fingerprint(u64::MAX).distance(&Fingerprint(0)), 64);
    }
}
