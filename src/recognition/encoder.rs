use super::Signature;
use crate::error::RecognitionError;
use crate::frame::FaceRegion;
use image::{imageops, DynamicImage, RgbImage};

/// Turns a located face into a fixed-length signature
pub trait FaceEncoder: Send {
    fn encode(
        &mut self,
        image: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Signature, RecognitionError>;

    /// Length of every signature this encoder produces
    fn signature_len(&self) -> usize;
}

const GRID_WIDTH: u32 = 8;
const GRID_HEIGHT: u32 = 16;

/// Deterministic encoder built from pixel statistics: the face crop is
/// reduced to an 8x16 grayscale grid, mean-centred and scaled to unit
/// length. Identical crops give identical signatures; it has no real
/// discriminating power and exists for running without models.
#[derive(Debug, Default)]
pub struct PixelSignatureEncoder;

impl PixelSignatureEncoder {
    pub fn new() -> Self {
        Self
    }
}

/// Crop a region out of `image`, failing when nothing of it is inside
pub(crate) fn crop_region(
    image: &RgbImage,
    region: &FaceRegion,
) -> Result<RgbImage, RecognitionError> {
    let clamped = region
        .clamped(image.width(), image.height())
        .ok_or_else(|| RecognitionError::RegionOutOfBounds {
            region: region.to_string(),
            width: image.width(),
            height: image.height(),
        })?;

    Ok(imageops::crop_imm(
        image,
        clamped.left as u32,
        clamped.top as u32,
        clamped.width() as u32,
        clamped.height() as u32,
    )
    .to_image())
}

impl FaceEncoder for PixelSignatureEncoder {
    fn encode(
        &mut self,
        image: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Signature, RecognitionError> {
        let crop = crop_region(image, region)?;
        let gray = DynamicImage::ImageRgb8(crop).to_luma8();
        let grid = imageops::resize(
            &gray,
            GRID_WIDTH,
            GRID_HEIGHT,
            imageops::FilterType::Triangle,
        );

        let values: Vec<f32> = grid.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let centred = values.into_iter().map(|v| v - mean).collect();

        Ok(Signature::new(centred).normalized())
    }

    fn signature_len(&self) -> usize {
        (GRID_WIDTH * GRID_HEIGHT) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::matcher::euclidean_distance;
    use image::Rgb;

    fn gradient(width: u32, height: u32, offset: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) as u8).wrapping_add(offset);
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn test_signature_shape_and_norm() {
        let mut encoder = PixelSignatureEncoder::new();
        let image = gradient(64, 64, 0);
        let signature = encoder
            .encode(&image, &FaceRegion::new(8, 56, 56, 8))
            .unwrap();

        assert_eq!(signature.len(), encoder.signature_len());
        let norm: f32 = signature.as_slice().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_identical_crops_match_exactly() {
        let mut encoder = PixelSignatureEncoder::new();
        let image = gradient(64, 64, 0);
        let region = FaceRegion::new(0, 32, 32, 0);

        let a = encoder.encode(&image, &region).unwrap();
        let b = encoder.encode(&image.clone(), &region).unwrap();
        assert_eq!(euclidean_distance(a.as_slice(), b.as_slice()), 0.0);
    }

    #[test]
    fn test_uniform_crop_encodes_to_zero_vector() {
        let mut encoder = PixelSignatureEncoder::new();
        let image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        let signature = encoder.encode(&image, &FaceRegion::full(16, 16)).unwrap();
        assert!(signature.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_region_outside_frame_fails() {
        let mut encoder = PixelSignatureEncoder::new();
        let image = gradient(32, 32, 0);
        let result = encoder.encode(&image, &FaceRegion::new(40, 60, 50, 45));
        assert!(matches!(
            result,
            Err(RecognitionError::RegionOutOfBounds { .. })
        ));
    }
}
