use crate::error::RecognitionError;
use crate::frame::FaceRegion;
use image::RgbImage;
use tracing::trace;

/// Finds face bounding boxes on a (downscaled) frame
pub trait FaceLocator: Send {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError>;
}

/// Bench-test locator that reports one centred face every `interval`
/// frames and nothing otherwise
pub struct SimulatedFaceLocator {
    interval: u64,
    frame_count: u64,
}

impl SimulatedFaceLocator {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            frame_count: 0,
        }
    }
}

impl FaceLocator for SimulatedFaceLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError> {
        self.frame_count += 1;
        if self.frame_count % self.interval != 0 {
            return Ok(Vec::new());
        }

        let (width, height) = (image.width() as i32, image.height() as i32);
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let region = if width < 4 || height < 4 {
            FaceRegion::new(0, 1, 1, 0)
        } else {
            FaceRegion::new(height / 4, width * 3 / 4, height * 3 / 4, width / 4)
        };
        trace!("Simulated face at {}", region);
        Ok(vec![region])
    }
}

/// Locator that returns a fixed list of regions on every frame
pub struct FixedFaceLocator {
    regions: Vec<FaceRegion>,
}

impl FixedFaceLocator {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }
}

impl FaceLocator for FixedFaceLocator {
    fn locate(&mut self, _image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError> {
        Ok(self.regions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_locator_fires_every_interval() {
        let mut locator = SimulatedFaceLocator::new(3);
        let image = RgbImage::new(320, 240);

        let hits: Vec<usize> = (0..9)
            .map(|_| locator.locate(&image).unwrap().len())
            .collect();
        assert_eq!(hits, vec![0, 0, 1, 0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_simulated_region_is_centred() {
        let mut locator = SimulatedFaceLocator::new(1);
        let regions = locator.locate(&RgbImage::new(320, 240)).unwrap();
        assert_eq!(regions, vec![FaceRegion::new(60, 240, 180, 80)]);
    }

    #[test]
    fn test_tiny_frames() {
        let mut locator = SimulatedFaceLocator::new(1);
        assert_eq!(
            locator.locate(&RgbImage::new(2, 2)).unwrap(),
            vec![FaceRegion::new(0, 1, 1, 0)]
        );
        assert!(locator.locate(&RgbImage::new(0, 0)).unwrap().is_empty());
    }
}
