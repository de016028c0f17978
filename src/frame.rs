use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A captured camera frame at full resolution
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame identifier assigned by the source
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// RGB pixel data
    pub image: RgbImage,
}

impl Frame {
    pub fn new(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        Self {
            id,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize for location/encoding. Factors at or above 1.0 return a copy.
    pub fn downscale(&self, factor: f32) -> RgbImage {
        if factor >= 1.0 {
            return self.image.clone();
        }

        let width = ((self.width() as f32 * factor) as u32).max(1);
        let height = ((self.height() as f32 * factor) as u32).max(1);
        imageops::resize(
            &self.image,
            width,
            height,
            imageops::FilterType::Triangle,
        )
    }

    /// Crop a full-resolution region, clamped to the frame bounds.
    ///
    /// Returns `None` when nothing of the region remains inside the frame.
    pub fn crop(&self, region: &FaceRegion) -> Option<RgbImage> {
        let clamped = region.clamped(self.width(), self.height())?;
        Some(
            imageops::crop_imm(
                &self.image,
                clamped.left as u32,
                clamped.top as u32,
                clamped.width() as u32,
                clamped.height() as u32,
            )
            .to_image(),
        )
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Face bounding box in pixel coordinates, edges exclusive on the
/// bottom/right side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceRegion {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Region covering a whole `width` x `height` image
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, width as i32, height as i32, 0)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Map a region found on a frame downscaled by `scale_factor` back to
    /// full-resolution coordinates. Coordinates are truncated toward zero.
    pub fn to_full_resolution(&self, scale_factor: f32) -> Self {
        if scale_factor <= 0.0 || scale_factor >= 1.0 {
            return *self;
        }

        let up = |v: i32| (v as f32 / scale_factor) as i32;
        Self::new(up(self.top), up(self.right), up(self.bottom), up(self.left))
    }

    /// Intersect with a `width` x `height` frame, `None` if nothing is left
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let clamped = Self::new(
            self.top.max(0),
            self.right.min(width as i32),
            self.bottom.min(height as i32),
            self.left.max(0),
        );

        if clamped.right <= clamped.left || clamped.bottom <= clamped.top {
            None
        } else {
            Some(clamped)
        }
    }
}

impl std::fmt::Display for FaceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(top={}, right={}, bottom={}, left={})",
            self.top, self.right, self.bottom, self.left
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_frame(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 0]));
        Frame::new(1, SystemTime::now(), image)
    }

    #[test]
    fn test_downscale_dimensions() {
        let frame = test_frame(640, 480);
        let small = frame.downscale(0.5);
        assert_eq!(small.dimensions(), (320, 240));

        let same = frame.downscale(1.0);
        assert_eq!(same.dimensions(), (640, 480));
    }

    #[test]
    fn test_region_rescale_to_full_resolution() {
        let small = FaceRegion::new(60, 240, 180, 80);
        let full = small.to_full_resolution(0.5);
        assert_eq!(full, FaceRegion::new(120, 480, 360, 160));

        let unscaled = small.to_full_resolution(1.0);
        assert_eq!(unscaled, small);
    }

    #[test]
    fn test_region_clamping() {
        let region = FaceRegion::new(-10, 700, 500, 600);
        let clamped = region.clamped(640, 480).unwrap();
        assert_eq!(clamped, FaceRegion::new(0, 640, 480, 600));

        let outside = FaceRegion::new(10, 900, 50, 700);
        assert!(outside.clamped(640, 480).is_none());

        let degenerate = FaceRegion::new(10, 10, 10, 10);
        assert!(degenerate.clamped(640, 480).is_none());
    }

    #[test]
    fn test_crop_uses_clamped_region() {
        let frame = test_frame(100, 80);
        let crop = frame.crop(&FaceRegion::new(70, 120, 100, 90)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([90, 70, 0]));

        assert!(frame.crop(&FaceRegion::new(90, 50, 120, 10)).is_none());
    }

    #[test]
    fn test_region_geometry() {
        let region = FaceRegion::new(10, 50, 30, 20);
        assert_eq!(region.width(), 30);
        assert_eq!(region.height(), 20);
        assert_eq!(region.area(), 600);
        assert!(!region.is_empty());
        assert!(FaceRegion::new(10, 5, 30, 20).is_empty());
    }
}
