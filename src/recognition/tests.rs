use super::*;
use crate::config::{DistanceMetric, FacewatchConfig, LocatorKind};
use crate::frame::{FaceRegion, Frame};
use image::{Rgb, RgbImage};
use std::time::SystemTime;

fn textured_frame(width: u32, height: u32) -> Frame {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x * y) % 256) as u8])
    });
    Frame::new(7, SystemTime::now(), image)
}

fn enrolled_gallery(frame: &Frame, region: &FaceRegion, identity: &str) -> Vec<KnownFace> {
    let small = frame.downscale(0.5);
    let signature = PixelSignatureEncoder::new().encode(&small, region).unwrap();
    vec![KnownFace::new(identity, signature)]
}

fn pipeline(locator: Box<dyn FaceLocator>, gallery: Vec<KnownFace>) -> RecognitionPipeline {
    RecognitionPipeline::new(
        locator,
        Box::new(PixelSignatureEncoder::new()),
        Matcher::new(gallery, 0.6, DistanceMetric::Euclidean),
        0.5,
    )
}

#[test]
fn test_enrolled_face_is_recognised() {
    let frame = textured_frame(128, 96);
    let region = FaceRegion::new(12, 48, 36, 16);
    let gallery = enrolled_gallery(&frame, &region, "Jane Doe");

    let mut pipeline = pipeline(Box::new(FixedFaceLocator::new(vec![region])), gallery);
    let observations = pipeline.analyze(&frame).unwrap();

    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].result.label(), "Jane Doe");
    assert!(observations[0].result.distance < 1e-5);
    assert_eq!(observations[0].detection.region, region);
}

#[test]
fn test_empty_gallery_reports_unknown() {
    let frame = textured_frame(128, 96);
    let regions = vec![FaceRegion::new(0, 20, 20, 0), FaceRegion::new(20, 60, 40, 30)];

    let mut pipeline = pipeline(Box::new(FixedFaceLocator::new(regions)), Vec::new());
    let observations = pipeline.analyze(&frame).unwrap();

    assert_eq!(observations.len(), 2);
    assert!(observations
        .iter()
        .all(|o| !o.result.is_known() && o.result.distance == 1.0));
}

#[test]
fn test_unencodable_region_is_skipped() {
    let frame = textured_frame(64, 48);
    let regions = vec![FaceRegion::new(100, 200, 150, 120), FaceRegion::new(2, 20, 20, 2)];

    let mut pipeline = pipeline(Box::new(FixedFaceLocator::new(regions)), Vec::new());
    let observations = pipeline.analyze(&frame).unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].detection.region, FaceRegion::new(2, 20, 20, 2));
}

#[test]
fn test_frames_without_faces() {
    let frame = textured_frame(64, 48);
    let mut pipeline = pipeline(Box::new(SimulatedFaceLocator::new(2)), Vec::new());

    assert!(pipeline.analyze(&frame).unwrap().is_empty());
    assert_eq!(pipeline.analyze(&frame).unwrap().len(), 1);
}

#[test]
fn test_from_config_defaults_to_simulation() {
    let config = FacewatchConfig::default().detection;
    let pipeline = RecognitionPipeline::from_config(&config, Vec::new()).unwrap();
    assert_eq!(pipeline.scale_factor(), config.scale_factor);
    assert_eq!(pipeline.matcher().gallery_len(), 0);
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_onnx_locator_requires_feature() {
    let mut config = FacewatchConfig::default().detection;
    config.locator = LocatorKind::Onnx;
    assert!(matches!(
        build_locator(&config),
        Err(crate::error::RecognitionError::ModelLoad { .. })
    ));
}
