use super::{
    DetectionEvent, FaceEncoder, FaceLocator, KnownFace, MatchResult, Matcher,
    PixelSignatureEncoder, SimulatedFaceLocator,
};
use crate::config::{DetectionConfig, EncoderKind, LocatorKind};
use crate::error::RecognitionError;
use crate::frame::Frame;
use tracing::{debug, warn};

/// One located face with its match outcome
#[derive(Debug, Clone)]
pub struct FaceObservation {
    /// Region is in downscaled detection-frame coordinates
    pub detection: DetectionEvent,
    pub result: MatchResult,
}

/// Locate, encode and match every face on a frame
pub struct RecognitionPipeline {
    locator: Box<dyn FaceLocator>,
    encoder: Box<dyn FaceEncoder>,
    matcher: Matcher,
    scale_factor: f32,
}

impl RecognitionPipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        encoder: Box<dyn FaceEncoder>,
        matcher: Matcher,
        scale_factor: f32,
    ) -> Self {
        Self {
            locator,
            encoder,
            matcher,
            scale_factor,
        }
    }

    /// Build the configured locator/encoder pair around a loaded gallery
    pub fn from_config(
        config: &DetectionConfig,
        gallery: Vec<KnownFace>,
    ) -> Result<Self, RecognitionError> {
        let locator = build_locator(config)?;
        let encoder = build_encoder(config)?;

        if let Some(known) = gallery.first() {
            if known.signature.len() != encoder.signature_len() {
                warn!(
                    "Gallery signatures have length {} but the {:?} encoder produces {}; \
                     re-enroll with the same encoder",
                    known.signature.len(),
                    config.encoder,
                    encoder.signature_len()
                );
            }
        }

        let matcher = Matcher::new(gallery, config.match_threshold, config.distance_metric);
        Ok(Self::new(locator, encoder, matcher, config.scale_factor))
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Run one frame through the pipeline. A face whose signature cannot be
    /// computed is skipped; a locator failure fails the whole frame.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Vec<FaceObservation>, RecognitionError> {
        let small = frame.downscale(self.scale_factor);
        let regions = self.locator.locate(&small)?;
        if regions.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Frame {}: {} face(s) located", frame.id, regions.len());

        let mut observations = Vec::with_capacity(regions.len());
        for region in regions {
            let signature = match self.encoder.encode(&small, &region) {
                Ok(signature) => signature,
                Err(e) => {
                    warn!("Skipping face at {}: {}", region, e);
                    continue;
                }
            };

            let result = self.matcher.best_match(&signature);
            observations.push(FaceObservation {
                detection: DetectionEvent { region, signature },
                result,
            });
        }

        Ok(observations)
    }
}

/// Locator selected by configuration
pub fn build_locator(config: &DetectionConfig) -> Result<Box<dyn FaceLocator>, RecognitionError> {
    match config.locator {
        LocatorKind::Simulated => Ok(Box::new(SimulatedFaceLocator::new(
            config.simulate_interval_frames,
        ))),
        LocatorKind::Onnx => onnx_locator(config),
    }
}

/// Encoder selected by configuration
pub fn build_encoder(config: &DetectionConfig) -> Result<Box<dyn FaceEncoder>, RecognitionError> {
    match config.encoder {
        EncoderKind::Pixel => Ok(Box::new(PixelSignatureEncoder::new())),
        EncoderKind::Onnx => onnx_encoder(config),
    }
}

#[cfg(feature = "onnx")]
fn onnx_locator(config: &DetectionConfig) -> Result<Box<dyn FaceLocator>, RecognitionError> {
    let locator =
        super::OnnxFaceLocator::new(&config.detector_model_path, config.detector_confidence)?;
    Ok(Box::new(locator))
}

#[cfg(not(feature = "onnx"))]
fn onnx_locator(config: &DetectionConfig) -> Result<Box<dyn FaceLocator>, RecognitionError> {
    Err(RecognitionError::ModelLoad {
        path: config.detector_model_path.clone(),
        details: "built without the `onnx` feature".to_string(),
    })
}

#[cfg(feature = "onnx")]
fn onnx_encoder(config: &DetectionConfig) -> Result<Box<dyn FaceEncoder>, RecognitionError> {
    let encoder = super::OnnxFaceEncoder::new(&config.embedding_model_path)?;
    Ok(Box::new(encoder))
}

#[cfg(not(feature = "onnx"))]
fn onnx_encoder(config: &DetectionConfig) -> Result<Box<dyn FaceEncoder>, RecognitionError> {
    Err(RecognitionError::ModelLoad {
        path: config.embedding_model_path.clone(),
        details: "built without the `onnx` feature".to_string(),
    })
}
