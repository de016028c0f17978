mod encoder;
mod locator;
pub mod matcher;
#[cfg(feature = "onnx")]
mod onnx;
mod pipeline;
mod types;
#[cfg(test)]
mod tests;

pub use encoder::{FaceEncoder, PixelSignatureEncoder};
pub use locator::{FaceLocator, FixedFaceLocator, SimulatedFaceLocator};
pub use matcher::Matcher;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxFaceEncoder, OnnxFaceLocator};
pub use pipeline::{build_encoder, build_locator, FaceObservation, RecognitionPipeline};
pub use types::{DetectionEvent, KnownFace, MatchResult, Signature};
