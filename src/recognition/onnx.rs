//! Model-backed locator and encoder on ONNX Runtime: a YOLO face detector
//! and an ArcFace-style 112x112 embedding network.

use super::encoder::crop_region;
use super::{FaceEncoder, FaceLocator, Signature};
use crate::error::RecognitionError;
use crate::frame::FaceRegion;
use image::{imageops, RgbImage};
use ndarray::Array4;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info};

/// Fallback detector input resolution when the model shape is dynamic
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f32 = 0.45;

const EMBEDDING_INPUT_SIZE: u32 = 112;
const EMBEDDING_NORM_MEAN: f32 = 127.5;
const EMBEDDING_NORM_STD: f32 = 127.5;

fn inference_error(e: impl Display) -> RecognitionError {
    RecognitionError::Inference {
        details: e.to_string(),
    }
}

fn load_session(path: &Path) -> Result<ort::session::Session, RecognitionError> {
    let model_error = |e: &dyn Display| RecognitionError::ModelLoad {
        path: path.display().to_string(),
        details: e.to_string(),
    };

    let session = ort::session::Session::builder()
        .map_err(|e| model_error(&e))?
        .commit_from_file(path)
        .map_err(|e| model_error(&e))?;

    info!("Loaded model {}", path.display());
    Ok(session)
}

/// YOLO face detector
pub struct OnnxFaceLocator {
    session: ort::session::Session,
    confidence: f32,
    input_size: u32,
}

impl OnnxFaceLocator {
    pub fn new<P: AsRef<Path>>(model_path: P, confidence: f32) -> Result<Self, RecognitionError> {
        let session = load_session(model_path.as_ref())?;

        // NCHW [1, 3, H, W]
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceLocator for OnnxFaceLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let (tensor, scale, pad_x, pad_y) = letterbox(image, self.input_size);
        let input = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(inference_error("detector produced no outputs"));
        }

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let shape = output.shape().to_vec();
        if shape.len() != 3 {
            return Err(inference_error(format!(
                "unexpected detector output shape {:?}",
                shape
            )));
        }

        // Either [1, features, detections] or [1, detections, features]
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = output
            .as_slice()
            .ok_or_else(|| inference_error("detector output is not contiguous"))?;

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let feature = |f: usize| {
                if transposed {
                    data[f * num_dets + i]
                } else {
                    data[i * num_feats + f]
                }
            };
            if num_feats < 5 || feature(4) < self.confidence {
                continue;
            }

            let (cx, cy, w, h) = (feature(0), feature(1), feature(2), feature(3));
            candidates.push(Candidate {
                x1: (cx - w / 2.0 - pad_x) / scale,
                y1: (cy - h / 2.0 - pad_y) / scale,
                x2: (cx + w / 2.0 - pad_x) / scale,
                y2: (cy + h / 2.0 - pad_y) / scale,
                confidence: feature(4),
            });
        }

        let kept = non_max_suppression(candidates, NMS_IOU_THRESH);
        debug!("Detector kept {} faces", kept.len());

        Ok(kept
            .into_iter()
            .filter_map(|c| {
                FaceRegion::new(c.y1 as i32, c.x2 as i32, c.y2 as i32, c.x1 as i32)
                    .clamped(image.width(), image.height())
            })
            .collect())
    }
}

/// ArcFace-style embedding encoder producing L2-normalised signatures
pub struct OnnxFaceEncoder {
    session: ort::session::Session,
    signature_len: usize,
}

impl OnnxFaceEncoder {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, RecognitionError> {
        let session = load_session(model_path.as_ref())?;
        let signature_len = session
            .outputs()
            .first()
            .and_then(|output| match output.dtype() {
                ort::value::ValueType::Tensor { shape, .. } => {
                    shape.last().filter(|d| **d > 0).map(|d| *d as usize)
                }
                _ => None,
            })
            .unwrap_or(512);

        Ok(Self {
            session,
            signature_len,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(
        &mut self,
        image: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Signature, RecognitionError> {
        let crop = crop_region(image, region)?;
        let resized = imageops::resize(
            &crop,
            EMBEDDING_INPUT_SIZE,
            EMBEDDING_INPUT_SIZE,
            imageops::FilterType::Triangle,
        );

        let size = EMBEDDING_INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel.0[c] as f32 - EMBEDDING_NORM_MEAN) / EMBEDDING_NORM_STD;
            }
        }

        let input = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(inference_error)?;
        let embedding = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let values = embedding
            .as_slice()
            .ok_or_else(|| inference_error("embedding output is not contiguous"))?
            .to_vec();

        Ok(Signature::new(values).normalized())
    }

    fn signature_len(&self) -> usize {
        self.signature_len
    }
}

/// Letterbox `image` into a `target` x `target` NCHW tensor.
///
/// Returns the tensor with the scale and padding needed to map boxes back.
fn letterbox(image: &RgbImage, target: u32) -> (Array4<f32>, f32, f32, f32) {
    let (width, height) = (image.width() as f32, image.height() as f32);
    let scale = (target as f32 / width).min(target as f32 / height);
    let new_w = ((width * scale).round() as u32).clamp(1, target);
    let new_h = ((height * scale).round() as u32).clamp(1, target);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Nearest);

    let size = target as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), 114.0 / 255.0);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (pad_x + x) as usize;
        let ty = (pad_y + y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
        }
    }

    (tensor, scale, pad_x as f32, pad_y as f32)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

impl Candidate {
    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        if inter == 0.0 {
            return 0.0;
        }
        let area = |c: &Candidate| (c.x2 - c.x1) * (c.y2 - c.y1);
        inter / (area(self) + area(other) - inter)
    }
}

/// Greedy NMS, highest confidence first
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_thresh) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Candidate {
        Candidate {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_letterbox_pads_short_side() {
        let image = RgbImage::new(200, 100);
        let (tensor, scale, pad_x, pad_y) = letterbox(&image, 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 1e-6);
        assert_eq!(pad_x, 0.0);
        assert_eq!(pad_y, 160.0);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 320, 320]], 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let kept = non_max_suppression(
            vec![
                candidate(0.0, 0.0, 10.0, 10.0, 0.6),
                candidate(1.0, 1.0, 11.0, 11.0, 0.9),
                candidate(50.0, 50.0, 60.0, 60.0, 0.7),
            ],
            NMS_IOU_THRESH,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }
}
