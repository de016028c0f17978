use crate::frame::FaceRegion;
use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by an encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature(Vec<f32>);

impl Signature {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn normalized(mut self) -> Self {
        let norm = self.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-6 {
            self.0.iter_mut().for_each(|v| *v /= norm);
        }
        self
    }

    /// Little-endian f32 encoding used for database blobs
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Decode a blob written by [`Signature::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return None;
        }

        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self(values))
    }
}

impl From<Vec<f32>> for Signature {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// One gallery entry; an identity may own several
#[derive(Debug, Clone, PartialEq)]
pub struct KnownFace {
    pub identity: String,
    pub signature: Signature,
}

impl KnownFace {
    pub fn new<S: Into<String>>(identity: S, signature: Signature) -> Self {
        Self {
            identity: identity.into(),
            signature,
        }
    }
}

/// A face located on the downscaled detection frame together with its
/// signature
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub region: FaceRegion,
    pub signature: Signature,
}

/// Outcome of matching one signature against the gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// `None` when nothing in the gallery is close enough
    pub identity: Option<String>,
    pub distance: f32,
}

impl MatchResult {
    pub fn matched<S: Into<String>>(identity: S, distance: f32) -> Self {
        Self {
            identity: Some(identity.into()),
            distance,
        }
    }

    pub fn unknown(distance: f32) -> Self {
        Self {
            identity: None,
            distance,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_some()
    }

    /// Display label, "Unknown" for unmatched faces
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_blob_encoding() {
        let signature = Signature::new(vec![0.25, -1.5, 3.0]);
        let bytes = signature.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(Signature::from_bytes(&bytes), Some(signature));

        assert!(Signature::from_bytes(&[1, 2, 3]).is_none());
        assert!(Signature::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_normalization() {
        let signature = Signature::new(vec![3.0, 4.0]).normalized();
        assert!((signature.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((signature.as_slice()[1] - 0.8).abs() < 1e-6);

        let zero = Signature::new(vec![0.0, 0.0]).normalized();
        assert_eq!(zero.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_match_result_label() {
        assert_eq!(MatchResult::unknown(1.0).label(), "Unknown");
        assert_eq!(MatchResult::matched("Jane Doe", 0.3).label(), "Jane Doe");
        assert!(!MatchResult::unknown(0.7).is_known());
    }
}
