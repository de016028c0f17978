use super::{KnownFace, MatchResult, Signature};
use crate::config::DistanceMetric;
use tracing::{debug, info, warn};

/// Euclidean distance between two signatures of equal length
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// `1 - cosine similarity`, clamped to `[0, 1]`. Zero vectors are treated
/// as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Nearest-neighbour matcher over the gallery loaded at startup
pub struct Matcher {
    gallery: Vec<KnownFace>,
    threshold: f32,
    metric: DistanceMetric,
}

impl Matcher {
    pub fn new(gallery: Vec<KnownFace>, threshold: f32, metric: DistanceMetric) -> Self {
        if gallery.is_empty() {
            warn!("Gallery is empty; every face will be reported as Unknown");
        } else {
            let mut lengths: Vec<usize> = gallery.iter().map(|f| f.signature.len()).collect();
            lengths.sort_unstable();
            lengths.dedup();
            if lengths.len() > 1 {
                warn!("Gallery mixes signature lengths {:?}", lengths);
            }
            info!(
                "Matcher ready: {} signatures, threshold {}, {:?} distance",
                gallery.len(),
                threshold,
                metric
            );
        }

        Self {
            gallery,
            threshold,
            metric,
        }
    }

    pub fn gallery_len(&self) -> usize {
        self.gallery.len()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Closest gallery entry strictly below the threshold.
    ///
    /// Ties keep the earliest entry. An Unknown result carries the closest
    /// distance seen, capped at 1.0, or 1.0 when nothing was comparable.
    pub fn best_match(&self, probe: &Signature) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;

        for (index, known) in self.gallery.iter().enumerate() {
            if known.signature.len() != probe.len() {
                debug!(
                    "Skipping {} entry: signature length {} != {}",
                    known.identity,
                    known.signature.len(),
                    probe.len()
                );
                continue;
            }

            let distance = self.distance(probe.as_slice(), known.signature.as_slice());
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        match best {
            Some((index, distance)) if distance < self.threshold => {
                MatchResult::matched(self.gallery[index].identity.clone(), distance)
            }
            Some((_, distance)) => MatchResult::unknown(distance.min(1.0)),
            None => MatchResult::unknown(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(identity: &str, values: &[f32]) -> KnownFace {
        KnownFace::new(identity, Signature::new(values.to_vec()))
    }

    fn probe() -> Signature {
        Signature::new(vec![0.0, 0.0])
    }

    #[test]
    fn test_closest_below_threshold_wins() {
        let matcher = Matcher::new(
            vec![face("Farther", &[0.5, 0.0]), face("Closer", &[0.0, 0.3])],
            0.6,
            DistanceMetric::Euclidean,
        );

        let result = matcher.best_match(&probe());
        assert_eq!(result.identity.as_deref(), Some("Closer"));
        assert!((result.distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_nothing_below_threshold_is_unknown() {
        let matcher = Matcher::new(
            vec![face("Stranger", &[0.7, 0.0])],
            0.6,
            DistanceMetric::Euclidean,
        );

        let result = matcher.best_match(&probe());
        assert!(!result.is_known());
        assert!((result.distance - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_distance_equal_to_threshold_is_rejected() {
        let matcher = Matcher::new(
            vec![face("Edge", &[0.5, 0.0])],
            0.5,
            DistanceMetric::Euclidean,
        );
        assert!(!matcher.best_match(&probe()).is_known());
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let matcher = Matcher::new(Vec::new(), 0.6, DistanceMetric::Euclidean);
        assert_eq!(matcher.best_match(&probe()), MatchResult::unknown(1.0));
    }

    #[test]
    fn test_unknown_distance_is_capped() {
        let matcher = Matcher::new(
            vec![face("Far", &[3.0, 4.0])],
            0.6,
            DistanceMetric::Euclidean,
        );
        assert_eq!(matcher.best_match(&probe()).distance, 1.0);
    }

    #[test]
    fn test_ties_keep_first_entry() {
        let matcher = Matcher::new(
            vec![
                face("First", &[0.2, 0.0]),
                face("Second", &[0.0, 0.2]),
                face("First", &[0.0, -0.2]),
            ],
            0.6,
            DistanceMetric::Euclidean,
        );
        assert_eq!(matcher.best_match(&probe()).label(), "First");
    }

    #[test]
    fn test_mismatched_lengths_are_ignored() {
        let matcher = Matcher::new(
            vec![face("Short", &[0.0]), face("Right", &[0.1, 0.1])],
            0.6,
            DistanceMetric::Euclidean,
        );
        assert_eq!(matcher.best_match(&probe()).label(), "Right");
    }

    #[test]
    fn test_cosine_metric() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]) < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);

        let matcher = Matcher::new(
            vec![face("Aligned", &[2.0, 2.1]), face("Orthogonal", &[1.0, -1.0])],
            0.1,
            DistanceMetric::Cosine,
        );
        assert_eq!(
            matcher.best_match(&Signature::new(vec![1.0, 1.0])).label(),
            "Aligned"
        );
    }
}
