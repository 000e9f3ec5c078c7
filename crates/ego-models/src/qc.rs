//! Quality-control checks on output distributions.

use crate::result::MaskFrame;

/// Fraction of frames whose mask payload is empty. An empty frame set
/// counts as fully empty.
pub fn empty_mask_rate(frames: &[MaskFrame]) -> f64 {
    if frames.is_empty() {
        return 1.0;
    }
    let empty = frames.iter().filter(|f| f.mask_rle.is_empty()).count();
    empty as f64 / frames.len() as f64
}

/// Summary stats for a value distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn distribution_stats(values: &[f64]) -> DistributionStats {
    if values.is_empty() {
        return DistributionStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut total = 0.0;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        total += v;
    }
    DistributionStats {
        min,
        max,
        mean: total / values.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rle: &str) -> MaskFrame {
        MaskFrame {
            frame_index: 0,
            timestamp_s: 0.0,
            mask_rle: rle.to_string(),
        }
    }

    #[test]
    fn test_empty_mask_rate() {
        assert_eq!(empty_mask_rate(&[]), 1.0);
        let frames = vec![frame(""), frame("{\"size\":[1,1],\"counts\":\"01\"}")];
        assert!((empty_mask_rate(&frames) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distribution_stats() {
        let stats = distribution_stats(&[1.0, 2.0, 3.0]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert_eq!(distribution_stats(&[]).mean, 0.0);
    }
}
