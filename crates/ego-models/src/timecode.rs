//! Second/frame conversions.

/// Nearest frame index for a timestamp at the given fps.
pub fn frames_from_seconds(seconds: f64, fps: f64) -> u64 {
    if fps <= 0.0 {
        return 0;
    }
    (seconds * fps).round().max(0.0) as u64
}

/// Timestamp of a frame index at the given fps.
pub fn seconds_from_frames(frame_index: u64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    frame_index as f64 / fps
}

/// Checks that second and frame bounds agree under `fps`.
pub fn validate_time_alignment(
    start_s: f64,
    end_s: f64,
    frame_start: u64,
    frame_end: u64,
    fps: f64,
) -> bool {
    (start_s - seconds_from_frames(frame_start, fps)).abs() < 1e-6
        && (end_s - seconds_from_frames(frame_end, fps)).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_at_30fps() {
        assert_eq!(frames_from_seconds(1.0, 30.0), 30);
        assert_eq!(frames_from_seconds(0.5, 30.0), 15);
        assert!((seconds_from_frames(30, 30.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_fps_is_inert() {
        assert_eq!(frames_from_seconds(10.0, 0.0), 0);
        assert_eq!(seconds_from_frames(10, 0.0), 0.0);
    }

    #[test]
    fn test_alignment() {
        assert!(validate_time_alignment(0.0, 1.0, 0, 30, 30.0));
        assert!(!validate_time_alignment(0.0, 1.1, 0, 30, 30.0));
    }
}
