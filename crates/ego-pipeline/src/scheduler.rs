//! Clip admission ordering.

use ego_models::ClipTask;

/// Sort clips longest first; ties keep input order (stable sort).
///
/// Long clips are usually the slowest, so they enter the pipeline first
/// and the run's tail is dominated by short clips that absorb straggler
/// latency.
pub fn sort_clips_by_duration(mut clips: Vec<ClipTask>) -> Vec<ClipTask> {
    clips.sort_by(|a, b| b.duration_s().total_cmp(&a.duration_s()));
    clips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(clip_id: &str, start_s: f64, end_s: f64) -> ClipTask {
        ClipTask {
            clip_id: clip_id.to_string(),
            video_id: "v1".to_string(),
            video_path: "/tmp/a.mp4".to_string(),
            start_s,
            end_s,
            frame_start: 0,
            frame_end: 0,
            scenedetect_failed: false,
            retry_count: 0,
        }
    }

    fn ids(clips: &[ClipTask]) -> Vec<&str> {
        clips.iter().map(|c| c.clip_id.as_str()).collect()
    }

    #[test]
    fn test_longest_first() {
        let sorted = sort_clips_by_duration(vec![task("short", 0.0, 2.0), task("long", 0.0, 10.0)]);
        assert_eq!(ids(&sorted), vec!["long", "short"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let sorted = sort_clips_by_duration(vec![
            task("a", 0.0, 5.0),
            task("b", 1.0, 6.0),
            task("c", 0.0, 9.0),
        ]);
        assert_eq!(ids(&sorted), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_idempotent() {
        let once = sort_clips_by_duration(vec![
            task("a", 0.0, 1.0),
            task("b", 0.0, 3.0),
            task("c", 0.0, 2.0),
        ]);
        let twice = sort_clips_by_duration(once.clone());
        assert_eq!(ids(&once), ids(&twice));
    }
}
