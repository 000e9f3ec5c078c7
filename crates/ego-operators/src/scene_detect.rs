//! Scene boundary detection for manifest construction.

use ego_models::{ClipError, SceneDetectSettings};
use tracing::warn;

/// Detects scene boundaries in a video. Returns `(scenes, used_fallback)`
/// where each scene is `(start_s, end_s)` and `used_fallback` flags that
/// the detector could not run and the whole clip was used instead.
pub trait SceneDetector: Send + Sync {
    fn detect(
        &self,
        video_path: &str,
        duration_s: f64,
    ) -> Result<(Vec<(f64, f64)>, bool), ClipError>;
}

/// Default detector: no embedded scene-cutting model ships with the core,
/// so every video falls back to a single full-length scene when the
/// settings allow it.
pub struct FallbackSceneDetector {
    settings: SceneDetectSettings,
}

impl FallbackSceneDetector {
    pub fn new(settings: SceneDetectSettings) -> Self {
        Self { settings }
    }
}

impl SceneDetector for FallbackSceneDetector {
    fn detect(
        &self,
        video_path: &str,
        duration_s: f64,
    ) -> Result<(Vec<(f64, f64)>, bool), ClipError> {
        let (scenes, used_fallback) = detect_scenes(video_path, duration_s, &self.settings);
        Ok((scenes, used_fallback))
    }
}

/// Scene detection with full-clip fallback.
///
/// The external scene-cutting operator is wired in by deployments that have
/// one; here the method is always unavailable, so the result is the full
/// clip (fallback allowed) or no scenes at all.
pub fn detect_scenes(
    video_path: &str,
    duration_s: f64,
    settings: &SceneDetectSettings,
) -> (Vec<(f64, f64)>, bool) {
    if settings.method == "scenedetect" {
        warn!(
            video = video_path,
            "scene detector unavailable, falling back to full clip"
        );
    }
    if settings.fallback_full_clip && duration_s > 0.0 {
        (vec![(0.0, duration_s)], true)
    } else {
        (Vec::new(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_clip_fallback() {
        let settings = SceneDetectSettings {
            method: "none".to_string(),
            ..Default::default()
        };
        let (scenes, used_fallback) = detect_scenes("/tmp/a.mp4", 10.0, &settings);
        assert_eq!(scenes, vec![(0.0, 10.0)]);
        assert!(used_fallback);
    }

    #[test]
    fn test_fallback_disabled_yields_no_scenes() {
        let settings = SceneDetectSettings {
            fallback_full_clip: false,
            ..Default::default()
        };
        let (scenes, used_fallback) = detect_scenes("/tmp/a.mp4", 10.0, &settings);
        assert!(scenes.is_empty());
        assert!(used_fallback);
    }
}
