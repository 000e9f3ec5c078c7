//! Partitioned output path helpers.
//!
//! Layout, literal: `<output_root>/run_id=<R>/video_id=<V>/clip_id=<C>/`.

use std::path::{Path, PathBuf};

/// Root directory for a run. `run_manifest.json` lives here.
pub fn run_dir(output_root: impl AsRef<Path>, run_id: &str) -> PathBuf {
    output_root.as_ref().join(format!("run_id={run_id}"))
}

/// Directory holding one clip's artifact set.
pub fn clip_dir(
    output_root: impl AsRef<Path>,
    run_id: &str,
    video_id: &str,
    clip_id: &str,
) -> PathBuf {
    run_dir(output_root, run_id)
        .join(format!("video_id={video_id}"))
        .join(format!("clip_id={clip_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dir = clip_dir("/out", "r1", "v1", "c1");
        assert_eq!(
            dir,
            PathBuf::from("/out/run_id=r1/video_id=v1/clip_id=c1")
        );
        assert_eq!(run_dir("/out", "r1"), PathBuf::from("/out/run_id=r1"));
    }
}
