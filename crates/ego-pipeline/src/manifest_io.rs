//! Manifest loading and construction.
//!
//! Manifests are JSON-Lines by default; a `.parquet` extension switches to
//! the columnar reader. `make-manifest` probes videos with ffprobe, cuts
//! scenes (with full-clip fallback), snaps clip bounds to frames, and
//! emits deterministic IDs so reruns address the same clips.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use ego_io::write_json_lines;
use ego_models::hashing::sha256_file;
use ego_models::timecode::{frames_from_seconds, seconds_from_frames};
use ego_models::{sanitize_id, ClipRecord, ClipStatus, SceneDetectSettings, VideoRecord};
use ego_operators::SceneDetector;

use crate::error::{PipelineError, PipelineResult};

/// Load the video manifest and index it by `video_id`.
pub fn load_video_manifest(path: &Path) -> PipelineResult<HashMap<String, VideoRecord>> {
    let rows: Vec<VideoRecord> = load_rows(path)?;
    Ok(rows
        .into_iter()
        .map(|row| (row.video_id.clone(), row))
        .collect())
}

/// Load the clip manifest in row order.
pub fn load_clip_manifest(path: &Path) -> PipelineResult<Vec<ClipRecord>> {
    load_rows(path)
}

fn load_rows<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
        return load_parquet_rows(path);
    }
    let body = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::manifest(format!("{}: {e}", path.display())))?;
    let mut rows = Vec::new();
    for (lineno, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str(line).map_err(|e| {
            PipelineError::manifest(format!("{}:{}: {e}", path.display(), lineno + 1))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn load_parquet_rows<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let file = std::fs::File::open(path)
        .map_err(|e| PipelineError::manifest(format!("{}: {e}", path.display())))?;
    let reader = SerializedFileReader::new(file)?;
    let mut rows = Vec::new();
    for row in reader.get_row_iter(None)? {
        let value = row?.to_json_value();
        let row = serde_json::from_value(value).map_err(|e| {
            PipelineError::manifest(format!("{}: {e}", path.display()))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Probed properties of one source video.
#[derive(Debug, Clone)]
pub struct ProbedVideo {
    pub duration_s: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub audio: bool,
}

/// Extracts [`ProbedVideo`] from a file on disk.
#[async_trait]
pub trait VideoProber: Send + Sync {
    async fn probe(&self, path: &Path) -> PipelineResult<ProbedVideo>;
}

/// ffprobe-backed prober.
pub struct FfprobeProber;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

#[async_trait]
impl VideoProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> PipelineResult<ProbedVideo> {
        which::which("ffprobe")
            .map_err(|_| PipelineError::Probe("ffprobe not found on PATH".to_string()))?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::Probe(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| {
                PipelineError::Probe(format!("no video stream in {}", path.display()))
            })?;

        let duration_s = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        let fps = video_stream
            .avg_frame_rate
            .as_deref()
            .or(video_stream.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
            .unwrap_or(30.0);
        let audio = probe.streams.iter().any(|s| s.codec_type == "audio");

        Ok(ProbedVideo {
            duration_s,
            fps,
            width: video_stream.width.unwrap_or(0),
            height: video_stream.height.unwrap_or(0),
            audio,
        })
    }
}

/// Parse an ffprobe rational frame rate like "30000/1001".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => rate.parse().ok(),
    }
}

/// Expand glob matches under `input_dir`, sorted for determinism.
pub fn discover_videos(input_dir: &Path, pattern: &str) -> PipelineResult<Vec<PathBuf>> {
    let full = input_dir.join(pattern);
    let full = full
        .to_str()
        .ok_or_else(|| PipelineError::manifest("non-UTF8 input path"))?;
    let mut paths: Vec<PathBuf> = glob::glob(full)
        .map_err(|e| PipelineError::manifest(format!("bad glob pattern: {e}")))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Build video and clip manifest rows for a set of video files.
///
/// Clip bounds are snapped to frame boundaries so `start_s` and `end_s`
/// always agree with `frame_start`/`frame_end` under the probed fps, and
/// `clip_id` is derived from the snapped frames plus the file checksum so
/// repeated invocations produce identical IDs.
pub async fn build_manifests(
    video_paths: &[PathBuf],
    split: &str,
    scenedetect: &SceneDetectSettings,
    prober: &dyn VideoProber,
    detector: &dyn SceneDetector,
) -> PipelineResult<(Vec<VideoRecord>, Vec<ClipRecord>)> {
    let mut videos = Vec::new();
    let mut clips = Vec::new();

    for path in video_paths {
        let probed = prober.probe(path).await?;
        let checksum = sha256_file(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let video_id = sanitize_id(&stem);
        let path_str = path.to_string_lossy().to_string();
        debug!(video_id = %video_id, duration_s = probed.duration_s, "probed video");

        let (scenes, used_fallback) = detector
            .detect(&path_str, probed.duration_s)
            .map_err(|e| PipelineError::manifest(format!("scene detection failed: {e}")))?;

        for (scene_start, scene_end) in scenes {
            let padded_start = (scene_start - scenedetect.overlap_s).max(0.0);
            let padded_end = (scene_end + scenedetect.overlap_s).min(probed.duration_s);
            if padded_end - padded_start < scenedetect.min_scene_len_s {
                continue;
            }
            let frame_start = frames_from_seconds(padded_start, probed.fps);
            let frame_end = frames_from_seconds(padded_end, probed.fps);
            if frame_end <= frame_start {
                continue;
            }
            let start_s = seconds_from_frames(frame_start, probed.fps);
            let end_s = seconds_from_frames(frame_end, probed.fps);
            let checksum_tag = checksum.get(..8).unwrap_or(&checksum);
            clips.push(ClipRecord {
                clip_id: format!("{video_id}-{frame_start:09}-{frame_end:09}-{checksum_tag}"),
                video_id: video_id.clone(),
                start_s,
                end_s,
                frame_start,
                frame_end,
                overlap_s: scenedetect.overlap_s,
                scenedetect_failed: used_fallback,
                status: ClipStatus::Pending,
                last_error: String::new(),
                retry_count: 0,
            });
        }

        videos.push(VideoRecord {
            video_id,
            path: path_str,
            duration_s: probed.duration_s,
            fps: probed.fps,
            width: probed.width,
            height: probed.height,
            audio: probed.audio,
            checksum,
            split: split.to_string(),
        });
    }

    Ok((videos, clips))
}

/// Write manifest rows as JSON-Lines, atomically.
pub fn write_manifest(path: &Path, rows: &[impl serde::Serialize]) -> PipelineResult<()> {
    write_json_lines(path, rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("x/y"), None);
    }

    #[test]
    fn test_load_json_lines_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.jsonl");
        std::fs::write(
            &path,
            "\n{\"clip_id\":\"c1\",\"video_id\":\"v1\",\"start_s\":0.0,\"end_s\":1.0,\
             \"frame_start\":0,\"frame_end\":30}\n\n",
        )
        .unwrap();
        let rows = load_clip_manifest(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].clip_id, "c1");
    }

    #[test]
    fn test_load_rejects_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.jsonl");
        std::fs::write(&path, "{\"clip_id\":}\n").unwrap();
        assert!(load_clip_manifest(&path).is_err());
    }

    #[test]
    fn test_discover_videos_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();
        let found = discover_videos(dir.path(), "*.mp4").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
    }
}
