//! Pipeline configuration tree.
//!
//! Loaded from a JSON/YAML/TOML file via the `config` crate; every section
//! has serde defaults so a minimal file only names what it overrides. The
//! resolved configuration is snapshotted into the run manifest at run start.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Parquet writer parameters, embedded verbatim into the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ParquetSettings {
    pub compression: String,
    /// Max rows per row group
    pub row_group_size: usize,
    /// Data page size limit in bytes
    pub data_page_size: usize,
    pub partition: Vec<String>,
}

impl Default for ParquetSettings {
    fn default() -> Self {
        Self {
            compression: "zstd".to_string(),
            row_group_size: 256 * 1024 * 1024,
            data_page_size: 8 * 1024 * 1024,
            partition: vec![
                "run_id".to_string(),
                "video_id".to_string(),
                "clip_id".to_string(),
            ],
        }
    }
}

/// In-flight caps for the two pipeline stages.
///
/// Unset caps resolve to `2 × num_gpus`. A cap of zero disables the stage's
/// gate entirely; the driver must not submit to a disabled stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BackpressureLimits {
    pub max_in_flight_gpu: Option<usize>,
    pub max_in_flight_write: Option<usize>,
}

impl BackpressureLimits {
    pub fn resolve(&self, num_gpus: usize) -> ResolvedBackpressure {
        let multiplier = 2;
        ResolvedBackpressure {
            max_in_flight_gpu: self.max_in_flight_gpu.unwrap_or(multiplier * num_gpus),
            max_in_flight_write: self.max_in_flight_write.unwrap_or(multiplier * num_gpus),
        }
    }
}

/// Backpressure caps with defaults applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedBackpressure {
    pub max_in_flight_gpu: usize,
    pub max_in_flight_write: usize,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_s: f64,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_s: 5.0,
            backoff: 3.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `attempt`-th submission (1-based):
    /// `base_delay_s × backoff^(attempt − 1)`.
    pub fn next_delay_s(&self, attempt: u32) -> f64 {
        self.base_delay_s * self.backoff.powi(attempt.saturating_sub(1) as i32)
    }
}

/// Scene detection settings used by manifest construction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SceneDetectSettings {
    pub method: String,
    pub min_scene_len_s: f64,
    pub fallback_full_clip: bool,
    pub overlap_s: f64,
}

impl Default for SceneDetectSettings {
    fn default() -> Self {
        Self {
            method: "scenedetect".to_string(),
            min_scene_len_s: 1.0,
            fallback_full_clip: true,
            overlap_s: 1.0,
        }
    }
}

/// Coordinate conventions stamped into every clip's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CoordinateSpec {
    pub spec_version: String,
    pub time_base: String,
    pub mask_encoding: String,
    pub length_unit: String,
    pub handedness: String,
    pub quat_order: String,
    pub frame_index_base: u32,
    pub axis_order: String,
    pub coord_frame: String,
}

impl Default for CoordinateSpec {
    fn default() -> Self {
        Self {
            spec_version: "v1".to_string(),
            time_base: "seconds".to_string(),
            mask_encoding: "rle".to_string(),
            length_unit: "meters".to_string(),
            handedness: "right".to_string(),
            quat_order: "wxyz".to_string(),
            frame_index_base: 0,
            axis_order: "x,y,z".to_string(),
            coord_frame: "camera".to_string(),
        }
    }
}

/// Alerting thresholds for the metrics sink (informational in core).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetricsThresholds {
    pub gpu_util_min: f64,
    pub gpu_util_window_s: u64,
    pub failure_rate_max: f64,
    pub empty_mask_rate_max: f64,
}

impl Default for MetricsThresholds {
    fn default() -> Self {
        Self {
            gpu_util_min: 0.60,
            gpu_util_window_s: 600,
            failure_rate_max: 0.01,
            empty_mask_rate_max: 0.20,
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PathSettings {
    pub data_root: String,
    pub output_root: String,
    pub manifest_path: String,
    pub state_db_path: String,
    pub runlog_path: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_root: "./data".to_string(),
            output_root: "./output".to_string(),
            manifest_path: "./manifests".to_string(),
            state_db_path: "./state/pipeline.db".to_string(),
            runlog_path: "./runlog.md".to_string(),
        }
    }
}

/// Per-operator toggle and opaque parameter block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OperatorSettings {
    pub enabled: bool,
    pub params: serde_json::Value,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            params: serde_json::Value::Object(Default::default()),
        }
    }
}

impl OperatorSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }
}

/// The operator chain's configuration blocks.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OperatorsSettings {
    pub segmentation: OperatorSettings,
    pub hand_pose: OperatorSettings,
    pub object_pose: OperatorSettings,
    pub retarget: OperatorSettings,
}

impl Default for OperatorsSettings {
    fn default() -> Self {
        Self {
            segmentation: OperatorSettings::enabled(),
            hand_pose: OperatorSettings::default(),
            object_pose: OperatorSettings::default(),
            retarget: OperatorSettings::default(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    pub num_gpus: usize,
    pub parquet: ParquetSettings,
    pub backpressure: BackpressureLimits,
    pub retry: RetryPolicy,
    pub scenedetect: SceneDetectSettings,
    pub coordinates: CoordinateSpec,
    pub metrics: MetricsThresholds,
    pub paths: PathSettings,
    pub operators: OperatorsSettings,
    pub run_id: Option<String>,
    pub model_versions: BTreeMap<String, String>,
    pub dataset_hash: Option<String>,
    pub code_git_hash: Option<String>,
    pub extra: serde_json::Value,
}

impl PipelineConfig {
    /// Snapshot of this config for the run manifest, with `parquet_params`
    /// and `model_versions` flattened to JSON strings and the coordinate
    /// spec fields lifted to the top level.
    pub fn to_run_manifest(&self) -> Result<serde_json::Value, ConfigError> {
        let mut doc = serde_json::to_value(self)?;
        let map = doc
            .as_object_mut()
            .expect("config serializes to an object");
        map.insert(
            "parquet_params".to_string(),
            serde_json::Value::String(serde_json::to_string(&self.parquet)?),
        );
        map.insert(
            "model_versions".to_string(),
            serde_json::Value::String(serde_json::to_string(&self.model_versions)?),
        );
        map.insert(
            "coordinate_spec_version".to_string(),
            serde_json::Value::String(self.coordinates.spec_version.clone()),
        );
        map.insert(
            "mask_encoding".to_string(),
            serde_json::Value::String(self.coordinates.mask_encoding.clone()),
        );
        map.insert(
            "time_base".to_string(),
            serde_json::Value::String(self.coordinates.time_base.clone()),
        );
        Ok(doc)
    }
}

/// Load a pipeline config from a JSON/YAML/TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Default run id: UTC timestamp, second resolution.
pub fn make_run_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
