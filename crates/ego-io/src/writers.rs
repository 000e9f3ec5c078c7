//! Atomic artifact writers.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Builder, Float64Builder, Int64Builder, ListBuilder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;

use ego_models::{MaskFrame, ParquetSettings, PoseFrame};

use crate::error::OutputResult;

/// Write a JSON document to `path` via the tmp-then-rename protocol.
/// Idempotent: rewriting the same payload yields an identical file.
pub fn write_json(path: impl AsRef<Path>, payload: &impl Serialize) -> OutputResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    let mut body = serde_json::to_vec_pretty(payload)?;
    body.push(b'\n');
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write rows as JSON-Lines, atomically.
pub fn write_json_lines<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> OutputResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    let mut body = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut body, row)?;
        body.push(b'\n');
    }
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a mask table: `frame_index` int64, `timestamp_s` float64,
/// `mask_rle` string.
pub fn write_mask_table(
    path: impl AsRef<Path>,
    rows: &[MaskFrame],
    parquet: &ParquetSettings,
) -> OutputResult<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("frame_index", DataType::Int64, false),
        Field::new("timestamp_s", DataType::Float64, false),
        Field::new("mask_rle", DataType::Utf8, false),
    ]));

    let mut frame_index = Int64Builder::new();
    let mut timestamp_s = Float64Builder::new();
    let mut mask_rle = StringBuilder::new();
    for row in rows {
        frame_index.append_value(row.frame_index);
        timestamp_s.append_value(row.timestamp_s);
        mask_rle.append_value(&row.mask_rle);
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(frame_index.finish()),
        Arc::new(timestamp_s.finish()),
        Arc::new(mask_rle.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_parquet(path.as_ref(), schema, batch, parquet)
}

/// Write a pose table: `frame_index` int64, `timestamp_s` float64,
/// `pose` list<float32>. Used for hand pose, object pose, and mapping.
pub fn write_pose_table(
    path: impl AsRef<Path>,
    rows: &[PoseFrame],
    parquet: &ParquetSettings,
) -> OutputResult<()> {
    let pose_item = Arc::new(Field::new("item", DataType::Float32, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("frame_index", DataType::Int64, false),
        Field::new("timestamp_s", DataType::Float64, false),
        Field::new("pose", DataType::List(pose_item), false),
    ]));

    let mut frame_index = Int64Builder::new();
    let mut timestamp_s = Float64Builder::new();
    let mut pose = ListBuilder::new(Float32Builder::new());
    for row in rows {
        frame_index.append_value(row.frame_index);
        timestamp_s.append_value(row.timestamp_s);
        pose.values().append_slice(&row.pose);
        pose.append(true);
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(frame_index.finish()),
        Arc::new(timestamp_s.finish()),
        Arc::new(pose.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_parquet(path.as_ref(), schema, batch, parquet)
}

fn write_parquet(
    path: &Path,
    schema: Arc<Schema>,
    batch: RecordBatch,
    parquet: &ParquetSettings,
) -> OutputResult<()> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    let props = WriterProperties::builder()
        .set_compression(compression_from(&parquet.compression))
        .set_max_row_group_size(parquet.row_group_size.max(1))
        .set_data_page_size_limit(parquet.data_page_size.max(1))
        .build();
    let file = File::create(&tmp)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn compression_from(name: &str) -> Compression {
    match name.to_ascii_lowercase().as_str() {
        "snappy" => Compression::SNAPPY,
        "none" | "uncompressed" => Compression::UNCOMPRESSED,
        // zstd is the configured default; unknown names fall back to it.
        _ => Compression::ZSTD(ZstdLevel::default()),
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Sibling `P.tmp` path; same directory, so the final rename is atomic.
fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
