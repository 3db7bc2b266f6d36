//! CSV assets and the output manifest.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::{AnyValue, DataFrame};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use sdd_ingest::polars_utils::format_numeric;

/// Buffer size for reading files during checksum computation.
const BUFFER_SIZE: usize = 65536;

pub const MANIFEST_FILE: &str = "manifest.json";

/// CSV text of a cell; nulls are empty.
pub(crate) fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(text) => text.to_string(),
        AnyValue::StringOwned(text) => text.to_string(),
        AnyValue::Boolean(flag) => u8::from(flag).to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        other => other.to_string(),
    }
}

/// Writes a frame as CSV with a header row. Nulls are written as empty cells.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    let names: Vec<&str> = df.get_column_names().iter().map(|name| name.as_str()).collect();
    writer
        .write_record(&names)
        .with_context(|| format!("write header: {}", path.display()))?;
    let columns = df.get_columns();
    let mut record = Vec::with_capacity(columns.len());
    for idx in 0..df.height() {
        record.clear();
        for column in columns {
            let value = column
                .get(idx)
                .with_context(|| format!("read `{}` row {idx}", column.name()))?;
            record.push(cell_text(value));
        }
        writer
            .write_record(&record)
            .with_context(|| format!("write row {idx}: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    debug!(path = %path.display(), rows = df.height(), "csv written");
    Ok(())
}

/// Compute the SHA256 hash of a file.
pub fn compute_file_sha256(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// One written asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the output directory.
    pub path: String,
    pub sha256: String,
    pub rows: usize,
}

/// Index of everything a run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// RFC 3339 start time of the run.
    pub generated_at: String,
    pub year: String,
    pub assets: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(generated_at: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            generated_at: generated_at.into(),
            year: year.into(),
            assets: Vec::new(),
        }
    }

    /// Hashes `path` and records it.
    pub fn record(&mut self, output_dir: &Path, path: &Path, rows: usize) -> Result<()> {
        let sha256 = compute_file_sha256(path)?;
        let relative = path.strip_prefix(output_dir).unwrap_or(path);
        self.assets.push(ManifestEntry {
            path: relative.display().to_string(),
            sha256,
            rows,
        });
        Ok(())
    }

    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).context("serialize manifest")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
    }
}
