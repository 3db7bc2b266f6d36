use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use tracing::{debug, warn};

use sdd_model::{ColumnKind, MissingCode, Params, SddError};

use crate::polars_utils::parse_f64;
use crate::record_set::RecordSet;

/// How a survey file is read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Columns that are never measures; nulls are kept as nulls.
    pub key_columns: BTreeSet<String>,
    /// Legacy columns discarded after reading.
    pub drop_columns: Vec<String>,
    /// Fail when the file has no data rows.
    pub require_rows: bool,
}

impl ReadOptions {
    /// Options for the pupil record set.
    pub fn pupil(params: &Params) -> Self {
        let mut key_columns: BTreeSet<String> = params
            .key_columns()
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
        key_columns.insert(params.volunteer_school_var.to_lowercase());
        key_columns.insert("year".to_string());
        Self {
            key_columns,
            drop_columns: params
                .drop_columns
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            require_rows: true,
        }
    }

    /// Options for the teacher record set, which is passed through.
    pub fn teacher() -> Self {
        Self::default()
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_lowercase()
}

fn normalize_cell(raw: &str) -> &str {
    raw.trim().trim_matches('\u{feff}')
}

enum ParsedColumn {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

fn parse_column(name: &str, cells: Vec<&str>, is_key: bool) -> (ParsedColumn, ColumnKind) {
    let mut values = Vec::with_capacity(cells.len());
    for cell in &cells {
        if cell.is_empty() {
            values.push(None);
            continue;
        }
        match parse_f64(cell) {
            Some(value) => values.push(Some(value)),
            None => {
                warn!(column = %name, "non-numeric values, column kept as text");
                let text = cells
                    .iter()
                    .map(|cell| (!cell.is_empty()).then(|| (*cell).to_string()))
                    .collect();
                return (ParsedColumn::Text(text), ColumnKind::NonMeasure);
            }
        }
    }
    if is_key {
        return (ParsedColumn::Numeric(values), ColumnKind::NonMeasure);
    }
    let integral = values
        .iter()
        .flatten()
        .all(|value| value.fract() == 0.0);
    let kind = if integral {
        ColumnKind::Discrete
    } else {
        ColumnKind::Continuous
    };
    // Blank measure cells are item missing.
    let filled = values
        .into_iter()
        .map(|value| Some(value.unwrap_or(MissingCode::NoAnswer.value())))
        .collect();
    (ParsedColumn::Numeric(filled), kind)
}

/// Reads a survey CSV into a record set.
///
/// Headers are lower-cased, measure columns are numeric with blanks read as
/// -9, key columns keep blanks as nulls, and columns with non-numeric
/// content are kept as text.
pub fn read_record_set(path: &Path, options: &ReadOptions) -> Result<RecordSet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|error| match error.into_kind() {
            csv::ErrorKind::Io(source) => anyhow::Error::new(SddError::io(path, source)),
            other => anyhow::anyhow!("read csv {}: {other:?}", path.display()),
        })?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("read header: {}", path.display()))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows: Vec<csv::StringRecord> = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read record: {}", path.display()))?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }
    if rows.is_empty() && options.require_rows {
        return Err(SddError::EmptyRecordSet {
            context: path.display().to_string(),
        }
        .into());
    }

    let mut seen = BTreeSet::new();
    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    let mut kinds = BTreeMap::new();
    for (idx, name) in headers.iter().enumerate() {
        if name.is_empty() || !seen.insert(name.clone()) {
            warn!(column = %name, position = idx, "skipping blank or duplicate header");
            continue;
        }
        let cells: Vec<&str> = rows
            .iter()
            .map(|row| row.get(idx).map(normalize_cell).unwrap_or(""))
            .collect();
        let is_key = options.key_columns.contains(name);
        let (parsed, kind) = parse_column(name, cells, is_key);
        let series = match parsed {
            ParsedColumn::Numeric(values) => Series::new(name.as_str().into(), values),
            ParsedColumn::Text(values) => Series::new(name.as_str().into(), values),
        };
        columns.push(series.into());
        kinds.insert(name.clone(), kind);
    }

    let data = DataFrame::new(columns)
        .with_context(|| format!("build frame: {}", path.display()))?;
    let mut record_set = RecordSet::new(data, kinds);
    let dropped = record_set.drop_columns(&options.drop_columns)?;
    debug!(
        path = %path.display(),
        rows = record_set.height(),
        columns = record_set.data.width(),
        dropped = dropped.len(),
        "record set loaded"
    );
    Ok(record_set)
}
