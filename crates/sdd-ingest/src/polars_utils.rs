//! Polars value helpers.
//!
//! Conversions between Polars columns and the plain numeric vectors the
//! derivation and tabulation code works on.

use anyhow::{Context, Result};
use polars::prelude::{DataFrame, DataType};

/// Parses a string as f64, returning None for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Formats a floating-point number as a string without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Reads a column as nullable f64 values, casting integer columns.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("column `{name}`"))?;
    let cast = column
        .cast(&DataType::Float64)
        .with_context(|| format!("cast `{name}` to f64"))?;
    let values = cast.f64().with_context(|| format!("read `{name}` as f64"))?;
    Ok(values.into_iter().collect())
}

/// Reads a column as f64 values with nulls replaced by `fill`.
pub fn column_f64_filled(df: &DataFrame, name: &str, fill: f64) -> Result<Vec<f64>> {
    Ok(column_f64(df, name)?
        .into_iter()
        .map(|value| value.unwrap_or(fill))
        .collect())
}
