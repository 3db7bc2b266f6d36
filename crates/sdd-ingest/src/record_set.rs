//! Record set: respondent rows with column-kind metadata.
//!
//! A [`RecordSet`] wraps a Polars DataFrame with the out-of-band kind of
//! every column (discrete, continuous, non-measure). It is the value passed
//! through the derivation order and handed to the tabulator.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use polars::prelude::{BooleanChunked, DataFrame, NamedFrom, NewChunkedArray, Series};

use sdd_model::{ColumnKind, Response, SddError};

use crate::polars_utils::column_f64;

/// Respondent rows plus the kind of each column.
#[derive(Debug, Clone)]
pub struct RecordSet {
    /// One row per respondent.
    pub data: DataFrame,
    /// Kind of each column; columns absent from the map are discrete.
    pub kinds: BTreeMap<String, ColumnKind>,
}

impl RecordSet {
    pub fn new(data: DataFrame, kinds: BTreeMap<String, ColumnKind>) -> Self {
        Self { data, kinds }
    }

    /// Wraps a frame, treating every column as discrete.
    pub fn from_frame(data: DataFrame) -> Self {
        Self {
            data,
            kinds: BTreeMap::new(),
        }
    }

    /// Returns the number of respondents.
    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }

    pub fn kind(&self, name: &str) -> ColumnKind {
        self.kinds.get(name).copied().unwrap_or_default()
    }

    /// Fails with a structural error when the column is absent.
    pub fn require(&self, name: &str, needed_by: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(SddError::MissingColumn {
                column: name.to_string(),
                needed_by: needed_by.to_string(),
            }
            .into())
        }
    }

    /// Nullable numeric values of a column.
    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        column_f64(&self.data, name)
    }

    /// Column values classified as responses; nulls are item missing.
    pub fn responses(&self, name: &str) -> Result<Vec<Response>> {
        Ok(self
            .values(name)?
            .into_iter()
            .map(Response::from_option)
            .collect())
    }

    /// Adds or replaces a numeric column.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>, kind: ColumnKind) -> Result<()> {
        let series = Series::new(name.into(), values);
        self.data
            .with_column(series)
            .with_context(|| format!("set column `{name}`"))?;
        self.kinds.insert(name.to_string(), kind);
        Ok(())
    }

    /// Removes the named columns that are present; returns the ones removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for name in names {
            if self.has_column(name) {
                self.data
                    .drop_in_place(name)
                    .with_context(|| format!("drop column `{name}`"))?;
                self.kinds.remove(name);
                dropped.push(name.clone());
            }
        }
        Ok(dropped)
    }

    /// Keeps the rows whose mask entry is true.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        let data = self.data.filter(&mask).context("filter record set")?;
        Ok(Self {
            data,
            kinds: self.kinds.clone(),
        })
    }

    /// Replaces the frame, keeping kinds for the columns that survive.
    pub fn with_data(&self, data: DataFrame) -> Self {
        let kinds = self
            .kinds
            .iter()
            .filter(|(name, _)| data.column(name.as_str()).is_ok())
            .map(|(name, kind)| (name.clone(), *kind))
            .collect();
        Self { data, kinds }
    }
}
