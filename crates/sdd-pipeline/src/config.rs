//! Run configuration: parameters, table specifications and file locations.
//!
//! A run file ties the pieces together:
//!
//! ```toml
//! pupil_data = "data/pupils.csv"
//! teacher_data = "data/teachers.csv"
//! params = "params.toml"
//! tables = "tables.toml"
//! output_dir = "output"
//! ```
//!
//! Relative paths resolve against the run file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use sdd_model::{Params, SddError, TableSpecList};

/// Everything a batch run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pupil_data: PathBuf,
    /// Teacher survey, written through unchanged.
    pub teacher_data: Option<PathBuf>,
    pub params: Params,
    pub tables: TableSpecList,
    pub output_dir: PathBuf,
    /// Also write the numeric form of every table.
    pub write_raw: bool,
}

impl RunConfig {
    pub fn new(pupil_data: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pupil_data: pupil_data.into(),
            teacher_data: None,
            params: Params::default(),
            tables: TableSpecList::default(),
            output_dir: output_dir.into(),
            write_raw: true,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_tables(mut self, tables: TableSpecList) -> Self {
        self.tables = tables;
        self
    }

    #[must_use]
    pub fn with_teacher_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.teacher_data = Some(path.into());
        self
    }

    /// Loads a run file and the parameter and table files it names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read(path)?;
        let file: RunFile = toml::from_str(&content)
            .map_err(|error| SddError::Config(format!("{}: {error}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resolve = |relative: &Path| base.join(relative);

        let params = match &file.params {
            Some(params) => load_params(&resolve(params))?,
            None => Params::default(),
        };
        let tables = match &file.tables {
            Some(tables) => load_table_specs(&resolve(tables))?,
            None => TableSpecList::default(),
        };
        info!(
            run_file = %path.display(),
            tables = tables.tables.len(),
            year = %params.year,
            "run configuration loaded"
        );
        Ok(Self {
            pupil_data: resolve(&file.pupil_data),
            teacher_data: file.teacher_data.as_deref().map(resolve),
            params,
            tables,
            output_dir: resolve(&file.output_dir),
            write_raw: file.write_raw,
        })
    }
}

fn default_write_raw() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RunFile {
    pupil_data: PathBuf,
    #[serde(default)]
    teacher_data: Option<PathBuf>,
    #[serde(default)]
    params: Option<PathBuf>,
    #[serde(default)]
    tables: Option<PathBuf>,
    output_dir: PathBuf,
    #[serde(default = "default_write_raw")]
    write_raw: bool,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|error| SddError::io(path, error).into())
}

/// Reads and validates a TOML parameters file.
pub fn load_params(path: &Path) -> Result<Params> {
    let content = read(path)?;
    let params: Params = toml::from_str(&content)
        .map_err(|error| SddError::Config(format!("{}: {error}", path.display())))?;
    params
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(params)
}

/// Reads table specifications from TOML (`[[table]]`) or JSON, by extension.
pub fn load_table_specs(path: &Path) -> Result<TableSpecList> {
    let content = read(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let specs = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .map_err(|error| SddError::Config(format!("{}: {error}", path.display())))?,
        Some("toml") => toml::from_str(&content)
            .map_err(|error| SddError::Config(format!("{}: {error}", path.display())))?,
        _ => {
            return Err(SddError::Config(format!(
                "{}: table specifications must be .toml or .json",
                path.display()
            ))
            .into());
        }
    };
    Ok(specs)
}
