//! Staged batch run: ingest, derive, flag, filter, tabulate, write.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{Level, debug, error, info, info_span, trace, warn};

use sdd_derive::{ExclusionSummary, build_default_registry, build_flag_registry, publication_filter};
use sdd_ingest::{ReadOptions, RecordSet, read_record_set};
use sdd_model::{SddError, Strategy};
use sdd_tabulate::tabulate;

use crate::config::RunConfig;
use crate::logging::redact_value;
use crate::output::{Manifest, cell_text, write_csv};

pub const DERIVED_PUPIL_FILE: &str = "derived_pupil.csv";
pub const TEACHER_FILE: &str = "teacher.csv";

/// What happened to one table specification.
#[derive(Debug, Clone, PartialEq)]
pub enum TableStatus {
    Written {
        rows: usize,
        path: PathBuf,
        raw_path: Option<PathBuf>,
    },
    /// A configuration error; the run carried on without this table.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableOutcome {
    pub name: String,
    pub strategy: Strategy,
    pub status: TableStatus,
}

impl TableOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self.status, TableStatus::Written { .. })
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub year: String,
    pub output_dir: PathBuf,
    pub derived_path: PathBuf,
    pub teacher_path: Option<PathBuf>,
    pub exclusion: ExclusionSummary,
    pub tables: Vec<TableOutcome>,
    pub manifest_path: PathBuf,
}

impl RunResult {
    pub fn written(&self) -> usize {
        self.tables.iter().filter(|table| table.is_written()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableOutcome> + '_ {
        self.tables.iter().filter(|table| !table.is_written())
    }
}

/// File stem for a table; anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn asset_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Identifiers of every row, as written to CSV.
fn pupil_ids(record_set: &RecordSet, column: &str) -> Result<Vec<String>> {
    let column = record_set
        .data
        .column(column)
        .with_context(|| format!("column `{column}`"))?;
    (0..column.len())
        .map(|idx| {
            column
                .get(idx)
                .map(cell_text)
                .with_context(|| format!("read `{}` row {idx}", column.name()))
        })
        .collect()
}

/// Returns the configuration error carried by `error`, if that is what it is.
fn configuration_error(error: &anyhow::Error) -> Option<&SddError> {
    error
        .downcast_ref::<SddError>()
        .filter(|error| !error.is_structural())
}

/// Runs the whole survey.
///
/// Structural errors halt the run before any table is written. A table
/// specification that fails with a configuration error is recorded as
/// failed and the remaining tables still run.
pub fn run_survey(config: &RunConfig) -> Result<RunResult> {
    let started_at = Utc::now();
    let run_start = Instant::now();
    let params = &config.params;
    let run_span = info_span!("run", year = %params.year, tables = config.tables.tables.len());
    let _run_guard = run_span.enter();

    params.validate()?;
    fs::create_dir_all(&config.output_dir)
        .map_err(|error| SddError::io(&config.output_dir, error))?;

    let (pupils, teachers) = info_span!("ingest").in_scope(|| -> Result<_> {
        let start = Instant::now();
        let pupils = read_record_set(&config.pupil_data, &ReadOptions::pupil(params))
            .with_context(|| format!("read pupil data {}", config.pupil_data.display()))?;
        let teachers = match &config.teacher_data {
            Some(path) => Some(
                read_record_set(path, &ReadOptions::teacher())
                    .with_context(|| format!("read teacher data {}", path.display()))?,
            ),
            None => None,
        };
        info!(
            pupils = pupils.height(),
            columns = pupils.data.width(),
            teachers = teachers.as_ref().map_or(0, RecordSet::height),
            duration_ms = start.elapsed().as_millis(),
            "ingest complete"
        );
        Ok((pupils, teachers))
    })?;

    let derived = info_span!("derive").in_scope(|| -> Result<RecordSet> {
        let start = Instant::now();
        let registry = build_default_registry(params);
        let derived = registry.apply(&pupils).context("apply derivations")?;
        info!(
            derivations = registry.len(),
            columns = derived.data.width(),
            duration_ms = start.elapsed().as_millis(),
            "derive complete"
        );
        Ok(derived)
    })?;

    let flagged = info_span!("flag").in_scope(|| -> Result<RecordSet> {
        let start = Instant::now();
        let registry = build_flag_registry(params);
        let flagged = registry.apply(&derived).context("apply exclusion flags")?;
        info!(
            flags = registry.len(),
            duration_ms = start.elapsed().as_millis(),
            "flag complete"
        );
        Ok(flagged)
    })?;

    let (published, exclusion) = info_span!("filter").in_scope(|| -> Result<_> {
        let start = Instant::now();
        let (published, summary) = publication_filter(&flagged, params)?;
        if tracing::enabled!(Level::TRACE) && flagged.has_column(&params.id_var) {
            let kept: BTreeSet<String> =
                pupil_ids(&published, &params.id_var)?.into_iter().collect();
            for id in pupil_ids(&flagged, &params.id_var)? {
                if !kept.contains(&id) {
                    trace!(pupil = %redact_value(&id), "excluded by publication filter");
                }
            }
        }
        info!(
            excluded = summary.excluded(),
            rows = published.height(),
            duration_ms = start.elapsed().as_millis(),
            "filter complete"
        );
        Ok((published, summary))
    })?;

    let tables = info_span!("tabulate").in_scope(|| -> Result<_> {
        let start = Instant::now();
        let mut tables = Vec::with_capacity(config.tables.tables.len());
        let mut stems = BTreeSet::new();
        for spec in &config.tables.tables {
            let stem = asset_stem(&spec.name);
            if !stems.insert(stem.clone()) {
                let message = format!("table name `{}` is used more than once", spec.name);
                warn!(table = %spec.name, "{message}");
                tables.push((spec, stem, Err(message)));
                continue;
            }
            match tabulate(&published, spec, params) {
                Ok(table) => tables.push((spec, stem, Ok(table))),
                Err(error) => match configuration_error(&error) {
                    Some(cause) => {
                        warn!(table = %spec.name, error = %cause, "table skipped");
                        tables.push((spec, stem, Err(cause.to_string())));
                    }
                    None => {
                        error!(table = %spec.name, error = %error, "run halted");
                        return Err(error.context(format!("tabulate `{}`", spec.name)));
                    }
                },
            }
        }
        info!(
            tables = tables.len(),
            failed = tables.iter().filter(|(_, _, result)| result.is_err()).count(),
            duration_ms = start.elapsed().as_millis(),
            "tabulate complete"
        );
        Ok(tables)
    })?;

    let output_dir = config.output_dir.as_path();
    let result = info_span!("write").in_scope(|| -> Result<RunResult> {
        let start = Instant::now();
        let mut manifest = Manifest::new(started_at.to_rfc3339(), params.year.clone());

        let derived_path = output_dir.join(DERIVED_PUPIL_FILE);
        write_csv(&flagged.data, &derived_path)?;
        manifest.record(output_dir, &derived_path, flagged.height())?;

        let teacher_path = match &teachers {
            Some(teachers) => {
                let path = output_dir.join(TEACHER_FILE);
                write_csv(&teachers.data, &path)?;
                manifest.record(output_dir, &path, teachers.height())?;
                Some(path)
            }
            None => None,
        };

        let mut outcomes = Vec::with_capacity(tables.len());
        for (spec, stem, result) in tables {
            let status = match result {
                Ok(table) => {
                    let path = output_dir.join(format!("{stem}.csv"));
                    write_csv(&table.formatted, &path)?;
                    manifest.record(output_dir, &path, table.height())?;
                    let raw_path = if config.write_raw {
                        let raw_path = output_dir.join(format!("{stem}_raw.csv"));
                        write_csv(&table.raw, &raw_path)?;
                        manifest.record(output_dir, &raw_path, table.height())?;
                        Some(raw_path)
                    } else {
                        None
                    };
                    debug!(table = %spec.name, rows = table.height(), "table written");
                    TableStatus::Written {
                        rows: table.height(),
                        path,
                        raw_path,
                    }
                }
                Err(message) => TableStatus::Failed { message },
            };
            outcomes.push(TableOutcome {
                name: spec.name.clone(),
                strategy: spec.strategy(),
                status,
            });
        }

        let manifest_path = manifest.write(output_dir)?;
        info!(
            assets = manifest.assets.len(),
            duration_ms = start.elapsed().as_millis(),
            "write complete"
        );
        Ok(RunResult {
            started_at,
            year: params.year.clone(),
            output_dir: output_dir.to_path_buf(),
            derived_path,
            teacher_path,
            exclusion,
            tables: outcomes,
            manifest_path,
        })
    })?;

    info!(
        written = result.written(),
        failed = result.failed().count(),
        duration_ms = run_start.elapsed().as_millis(),
        "run complete"
    );
    Ok(result)
}

/// Loads a run file and runs it.
pub fn run_survey_file(path: &Path) -> Result<RunResult> {
    let config = RunConfig::load(path)?;
    run_survey(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_stems_are_file_safe() {
        assert_eq!(asset_stem("cg_by sex/age"), "cg_by_sex_age");
        assert_eq!(asset_stem(" dal-7 "), "dal-7");
    }

    #[test]
    fn structural_errors_are_not_configuration_errors() {
        let structural = anyhow::Error::new(SddError::EmptyRecordSet {
            context: "x".into(),
        });
        assert!(configuration_error(&structural).is_none());
        let configuration = anyhow::Error::new(SddError::UnknownColumn {
            table: "t".into(),
            column: "c".into(),
        })
        .context("tabulate `t`");
        assert!(configuration_error(&configuration).is_some());
        assert!(configuration_error(&anyhow::anyhow!("plain")).is_none());
    }
}
