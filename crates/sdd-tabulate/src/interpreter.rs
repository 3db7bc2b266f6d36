//! Table-spec interpreter.
//!
//! Validates a [`TableSpec`] against the record set, runs its strategy and
//! lays the rows out in long format, sorted by block then breakdown codes
//! (`TOTAL` last) then response.

use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::Result;
use polars::prelude::DataFrame;
use tracing::{debug, info, info_span, warn};

use sdd_ingest::RecordSet;
use sdd_model::{Params, SddError, Strategy, TableQuery, TableSpec};

use crate::filter::{apply_filter, render_filter};
use crate::kernel::{Kernel, Sample};
use crate::table::{ResultRow, formatted_frame, raw_frame};

const NEEDED_BY: &str = "tabulation";

/// A tabulated table in numeric and publication form.
#[derive(Debug, Clone)]
pub struct TabulatedTable {
    pub name: String,
    pub strategy: Strategy,
    /// Numeric results; statistics are nullable floats.
    pub raw: DataFrame,
    /// Statistics as suppression-applied strings.
    pub formatted: DataFrame,
}

impl TabulatedTable {
    pub fn height(&self) -> usize {
        self.raw.height()
    }
}

fn invalid(spec: &TableSpec, message: impl Into<String>) -> SddError {
    SddError::InvalidSpec {
        table: spec.name.clone(),
        message: message.into(),
    }
}

/// Checks the specification's shape; column existence is checked separately.
pub fn validate_spec(spec: &TableSpec) -> Result<(), SddError> {
    if spec.name.trim().is_empty() {
        return Err(invalid(spec, "table name is empty"));
    }
    let mut seen = BTreeSet::new();
    for breakdown in &spec.breakdowns {
        if !seen.insert(breakdown.as_str()) {
            return Err(invalid(spec, format!("breakdown `{breakdown}` listed twice")));
        }
    }
    match &spec.query {
        TableQuery::SingleResponse { .. } => {}
        TableQuery::MultiQuestion { questions, .. } | TableQuery::Statistics { questions, .. } => {
            if questions.is_empty() {
                return Err(invalid(spec, "no questions listed"));
            }
        }
        TableQuery::MultiDiscrete { responses, bases } => {
            if responses.is_empty() {
                return Err(invalid(spec, "no responses listed"));
            }
            if responses.len() != bases.len() {
                return Err(invalid(
                    spec,
                    format!("{} responses but {} bases", responses.len(), bases.len()),
                ));
            }
        }
        TableQuery::MultiContinuous { responses, .. } => {
            if responses.is_empty() {
                return Err(invalid(spec, "no responses listed"));
            }
        }
    }
    for subgroup in spec.query.subgroups() {
        if subgroup.codes.is_empty() {
            return Err(invalid(
                spec,
                format!("subgroup {} lists no codes", subgroup.code),
            ));
        }
    }
    let questions = spec.query.columns();
    if let Some(clash) = spec.breakdowns.iter().find(|b| questions.contains(&b.as_str())) {
        return Err(invalid(
            spec,
            format!("`{clash}` is both a breakdown and a question"),
        ));
    }
    Ok(())
}

fn kernel<'a>(sample: &'a Sample, spec: &'a TableSpec) -> Kernel<'a> {
    Kernel {
        sample,
        table: spec.name.as_str(),
        variance: spec.variance,
    }
}

/// Tabulates one specification.
///
/// Structural problems (empty record set, missing design columns, missing
/// weights) and configuration problems (unknown columns, bad filters,
/// subgroup collisions, malformed specifications) are returned as
/// [`SddError`]s inside the `anyhow::Error`.
pub fn tabulate(record_set: &RecordSet, spec: &TableSpec, params: &Params) -> Result<TabulatedTable> {
    let span = info_span!(
        "tabulate",
        table = %spec.name,
        strategy = spec.strategy().display_name()
    );
    let _guard = span.enter();
    let start = Instant::now();

    if record_set.is_empty() {
        return Err(SddError::EmptyRecordSet {
            context: format!("nothing to tabulate for `{}`", spec.name),
        }
        .into());
    }
    for column in [&params.weighting_var, &params.strata, &params.psu] {
        record_set.require(column, NEEDED_BY)?;
    }
    validate_spec(spec)?;
    for column in spec.referenced_columns() {
        if !record_set.has_column(column) {
            return Err(SddError::UnknownColumn {
                table: spec.name.clone(),
                column: column.to_string(),
            }
            .into());
        }
    }

    let sample = |question: Option<&str>| -> Result<Sample> {
        let filtered = match (&spec.filter, question) {
            (Some(filter), Some(question)) => {
                apply_filter(record_set, &spec.name, &render_filter(filter, question))?
            }
            (Some(filter), None) => apply_filter(record_set, &spec.name, filter)?,
            (None, _) => record_set.clone(),
        };
        if filtered.is_empty() {
            warn!(?question, "filter leaves no rows");
        }
        debug!(rows = filtered.height(), "sample selected");
        Sample::new(filtered, &spec.breakdowns, params)
    };

    let mut rows: Vec<ResultRow> = Vec::new();
    let question_label = match &spec.query {
        TableQuery::SingleResponse { question, subgroup } => {
            let sample = sample(None)?;
            rows.extend(kernel(&sample, spec).single_response(0, question, subgroup)?);
            question.clone()
        }
        TableQuery::MultiQuestion { questions, subgroup } => {
            for (block, question) in questions.iter().enumerate() {
                let sample = sample(Some(question.as_str()))?;
                rows.extend(kernel(&sample, spec).single_response(block, question, subgroup)?);
            }
            String::new()
        }
        TableQuery::MultiDiscrete { responses, bases } => {
            let sample = sample(None)?;
            for (block, (response, base)) in responses.iter().zip(bases).enumerate() {
                rows.extend(kernel(&sample, spec).multi_discrete(block, response, base)?);
            }
            String::new()
        }
        TableQuery::MultiContinuous { responses, base } => {
            let sample = sample(None)?;
            for (block, response) in responses.iter().enumerate() {
                rows.extend(kernel(&sample, spec).multi_continuous(block, response, base)?);
            }
            String::new()
        }
        TableQuery::Statistics { questions, base } => {
            let sample = sample(None)?;
            for (block, question) in questions.iter().enumerate() {
                rows.extend(kernel(&sample, spec).statistics(block, question, base)?);
            }
            String::new()
        }
    };

    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let year = spec.year.as_deref().unwrap_or(&params.year);
    let strategy = spec.strategy();
    let raw = raw_frame(&rows, strategy, &spec.breakdowns, &question_label, year)?;
    let formatted = formatted_frame(&rows, strategy, &spec.breakdowns, &question_label, year)?;

    info!(
        rows = rows.len(),
        duration_ms = start.elapsed().as_millis(),
        "table tabulated"
    );
    Ok(TabulatedTable {
        name: spec.name.clone(),
        strategy,
        raw,
        formatted,
    })
}
