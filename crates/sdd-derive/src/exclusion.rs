//! Publication filter and modelling preparation.

use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use sdd_ingest::RecordSet;
use sdd_model::{Params, SddError};

use crate::flags::{ALCOHOL_FLAG, CIGARETTE_FLAG, DUMMY_DRUG_FLAG};

/// Rows removed by the publication filter, per reason.
///
/// A row can be counted under more than one reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionSummary {
    pub input_rows: usize,
    pub dummy_drug: usize,
    pub cigarette_outlier: usize,
    pub alcohol_outlier: usize,
    pub volunteer_school: usize,
    pub missing_weight: usize,
    pub output_rows: usize,
}

impl ExclusionSummary {
    pub fn excluded(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

impl fmt::Display for ExclusionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} rows kept (dummy drug {}, cigarettes {}, alcohol {}, volunteer school {}, no weight {})",
            self.output_rows,
            self.input_rows,
            self.dummy_drug,
            self.cigarette_outlier,
            self.alcohol_outlier,
            self.volunteer_school,
            self.missing_weight
        )
    }
}

fn flag_raised(values: &[Option<f64>], idx: usize) -> bool {
    values[idx] == Some(1.0)
}

/// Drops flagged records, volunteer-school pupils and rows without a usable
/// weight.
///
/// `INCLUDE_DUMMY_DRUG` and `INCLUDE_OUTLIERS` keep the corresponding rows.
pub fn publication_filter(
    record_set: &RecordSet,
    params: &Params,
) -> Result<(RecordSet, ExclusionSummary)> {
    const CONTEXT: &str = "publication filter";
    for column in [DUMMY_DRUG_FLAG, CIGARETTE_FLAG, ALCOHOL_FLAG] {
        record_set.require(column, CONTEXT)?;
    }
    record_set.require(&params.weighting_var, CONTEXT)?;

    let dummy = record_set.values(DUMMY_DRUG_FLAG)?;
    let cigarettes = record_set.values(CIGARETTE_FLAG)?;
    let alcohol = record_set.values(ALCOHOL_FLAG)?;
    let weights = record_set.values(&params.weighting_var)?;
    let volunteer = if record_set.has_column(&params.volunteer_school_var) {
        Some(record_set.values(&params.volunteer_school_var)?)
    } else {
        warn!(
            column = %params.volunteer_school_var,
            "volunteer school column absent, no rows dropped for it"
        );
        None
    };

    let mut summary = ExclusionSummary {
        input_rows: record_set.height(),
        ..ExclusionSummary::default()
    };
    let mut keep = Vec::with_capacity(record_set.height());
    for idx in 0..record_set.height() {
        let mut kept = true;
        if flag_raised(&dummy, idx) {
            summary.dummy_drug += 1;
            kept &= params.include_dummy_drug;
        }
        if flag_raised(&cigarettes, idx) {
            summary.cigarette_outlier += 1;
            kept &= params.include_outliers;
        }
        if flag_raised(&alcohol, idx) {
            summary.alcohol_outlier += 1;
            kept &= params.include_outliers;
        }
        if volunteer.as_ref().is_some_and(|values| flag_raised(values, idx)) {
            summary.volunteer_school += 1;
            kept = false;
        }
        if !weights[idx].is_some_and(|weight| weight.is_finite() && weight > 0.0) {
            summary.missing_weight += 1;
            kept = false;
        }
        keep.push(kept);
    }

    let filtered = record_set.filter_rows(&keep)?;
    summary.output_rows = filtered.height();
    info!(
        input_rows = summary.input_rows,
        output_rows = summary.output_rows,
        dummy_drug = summary.dummy_drug,
        cigarette_outlier = summary.cigarette_outlier,
        alcohol_outlier = summary.alcohol_outlier,
        volunteer_school = summary.volunteer_school,
        missing_weight = summary.missing_weight,
        "publication filter applied"
    );
    if filtered.is_empty() {
        return Err(SddError::EmptyRecordSet {
            context: "no rows left after the publication filter".to_string(),
        }
        .into());
    }
    Ok((filtered, summary))
}

/// Collapses -7, -8 and -1 to -9 in the named columns, for statistical
/// modelling.
pub fn collapse_for_modelling(record_set: &RecordSet, columns: &[String]) -> Result<RecordSet> {
    let mut collapsed = record_set.clone();
    for column in columns {
        record_set.require(column, "modelling collapse")?;
        let values = record_set
            .values(column)?
            .into_iter()
            .map(|value| sdd_model::collapse_for_modelling(value.unwrap_or(-9.0)))
            .collect();
        collapsed.set_column(column, values, record_set.kind(column))?;
    }
    Ok(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, NamedFrom, Series};

    fn record_set() -> RecordSet {
        let columns = vec![
            Series::new("dflagdummy".into(), vec![0.0, 1.0, 0.0, 0.0, 0.0]).into(),
            Series::new("dflagcig".into(), vec![0.0, 0.0, 1.0, 0.0, 0.0]).into(),
            Series::new("dflagalc".into(), vec![0.0, 0.0, 1.0, 0.0, 0.0]).into(),
            Series::new("volsch".into(), vec![0.0, 0.0, 0.0, 1.0, 0.0]).into(),
            Series::new("pupilwt".into(), vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0), None])
                .into(),
        ];
        RecordSet::from_frame(DataFrame::new(columns).unwrap())
    }

    #[test]
    fn drops_each_reason() {
        let (filtered, summary) = publication_filter(&record_set(), &Params::default()).unwrap();
        assert_eq!(filtered.height(), 1);
        assert_eq!(summary.dummy_drug, 1);
        assert_eq!(summary.cigarette_outlier, 1);
        assert_eq!(summary.alcohol_outlier, 1);
        assert_eq!(summary.volunteer_school, 1);
        assert_eq!(summary.missing_weight, 1);
        assert_eq!(summary.excluded(), 4);
    }

    #[test]
    fn toggles_keep_flagged_rows() {
        let params = Params {
            include_dummy_drug: true,
            include_outliers: true,
            ..Params::default()
        };
        let (filtered, _) = publication_filter(&record_set(), &params).unwrap();
        assert_eq!(filtered.height(), 3);
    }

    #[test]
    fn modelling_collapse_rewrites_sentinels() {
        let data = DataFrame::new(vec![
            Series::new("q".into(), vec![1.0, -7.0, -8.0, -1.0]).into(),
        ])
        .unwrap();
        let collapsed =
            collapse_for_modelling(&RecordSet::from_frame(data), &["q".to_string()]).unwrap();
        assert_eq!(
            collapsed.values("q").unwrap(),
            vec![Some(1.0), Some(-9.0), Some(-9.0), Some(-9.0)]
        );
    }
}
