//! Long-format result rows and their frame layout.

use anyhow::{Context, Result};
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use sdd_model::Strategy;

use crate::suppress::{ERROR_DP, VALUE_DP, suppress};
use crate::variance::Estimate;

pub const YEAR: &str = "Year";
pub const BREAKDOWN_TYPE: &str = "Breakdown_type";
pub const QUESTION: &str = "Question";
pub const RESPONSE: &str = "Response";
pub const NUMER_W: &str = "NumerW";
pub const NUMER_U: &str = "NumerU";
pub const DENOM_W: &str = "DenomW";
pub const DENOM_TOTAL_W: &str = "DenomTotalW";
pub const DENOM_U: &str = "DenomU";
pub const PERCENTAGE: &str = "Percentage";
pub const MEAN: &str = "Mean";
pub const MEDIAN: &str = "Median";
pub const STD_ERR: &str = "std_err";
pub const LOWER_CI: &str = "lower_ci";
pub const UPPER_CI: &str = "upper_ci";
pub const DEFF: &str = "deff";

/// One marginal cell of a tabulated table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Position of the question in the specification; orders the output.
    pub block: usize,
    pub breakdown_type: String,
    /// Breakdown codes, `TOTAL` for aggregated breakdowns.
    pub keys: Vec<i64>,
    pub question: String,
    /// Response code; absent for strategies with one row per question.
    pub response: Option<i64>,
    pub numer_w: f64,
    pub numer_u: usize,
    pub denom_w: f64,
    pub denom_u: usize,
    pub denom_total_w: Option<f64>,
    /// Percentage, or the mean for statistics tables.
    pub value: Option<f64>,
    pub median: Option<f64>,
    pub estimate: Option<Estimate>,
}

impl ResultRow {
    pub fn sort_key(&self) -> (usize, &[i64], i64) {
        (self.block, &self.keys, self.response.unwrap_or(i64::MIN))
    }
}

/// How the question is laid out for a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionLayout {
    /// A column named after the question holds the response codes.
    Named,
    /// `Question` and `Response` columns.
    QuestionResponse,
    /// A `Question` column only.
    QuestionOnly,
}

fn question_layout(strategy: Strategy) -> QuestionLayout {
    match strategy {
        Strategy::SingleResponse => QuestionLayout::Named,
        Strategy::MultiQuestion => QuestionLayout::QuestionResponse,
        Strategy::MultiDiscrete | Strategy::MultiContinuous | Strategy::Statistics => {
            QuestionLayout::QuestionOnly
        }
    }
}

/// Column order shared by the raw and formatted frames.
pub fn output_columns(strategy: Strategy, breakdowns: &[String], question: &str) -> Vec<String> {
    let mut columns = vec![YEAR.to_string(), BREAKDOWN_TYPE.to_string()];
    columns.extend(breakdowns.iter().cloned());
    match question_layout(strategy) {
        QuestionLayout::Named => columns.push(question.to_string()),
        QuestionLayout::QuestionResponse => {
            columns.push(QUESTION.to_string());
            columns.push(RESPONSE.to_string());
        }
        QuestionLayout::QuestionOnly => columns.push(QUESTION.to_string()),
    }
    columns.extend([NUMER_W, NUMER_U, DENOM_W].map(str::to_string));
    if strategy == Strategy::MultiContinuous {
        columns.push(DENOM_TOTAL_W.to_string());
    }
    columns.push(DENOM_U.to_string());
    if strategy == Strategy::Statistics {
        columns.extend([MEAN, MEDIAN].map(str::to_string));
    } else {
        columns.push(PERCENTAGE.to_string());
    }
    columns.extend([STD_ERR, LOWER_CI, UPPER_CI, DEFF].map(str::to_string));
    columns
}

/// Statistic columns and the decimal places used when flagged.
fn statistic_columns(strategy: Strategy) -> Vec<(&'static str, usize)> {
    let mut columns = if strategy == Strategy::Statistics {
        vec![(MEAN, ERROR_DP), (MEDIAN, ERROR_DP)]
    } else {
        vec![(PERCENTAGE, VALUE_DP)]
    };
    columns.extend([
        (STD_ERR, ERROR_DP),
        (LOWER_CI, ERROR_DP),
        (UPPER_CI, ERROR_DP),
        (DEFF, ERROR_DP),
    ]);
    columns
}

fn statistic(row: &ResultRow, column: &str) -> Option<f64> {
    match column {
        PERCENTAGE | MEAN => row.value,
        MEDIAN => row.median,
        STD_ERR => row.estimate.map(|e| e.std_err),
        LOWER_CI => row.estimate.map(|e| e.lower_ci),
        UPPER_CI => row.estimate.map(|e| e.upper_ci),
        DEFF => row.estimate.and_then(|e| e.deff),
        _ => None,
    }
}

/// Builds the identifying and count columns common to both frames.
fn leading_columns(
    rows: &[ResultRow],
    strategy: Strategy,
    breakdowns: &[String],
    question: &str,
    year: &str,
) -> Vec<Column> {
    let mut columns: Vec<Column> = vec![
        Series::new(YEAR.into(), vec![year.to_string(); rows.len()]).into(),
        Series::new(
            BREAKDOWN_TYPE.into(),
            rows.iter()
                .map(|row| row.breakdown_type.clone())
                .collect::<Vec<_>>(),
        )
        .into(),
    ];
    for (idx, name) in breakdowns.iter().enumerate() {
        let codes: Vec<i64> = rows.iter().map(|row| row.keys[idx]).collect();
        columns.push(Series::new(name.as_str().into(), codes).into());
    }
    let responses: Vec<Option<i64>> = rows.iter().map(|row| row.response).collect();
    let questions: Vec<String> = rows.iter().map(|row| row.question.clone()).collect();
    match question_layout(strategy) {
        QuestionLayout::Named => columns.push(Series::new(question.into(), responses).into()),
        QuestionLayout::QuestionResponse => {
            columns.push(Series::new(QUESTION.into(), questions).into());
            columns.push(Series::new(RESPONSE.into(), responses).into());
        }
        QuestionLayout::QuestionOnly => {
            columns.push(Series::new(QUESTION.into(), questions).into());
        }
    }
    columns.push(
        Series::new(
            NUMER_W.into(),
            rows.iter().map(|row| row.numer_w).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            NUMER_U.into(),
            rows.iter().map(|row| row.numer_u as u64).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            DENOM_W.into(),
            rows.iter().map(|row| row.denom_w).collect::<Vec<_>>(),
        )
        .into(),
    );
    if strategy == Strategy::MultiContinuous {
        columns.push(
            Series::new(
                DENOM_TOTAL_W.into(),
                rows.iter().map(|row| row.denom_total_w).collect::<Vec<_>>(),
            )
            .into(),
        );
    }
    columns.push(
        Series::new(
            DENOM_U.into(),
            rows.iter().map(|row| row.denom_u as u64).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns
}

/// Numeric frame: statistics as nullable floats.
pub fn raw_frame(
    rows: &[ResultRow],
    strategy: Strategy,
    breakdowns: &[String],
    question: &str,
    year: &str,
) -> Result<DataFrame> {
    let mut columns = leading_columns(rows, strategy, breakdowns, question, year);
    for (name, _) in statistic_columns(strategy) {
        let values: Vec<Option<f64>> = rows.iter().map(|row| statistic(row, name)).collect();
        columns.push(Series::new(name.into(), values).into());
    }
    DataFrame::new(columns).context("build raw table frame")
}

/// Publication frame: statistics as strings with small-base suppression.
pub fn formatted_frame(
    rows: &[ResultRow],
    strategy: Strategy,
    breakdowns: &[String],
    question: &str,
    year: &str,
) -> Result<DataFrame> {
    let mut columns = leading_columns(rows, strategy, breakdowns, question, year);
    for (name, dp) in statistic_columns(strategy) {
        let cells: Vec<String> = rows
            .iter()
            .map(|row| suppress(statistic(row, name), row.denom_u, dp))
            .collect();
        columns.push(Series::new(name.into(), cells).into());
    }
    DataFrame::new(columns).context("build formatted table frame")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_order_per_strategy() {
        let breakdowns = vec!["sex".to_string()];
        assert_eq!(
            output_columns(Strategy::SingleResponse, &breakdowns, "dcgstg3").join(","),
            "Year,Breakdown_type,sex,dcgstg3,NumerW,NumerU,DenomW,DenomU,Percentage,std_err,lower_ci,upper_ci,deff"
        );
        assert_eq!(
            output_columns(Strategy::MultiContinuous, &[], "").join(","),
            "Year,Breakdown_type,Question,NumerW,NumerU,DenomW,DenomTotalW,DenomU,Percentage,std_err,lower_ci,upper_ci,deff"
        );
        assert_eq!(
            output_columns(Strategy::Statistics, &[], "").join(","),
            "Year,Breakdown_type,Question,NumerW,NumerU,DenomW,DenomU,Mean,Median,std_err,lower_ci,upper_ci,deff"
        );
    }

    #[test]
    fn frames_follow_column_order() {
        let row = ResultRow {
            block: 0,
            breakdown_type: "sex_q".into(),
            keys: vec![1],
            question: "q".into(),
            response: Some(2),
            numer_w: 12.0,
            numer_u: 12,
            denom_w: 40.0,
            denom_u: 40,
            denom_total_w: None,
            value: Some(30.0),
            median: None,
            estimate: None,
        };
        let breakdowns = vec!["sex".to_string()];
        let raw = raw_frame(&[row.clone()], Strategy::MultiQuestion, &breakdowns, "q", "2023").unwrap();
        let formatted =
            formatted_frame(&[row], Strategy::MultiQuestion, &breakdowns, "q", "2023").unwrap();
        let expected = output_columns(Strategy::MultiQuestion, &breakdowns, "q");
        let names: Vec<String> = raw.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, expected);
        let percentage = formatted.column(PERCENTAGE).unwrap().str().unwrap().get(0);
        assert_eq!(percentage, Some("[30]"));
        let std_err = formatted.column(STD_ERR).unwrap().str().unwrap().get(0);
        assert_eq!(std_err, Some(""));
    }
}
