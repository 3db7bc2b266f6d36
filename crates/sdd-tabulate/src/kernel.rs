//! Tabulation kernel: the five strategies over one filtered sample.
//!
//! Every strategy walks the breakdown cube, accumulates weighted and
//! unweighted counts per marginal cell, and optionally asks the design for
//! the matching estimator. The design of a marginal holds only the rows that
//! tabulate in it: a valid question and base, and valid retained breakdowns.
//! The design's point estimate is checked against the kernel's own
//! arithmetic.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use tracing::debug;

use sdd_ingest::RecordSet;
use sdd_ingest::polars_utils::{column_f64, column_f64_filled};
use sdd_model::{Params, Response, SddError, Subgroup};

use crate::cube::Cube;
use crate::table::ResultRow;
use crate::variance::{Design, Estimate, weighted_mean, weighted_median};

const CROSS_CHECK_TOLERANCE: f64 = 1e-6;

/// Weighted and unweighted tally of a cell.
#[derive(Debug, Clone, Default)]
struct Tally {
    weight: f64,
    count: usize,
    rows: Vec<usize>,
}

impl Tally {
    fn add(&mut self, row: usize, weight: f64) {
        self.weight += weight;
        self.count += 1;
        self.rows.push(row);
    }
}

/// One subset of the breakdowns: its cells and, when variance is wanted,
/// the design over the rows in those cells.
struct Marginal {
    subset: usize,
    design: Option<Design>,
    cells: BTreeMap<Vec<i64>, Tally>,
}

fn code_of(value: f64) -> i64 {
    value.round() as i64
}

fn valid(value: f64) -> bool {
    Response::from_f64(value).is_valid()
}

/// Filtered rows of one table block with their weights, design and cube.
pub struct Sample {
    record_set: RecordSet,
    cube: Cube,
    design: Design,
}

impl Sample {
    /// Extracts weights, strata, PSUs and breakdown codes.
    ///
    /// Every row must carry a positive weight.
    pub fn new(record_set: RecordSet, breakdowns: &[String], params: &Params) -> Result<Self> {
        let weights = column_f64(&record_set.data, &params.weighting_var)?;
        let unusable = weights
            .iter()
            .filter(|weight| !weight.is_some_and(|w| w.is_finite() && w > 0.0))
            .count();
        if unusable > 0 {
            return Err(SddError::MissingWeight {
                column: params.weighting_var.clone(),
                count: unusable,
            }
            .into());
        }
        let weights: Vec<f64> = weights.into_iter().flatten().collect();
        let strata = codes(&record_set, &params.strata)?;
        let psus = codes(&record_set, &params.psu)?;
        let breakdown_codes = breakdowns
            .iter()
            .map(|name| codes(&record_set, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cube: Cube::new(breakdowns.to_vec(), breakdown_codes, params.tot_code),
            design: Design::new(weights, &strata, &psus),
            record_set,
        })
    }

    pub fn len(&self) -> usize {
        self.design.len()
    }

    pub fn is_empty(&self) -> bool {
        self.design.is_empty()
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    fn values(&self, column: &str) -> Result<Vec<f64>> {
        column_f64_filled(&self.record_set.data, column, -9.0)
    }

    fn weight(&self, row: usize) -> f64 {
        self.design.weight(row)
    }
}

fn codes(record_set: &RecordSet, column: &str) -> Result<Vec<i64>> {
    Ok(column_f64_filled(&record_set.data, column, -9.0)?
        .into_iter()
        .map(code_of)
        .collect())
}

/// Strategy runner for one sample.
pub struct Kernel<'a> {
    pub sample: &'a Sample,
    pub table: &'a str,
    pub variance: bool,
}

impl Kernel<'_> {
    fn cross_check(&self, question: &str, own: Option<f64>, estimate: Option<Estimate>) -> Result<()> {
        if let (Some(own), Some(estimate)) = (own, estimate) {
            let tolerance = CROSS_CHECK_TOLERANCE * own.abs().max(1.0);
            if (own - estimate.estimate).abs() > tolerance {
                bail!(
                    "table `{}`: design estimate {} for `{question}` disagrees with tabulated {}",
                    self.table,
                    estimate.estimate,
                    own
                );
            }
        }
        Ok(())
    }

    fn percentage(numer: f64, denom: f64) -> Option<f64> {
        if denom > 0.0 {
            Some(100.0 * numer / denom)
        } else {
            debug!("zero denominator, percentage left empty");
            None
        }
    }

    /// Groups `rows` into marginal cells, per subset. Rows with a sentinel
    /// in a retained breakdown drop out of that subset and its design.
    fn cells(&self, rows: &[usize]) -> Vec<Marginal> {
        let cube = self.sample.cube();
        cube.subsets()
            .map(|subset| {
                let mut cells: BTreeMap<Vec<i64>, Tally> = BTreeMap::new();
                let mut kept = Vec::with_capacity(rows.len());
                for &row in rows {
                    if let Some(key) = cube.key(subset, row) {
                        cells.entry(key).or_default().add(row, self.sample.weight(row));
                        kept.push(row);
                    }
                }
                let design = self
                    .variance
                    .then(|| self.sample.design.restrict(&kept));
                Marginal {
                    subset,
                    design,
                    cells,
                }
            })
            .collect()
    }

    /// Single question, one response per pupil, with optional subgroups.
    pub fn single_response(
        &self,
        block: usize,
        question: &str,
        subgroups: &[Subgroup],
    ) -> Result<Vec<ResultRow>> {
        let answers = self.sample.values(question)?;
        let rows: Vec<usize> = (0..self.sample.len()).filter(|&row| valid(answers[row])).collect();
        let codes: Vec<i64> = answers.iter().copied().map(code_of).collect();
        let present: BTreeSet<i64> = rows.iter().map(|&row| codes[row]).collect();
        for subgroup in subgroups {
            if present.contains(&subgroup.code) {
                return Err(SddError::SubgroupCollision {
                    table: self.table.to_string(),
                    column: question.to_string(),
                    code: subgroup.code,
                }
                .into());
            }
        }

        let cube = self.sample.cube();
        let mut out = Vec::new();
        for Marginal {
            subset,
            design,
            cells,
        } in self.cells(&rows)
        {
            let breakdown_type = cube.breakdown_type(subset, question);
            for (key, domain) in cells {
                let mut levels: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
                for &row in &domain.rows {
                    let level = levels.entry(codes[row]).or_default();
                    level.0 += self.sample.weight(row);
                    level.1 += 1;
                }
                let mut emit = |response: i64, numer: (f64, usize), members: &[i64]| -> Result<()> {
                    let value = Self::percentage(numer.0, domain.weight);
                    let estimate = design
                        .as_ref()
                        .and_then(|design| {
                            design.proportion(&domain.rows, |row| members.contains(&codes[row]))
                        })
                        .map(Estimate::as_percentage);
                    self.cross_check(question, value, estimate)?;
                    out.push(ResultRow {
                        block,
                        breakdown_type: breakdown_type.clone(),
                        keys: key.clone(),
                        question: question.to_string(),
                        response: Some(response),
                        numer_w: numer.0,
                        numer_u: numer.1,
                        denom_w: domain.weight,
                        denom_u: domain.count,
                        denom_total_w: None,
                        value,
                        median: None,
                        estimate,
                    });
                    Ok(())
                };
                for (&code, &numer) in &levels {
                    emit(code, numer, &[code])?;
                }
                for subgroup in subgroups {
                    let numer = subgroup
                        .codes
                        .iter()
                        .filter_map(|code| levels.get(code))
                        .fold((0.0, 0), |acc, level| (acc.0 + level.0, acc.1 + level.1));
                    emit(subgroup.code, numer, &subgroup.codes)?;
                }
            }
        }
        Ok(out)
    }

    /// "Which of these applied?": share answering 1 among rows with a valid
    /// base.
    pub fn multi_discrete(&self, block: usize, response: &str, base: &str) -> Result<Vec<ResultRow>> {
        let answers = self.sample.values(response)?;
        let bases = self.sample.values(base)?;
        let rows: Vec<usize> = (0..self.sample.len()).filter(|&row| valid(bases[row])).collect();
        let cube = self.sample.cube();
        let mut out = Vec::new();
        for Marginal {
            subset,
            design,
            cells,
        } in self.cells(&rows)
        {
            let breakdown_type = cube.breakdown_type(subset, response);
            for (key, domain) in cells {
                let (numer_w, numer_u) = domain
                    .rows
                    .iter()
                    .filter(|&&row| answers[row] == 1.0)
                    .fold((0.0, 0), |acc, &row| (acc.0 + self.sample.weight(row), acc.1 + 1));
                let value = Self::percentage(numer_w, domain.weight);
                let estimate = design
                    .as_ref()
                    .and_then(|design| design.proportion(&domain.rows, |row| answers[row] == 1.0))
                    .map(Estimate::as_percentage);
                self.cross_check(response, value, estimate)?;
                out.push(ResultRow {
                    block,
                    breakdown_type: breakdown_type.clone(),
                    keys: key,
                    question: response.to_string(),
                    response: None,
                    numer_w,
                    numer_u,
                    denom_w: domain.weight,
                    denom_u: domain.count,
                    denom_total_w: None,
                    value,
                    median: None,
                    estimate,
                });
            }
        }
        Ok(out)
    }

    /// Continuous amount of one type as a share of the base total.
    ///
    /// Rows with a valid base are used; a sentinel amount counts as zero.
    pub fn multi_continuous(
        &self,
        block: usize,
        response: &str,
        base: &str,
    ) -> Result<Vec<ResultRow>> {
        let amounts: Vec<f64> = self
            .sample
            .values(response)?
            .into_iter()
            .map(|value| if valid(value) { value } else { 0.0 })
            .collect();
        let bases = self.sample.values(base)?;
        let rows: Vec<usize> = (0..self.sample.len()).filter(|&row| valid(bases[row])).collect();
        let cube = self.sample.cube();
        let mut out = Vec::new();
        for Marginal {
            subset,
            design,
            cells,
        } in self.cells(&rows)
        {
            let breakdown_type = cube.breakdown_type(subset, response);
            for (key, domain) in cells {
                let mut numer_w = 0.0;
                let mut numer_u = 0;
                let mut denom_total_w = 0.0;
                for &row in &domain.rows {
                    let weight = self.sample.weight(row);
                    numer_w += weight * amounts[row];
                    denom_total_w += weight * bases[row];
                    if amounts[row] > 0.0 {
                        numer_u += 1;
                    }
                }
                let value = Self::percentage(numer_w, denom_total_w);
                let estimate = design
                    .as_ref()
                    .and_then(|design| {
                        design.ratio(&domain.rows, |row| amounts[row], |row| bases[row])
                    })
                    .map(Estimate::as_percentage);
                self.cross_check(response, value, estimate)?;
                out.push(ResultRow {
                    block,
                    breakdown_type: breakdown_type.clone(),
                    keys: key,
                    question: response.to_string(),
                    response: None,
                    numer_w,
                    numer_u,
                    denom_w: domain.weight,
                    denom_u: domain.count,
                    denom_total_w: Some(denom_total_w),
                    value,
                    median: None,
                    estimate,
                });
            }
        }
        Ok(out)
    }

    /// Weighted mean and median of a continuous question.
    pub fn statistics(&self, block: usize, question: &str, base: &str) -> Result<Vec<ResultRow>> {
        let values = self.sample.values(question)?;
        let bases = self.sample.values(base)?;
        let rows: Vec<usize> = (0..self.sample.len())
            .filter(|&row| valid(bases[row]) && valid(values[row]))
            .collect();
        let cube = self.sample.cube();
        let mut out = Vec::new();
        for Marginal {
            subset,
            design,
            cells,
        } in self.cells(&rows)
        {
            let breakdown_type = cube.breakdown_type(subset, question);
            for (key, domain) in cells {
                let pairs: Vec<(f64, f64)> = domain
                    .rows
                    .iter()
                    .map(|&row| (values[row], self.sample.weight(row)))
                    .collect();
                let mean = weighted_mean(&pairs);
                let estimate = design
                    .as_ref()
                    .and_then(|design| design.mean(&domain.rows, |row| values[row]));
                self.cross_check(question, mean, estimate)?;
                out.push(ResultRow {
                    block,
                    breakdown_type: breakdown_type.clone(),
                    keys: key,
                    question: question.to_string(),
                    response: None,
                    numer_w: pairs.iter().map(|(x, w)| x * w).sum(),
                    numer_u: domain.count,
                    denom_w: domain.weight,
                    denom_u: domain.count,
                    denom_total_w: None,
                    value: mean,
                    median: weighted_median(&pairs),
                    estimate,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, DataFrame, NamedFrom, Series};

    fn sample(columns: Vec<(&str, Vec<f64>)>, breakdowns: &[&str]) -> Sample {
        let height = columns[0].1.len();
        let mut columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Series::new(name.into(), values).into())
            .collect();
        columns.push(Series::new("pupilwt".into(), vec![1.0; height]).into());
        columns.push(Series::new("gor".into(), vec![1.0; height]).into());
        columns.push(
            Series::new("archschn".into(), (0..height).map(|row| (row % 4) as f64).collect::<Vec<_>>())
                .into(),
        );
        let breakdowns: Vec<String> = breakdowns.iter().map(|name| (*name).to_string()).collect();
        Sample::new(
            RecordSet::from_frame(DataFrame::new(columns).unwrap()),
            &breakdowns,
            &Params::default(),
        )
        .unwrap()
    }

    fn kernel(sample: &Sample) -> Kernel<'_> {
        Kernel {
            sample,
            table: "t",
            variance: true,
        }
    }

    #[test]
    fn subgroup_rows_share_the_denominator() {
        let sample = sample(vec![("q", vec![1.0, 2.0, 3.0, 3.0, -9.0])], &[]);
        let subgroups = [Subgroup {
            code: 10,
            codes: vec![1, 2],
        }];
        let rows = kernel(&sample).single_response(0, "q", &subgroups).unwrap();
        let responses: Vec<i64> = rows.iter().filter_map(|row| row.response).collect();
        assert_eq!(responses, vec![1, 2, 3, 10]);
        assert!(rows.iter().all(|row| row.denom_u == 4));
        assert_eq!(rows[3].numer_u, 2);
        assert_eq!(rows[3].value, Some(50.0));
    }

    #[test]
    fn subgroup_collision_is_rejected() {
        let sample = sample(vec![("q", vec![1.0, 2.0])], &[]);
        let subgroups = [Subgroup {
            code: 2,
            codes: vec![1],
        }];
        let error = kernel(&sample).single_response(0, "q", &subgroups).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SddError>(),
            Some(SddError::SubgroupCollision { code: 2, .. })
        ));
    }

    #[test]
    fn discrete_counts_yes_among_valid_base() {
        let sample = sample(
            vec![
                ("resp", vec![1.0, 0.0, 1.0, 1.0]),
                ("base", vec![1.0, 1.0, 1.0, -9.0]),
            ],
            &[],
        );
        let rows = kernel(&sample).multi_discrete(0, "resp", "base").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].numer_u, 2);
        assert_eq!(rows[0].denom_u, 3);
    }

    #[test]
    fn continuous_shares_sum_to_total() {
        let sample = sample(
            vec![
                ("a", vec![1.0, 2.0, 0.0, 4.0]),
                ("b", vec![1.0, 0.0, 3.0, 4.0]),
                ("total", vec![2.0, 2.0, 3.0, 8.0]),
            ],
            &[],
        );
        let a = kernel(&sample).multi_continuous(0, "a", "total").unwrap();
        let b = kernel(&sample).multi_continuous(1, "b", "total").unwrap();
        assert_eq!(a[0].numer_w + b[0].numer_w, a[0].denom_total_w.unwrap());
        let sum = a[0].value.unwrap() + b[0].value.unwrap();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_mean_and_median() {
        let sample = sample(
            vec![("units", vec![1.0, 2.0, 3.0, 10.0, -9.0]), ("base", vec![1.0; 5])],
            &[],
        );
        let rows = kernel(&sample).statistics(0, "units", "base").unwrap();
        assert_eq!(rows[0].value, Some(4.0));
        assert_eq!(rows[0].median, Some(2.0));
        assert_eq!(rows[0].denom_u, 4);
    }

    #[test]
    fn school_with_only_sentinel_answers_leaves_the_design() {
        // One stratum, four schools of one pupil; the fourth answered -9.
        let sample = sample(vec![("q", vec![1.0, 2.0, 1.0, -9.0])], &[]);
        let rows = kernel(&sample).single_response(0, "q", &[]).unwrap();
        let yes = rows.iter().find(|row| row.response == Some(1)).unwrap();
        assert_eq!(yes.denom_u, 3);
        let estimate = yes.estimate.unwrap();
        assert!((estimate.std_err - 100.0 / 3.0).abs() < 1e-9, "{estimate:?}");
    }

    #[test]
    fn sentinel_breakdown_leaves_the_design_of_its_subset() {
        // Schools 0..4; the fourth pupil has no sex recorded.
        let sample = sample(
            vec![("q", vec![1.0, 2.0, 1.0, 1.0]), ("sex", vec![1.0, 1.0, 1.0, -9.0])],
            &["sex"],
        );
        let rows = kernel(&sample).single_response(0, "q", &[]).unwrap();
        let by_sex = rows
            .iter()
            .find(|row| row.keys == [1] && row.response == Some(1))
            .unwrap();
        assert!((by_sex.estimate.unwrap().std_err - 100.0 / 3.0).abs() < 1e-9);
        let total = rows
            .iter()
            .find(|row| row.keys == [9999] && row.response == Some(1))
            .unwrap();
        assert_eq!(total.denom_u, 4);
    }

    #[test]
    fn missing_weight_is_structural() {
        let columns: Vec<Column> = vec![
            Series::new("pupilwt".into(), vec![Some(1.0), None]).into(),
            Series::new("gor".into(), vec![1.0, 1.0]).into(),
            Series::new("archschn".into(), vec![1.0, 2.0]).into(),
        ];
        let set = RecordSet::from_frame(DataFrame::new(columns).unwrap());
        let error = Sample::new(set, &[], &Params::default()).err().unwrap();
        let typed = error.downcast_ref::<SddError>().unwrap();
        assert!(typed.is_structural());
    }
}
