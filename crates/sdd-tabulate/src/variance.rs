//! Design-based variance under stratified cluster sampling.
//!
//! Estimators are Taylor-linearised with the with-replacement PSU
//! approximation. For a linearised variable `z` with PSU totals `t_hi`
//! in stratum `h` holding `n_h` PSUs:
//!
//! ```text
//! Var = sum_h n_h / (n_h - 1) * sum_i (t_hi - mean_h(t))^2
//! ```
//!
//! Strata with a single PSU contribute zero variance.
//!
//! A table's design holds only the rows that tabulate: [`Design::restrict`]
//! narrows `n_h` to PSUs with at least one such row. Cell estimates are
//! domains within it, where `z` is zero outside the cell.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

/// Normal quantile of the two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Point estimate with its design-based precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub estimate: f64,
    pub std_err: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
    /// Absent when the simple-random-sample variance is zero or undefined.
    pub deff: Option<f64>,
}

impl Estimate {
    fn new(estimate: f64, variance: f64, srs_variance: Option<f64>) -> Self {
        let std_err = variance.max(0.0).sqrt();
        let deff = srs_variance
            .filter(|srs| *srs > 0.0 && srs.is_finite())
            .map(|srs| variance / srs);
        Self {
            estimate,
            std_err,
            lower_ci: estimate - Z_95 * std_err,
            upper_ci: estimate + Z_95 * std_err,
            deff,
        }
    }

    /// Rescales to percentages and clips the interval to `[0, 100]`.
    pub fn as_percentage(self) -> Self {
        Self {
            estimate: self.estimate * 100.0,
            std_err: self.std_err * 100.0,
            lower_ci: (self.lower_ci * 100.0).clamp(0.0, 100.0),
            upper_ci: (self.upper_ci * 100.0).clamp(0.0, 100.0),
            deff: self.deff,
        }
    }
}

/// Sample design: weight, stratum and PSU of each row.
#[derive(Debug, Clone)]
pub struct Design {
    weights: Vec<f64>,
    /// Stratum index of each row.
    stratum: Vec<usize>,
    /// PSU index of each row, unique across strata.
    psu: Vec<usize>,
    /// Number of PSUs in each stratum.
    psus_in_stratum: Vec<usize>,
}

impl Design {
    /// Builds the design from per-row weights, strata and PSUs.
    ///
    /// PSUs are nested within strata: the same PSU code in two strata is
    /// two clusters.
    pub fn new(weights: Vec<f64>, strata: &[i64], psus: &[i64]) -> Self {
        let mut stratum_index: BTreeMap<i64, usize> = BTreeMap::new();
        let mut psu_index: BTreeMap<(i64, i64), usize> = BTreeMap::new();
        let mut psus_in_stratum: Vec<usize> = Vec::new();
        let mut stratum = Vec::with_capacity(strata.len());
        let mut psu = Vec::with_capacity(psus.len());
        for (h, cluster) in strata.iter().zip(psus) {
            let next = stratum_index.len();
            let s = *stratum_index.entry(*h).or_insert_with(|| {
                psus_in_stratum.push(0);
                next
            });
            let next_psu = psu_index.len();
            let p = *psu_index.entry((*h, *cluster)).or_insert_with(|| {
                psus_in_stratum[s] += 1;
                next_psu
            });
            stratum.push(s);
            psu.push(p);
        }
        Self {
            weights,
            stratum,
            psu,
            psus_in_stratum,
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, row: usize) -> f64 {
        self.weights[row]
    }

    /// The same design over `rows` only. Row indices are unchanged; PSUs
    /// without any of these rows no longer count towards `n_h`.
    pub fn restrict(&self, rows: &[usize]) -> Self {
        let mut seen = BTreeSet::new();
        let mut psus_in_stratum = vec![0; self.psus_in_stratum.len()];
        for &row in rows {
            if seen.insert(self.psu[row]) {
                psus_in_stratum[self.stratum[row]] += 1;
            }
        }
        Self {
            weights: self.weights.clone(),
            stratum: self.stratum.clone(),
            psu: self.psu.clone(),
            psus_in_stratum,
        }
    }

    /// PSUs counted in the `stratum`-th stratum, in order of first appearance.
    pub fn psus_in(&self, stratum: usize) -> usize {
        self.psus_in_stratum.get(stratum).copied().unwrap_or(0)
    }

    /// Variance of the total of `z` over the listed rows; other rows have
    /// `z = 0`.
    fn total_variance(&self, rows: &[usize], z: impl Fn(usize) -> f64) -> f64 {
        let mut totals: HashMap<usize, (usize, f64)> = HashMap::new();
        for &row in rows {
            let entry = totals.entry(self.psu[row]).or_insert((self.stratum[row], 0.0));
            entry.1 += z(row);
        }
        let mut sums = vec![(0.0_f64, 0.0_f64); self.psus_in_stratum.len()];
        for (stratum, total) in totals.values() {
            sums[*stratum].0 += total;
            sums[*stratum].1 += total * total;
        }
        let mut variance = 0.0;
        let mut single = 0usize;
        for (h, (sum, sum_sq)) in sums.iter().enumerate() {
            let n = self.psus_in_stratum[h];
            if n == 0 {
                continue;
            }
            if n == 1 {
                single += 1;
                continue;
            }
            let n = n as f64;
            variance += n / (n - 1.0) * (sum_sq - sum * sum / n);
        }
        if single > 0 {
            debug!(strata = single, "single-PSU strata contribute zero variance");
        }
        variance.max(0.0)
    }

    /// Weighted mean of `x(row)` over the domain rows.
    pub fn mean(&self, domain: &[usize], x: impl Fn(usize) -> f64) -> Option<Estimate> {
        let total_w: f64 = domain.iter().map(|&row| self.weights[row]).sum();
        if domain.is_empty() || total_w <= 0.0 {
            return None;
        }
        let mean = domain
            .iter()
            .map(|&row| self.weights[row] * x(row))
            .sum::<f64>()
            / total_w;
        let variance =
            self.total_variance(domain, |row| self.weights[row] * (x(row) - mean) / total_w);
        let srs = srs_variance(domain, total_w, |row| (self.weights[row], x(row) - mean));
        Some(Estimate::new(mean, variance, srs))
    }

    /// Share of the domain's weight where `indicator(row)` holds.
    pub fn proportion(&self, domain: &[usize], indicator: impl Fn(usize) -> bool) -> Option<Estimate> {
        self.mean(domain, |row| if indicator(row) { 1.0 } else { 0.0 })
    }

    /// Ratio of weighted totals `sum(w x) / sum(w y)` over the domain.
    pub fn ratio(
        &self,
        domain: &[usize],
        x: impl Fn(usize) -> f64,
        y: impl Fn(usize) -> f64,
    ) -> Option<Estimate> {
        let total_wy: f64 = domain.iter().map(|&row| self.weights[row] * y(row)).sum();
        let total_w: f64 = domain.iter().map(|&row| self.weights[row]).sum();
        if domain.is_empty() || total_wy == 0.0 || total_w <= 0.0 {
            return None;
        }
        let ratio = domain
            .iter()
            .map(|&row| self.weights[row] * x(row))
            .sum::<f64>()
            / total_wy;
        let variance = self.total_variance(domain, |row| {
            self.weights[row] * (x(row) - ratio * y(row)) / total_wy
        });
        let mean_y = total_wy / total_w;
        let srs = srs_variance(domain, total_w, |row| {
            (self.weights[row], x(row) - ratio * y(row))
        })
        .map(|residual| residual / (mean_y * mean_y));
        Some(Estimate::new(ratio, variance, srs))
    }
}

/// With-replacement simple-random-sample variance of a mean whose
/// weighted residuals are given by `residual(row) -> (w, e)`.
fn srs_variance(
    domain: &[usize],
    total_w: f64,
    residual: impl Fn(usize) -> (f64, f64),
) -> Option<f64> {
    let n = domain.len();
    if n < 2 {
        return None;
    }
    let n = n as f64;
    let spread: f64 = domain
        .iter()
        .map(|&row| {
            let (w, e) = residual(row);
            w * e * e
        })
        .sum::<f64>()
        / total_w;
    Some(spread * n / (n - 1.0) / n)
}

/// Weighted mean `sum(w x) / sum(w)`.
pub fn weighted_mean(values: &[(f64, f64)]) -> Option<f64> {
    let total_w: f64 = values.iter().map(|(_, w)| w).sum();
    if total_w <= 0.0 {
        return None;
    }
    Some(values.iter().map(|(x, w)| x * w).sum::<f64>() / total_w)
}

/// First value, in ascending order, whose cumulative weight reaches half of
/// the total weight.
pub fn weighted_median(values: &[(f64, f64)]) -> Option<f64> {
    let total_w: f64 = values.iter().map(|(_, w)| w).sum();
    if values.is_empty() || total_w <= 0.0 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let half = total_w / 2.0;
    let mut cumulative = 0.0;
    for (x, w) in &sorted {
        cumulative += w;
        if cumulative >= half {
            return Some(*x);
        }
    }
    sorted.last().map(|(x, _)| *x)
}
