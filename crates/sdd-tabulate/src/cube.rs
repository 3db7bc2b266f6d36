//! Breakdown cube: every marginal of a cross-tabulation.
//!
//! For breakdowns `[b1, .., bm]` each of the `2^m` subsets keeps its columns
//! and replaces the others with the `TOTAL` code. A row contributes to a
//! subset's cell only when every retained breakdown holds a real code;
//! sentinel breakdown values still count towards the marginals that
//! aggregate that breakdown away.

/// Breakdown codes of the rows being tabulated.
#[derive(Debug, Clone)]
pub struct Cube {
    names: Vec<String>,
    /// Per breakdown, the code of each row; negative codes are sentinels.
    codes: Vec<Vec<i64>>,
    total: i64,
}

impl Cube {
    pub fn new(names: Vec<String>, codes: Vec<Vec<i64>>, total: i64) -> Self {
        Self {
            names,
            codes,
            total,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    /// Subset bitmasks, bit `i` set when breakdown `i` is retained.
    pub fn subsets(&self) -> std::ops::Range<usize> {
        0..(1usize << self.names.len())
    }

    /// Cell key of `row` in `subset`, or `None` when a retained breakdown
    /// holds a sentinel.
    pub fn key(&self, subset: usize, row: usize) -> Option<Vec<i64>> {
        self.codes
            .iter()
            .enumerate()
            .map(|(idx, codes)| {
                if subset & (1 << idx) == 0 {
                    Some(self.total)
                } else {
                    let code = codes[row];
                    (code >= 0).then_some(code)
                }
            })
            .collect()
    }

    /// `Breakdown_type` label: retained breakdown names, then the question.
    pub fn breakdown_type(&self, subset: usize, question: &str) -> String {
        let mut parts: Vec<&str> = self
            .names
            .iter()
            .enumerate()
            .filter(|(idx, _)| subset & (1 << idx) != 0)
            .map(|(_, name)| name.as_str())
            .collect();
        parts.push(question);
        parts.join("_")
    }

    /// Subset that produced a key: the breakdowns not set to `TOTAL`.
    pub fn subset_of(&self, key: &[i64]) -> usize {
        key.iter()
            .enumerate()
            .filter(|(_, code)| **code != self.total)
            .fold(0, |subset, (idx, _)| subset | (1 << idx))
    }
}
