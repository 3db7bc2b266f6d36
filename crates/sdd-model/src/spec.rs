//! Declarative table specifications.
//!
//! A specification names the breakdown columns, the question(s) and base(s),
//! an optional filter and response regrouping, and selects one of five
//! tabulation strategies. Specifications are plain data and deserialize from
//! TOML or JSON:
//!
//! ```toml
//! [[table]]
//! name = "smoking_status_by_sex"
//! strategy = "single_response"
//! breakdowns = ["sex", "age1315"]
//! question = "dcgstg3"
//! filter = "age1315 >= 13"
//! subgroup = [{ code = 10, codes = [1, 2] }]
//! ```

use serde::{Deserialize, Serialize};

/// The five tabulation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One coded question, one response per pupil.
    SingleResponse,
    /// The single-response table repeated over several questions.
    MultiQuestion,
    /// "Which of these applied?" flags, each with its own base.
    MultiDiscrete,
    /// Continuous amounts by type as a share of a total.
    MultiContinuous,
    /// Weighted mean and median of continuous questions.
    Statistics,
}

impl Strategy {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::SingleResponse => "Single response",
            Self::MultiQuestion => "Multi question",
            Self::MultiDiscrete => "Multi response (discrete)",
            Self::MultiContinuous => "Multi response (continuous)",
            Self::Statistics => "Statistics",
        }
    }
}

/// A new response code defined as the union of existing codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgroup {
    pub code: i64,
    pub codes: Vec<i64>,
}

/// Strategy selection and its strategy-specific inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TableQuery {
    SingleResponse {
        question: String,
        #[serde(default)]
        subgroup: Vec<Subgroup>,
    },
    MultiQuestion {
        questions: Vec<String>,
        #[serde(default)]
        subgroup: Vec<Subgroup>,
    },
    MultiDiscrete {
        responses: Vec<String>,
        /// One base per response, in the same order.
        bases: Vec<String>,
    },
    MultiContinuous {
        responses: Vec<String>,
        base: String,
    },
    Statistics {
        questions: Vec<String>,
        base: String,
    },
}

impl TableQuery {
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::SingleResponse { .. } => Strategy::SingleResponse,
            Self::MultiQuestion { .. } => Strategy::MultiQuestion,
            Self::MultiDiscrete { .. } => Strategy::MultiDiscrete,
            Self::MultiContinuous { .. } => Strategy::MultiContinuous,
            Self::Statistics { .. } => Strategy::Statistics,
        }
    }

    /// Question, response and base columns referenced by the query.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::SingleResponse { question, .. } => vec![question.as_str()],
            Self::MultiQuestion { questions, .. } => questions.iter().map(String::as_str).collect(),
            Self::MultiDiscrete { responses, bases } => responses
                .iter()
                .chain(bases.iter())
                .map(String::as_str)
                .collect(),
            Self::MultiContinuous { responses, base } => responses
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(base.as_str()))
                .collect(),
            Self::Statistics { questions, base } => questions
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(base.as_str()))
                .collect(),
        }
    }

    pub fn subgroups(&self) -> &[Subgroup] {
        match self {
            Self::SingleResponse { subgroup, .. } | Self::MultiQuestion { subgroup, .. } => subgroup,
            _ => &[],
        }
    }
}

fn default_variance() -> bool {
    true
}

/// One declared output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Output name, also used for the CSV asset.
    pub name: String,
    #[serde(default)]
    pub breakdowns: Vec<String>,
    /// Row filter; `{question}` is replaced per question in multi-question tables.
    #[serde(default)]
    pub filter: Option<String>,
    /// Overrides the run-level year label.
    #[serde(default)]
    pub year: Option<String>,
    /// Compute design-based standard errors and intervals.
    #[serde(default = "default_variance")]
    pub variance: bool,
    #[serde(flatten)]
    pub query: TableQuery,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, query: TableQuery) -> Self {
        Self {
            name: name.into(),
            breakdowns: Vec::new(),
            filter: None,
            year: None,
            variance: true,
            query,
        }
    }

    pub fn with_breakdowns<S: Into<String>>(mut self, breakdowns: impl IntoIterator<Item = S>) -> Self {
        self.breakdowns = breakdowns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn without_variance(mut self) -> Self {
        self.variance = false;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.query.strategy()
    }

    /// Every record column the specification names, filter excluded.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.breakdowns.iter().map(String::as_str).collect();
        columns.extend(self.query.columns());
        columns
    }
}

/// A list of table specifications as stored in a spec file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSpecList {
    #[serde(default, rename = "table")]
    pub tables: Vec<TableSpec>,
}
