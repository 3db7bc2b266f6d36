//! Run-level parameters.
//!
//! Field names follow the upper-case keys used in parameter files, e.g.
//!
//! ```toml
//! YEAR = "2021"
//! WEIGHTING_VAR = "pupilwt"
//! HIGH_CIG_QUANTITY = 40
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SddError};

/// Which alcohol unit-conversion table applies to the survey year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitsTable {
    /// Per-container NORMAL and STRONG multipliers; no shandy question.
    #[default]
    Current,
    /// One factor per container scaled by a strength multiplier; includes shandy.
    Legacy,
}

/// Smallest value accepted for the `TOTAL` marker.
pub const MIN_TOT_CODE: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Params {
    /// Survey year label attached to every output table.
    pub year: String,
    pub weighting_var: String,
    /// Variance stratum column.
    pub strata: String,
    /// Primary sampling unit (cluster) column.
    pub psu: String,
    /// Unique respondent identifier column.
    pub id_var: String,
    /// Marker written into breakdown columns that were aggregated.
    pub tot_code: i64,
    /// Year-on-year difference threshold, read by the comparison report.
    pub breach_level: f64,
    /// Any weekday cigarette count at or above this marks an outlier.
    pub high_cig_quantity: f64,
    /// Any last-week container count at or above this marks an outlier.
    pub high_alc_quantity: f64,
    /// Mean units per drinking day above this marks an outlier.
    pub high_alc_daily: f64,
    /// Short codes of the drugs asked about, in questionnaire order.
    pub drugs: Vec<String>,
    /// Class A subset of `drugs`.
    pub drugs_classa: Vec<String>,
    /// Short code of the fictitious drug used to detect false responders.
    pub dummy_drug: String,
    pub normal_units_multiplier: BTreeMap<String, f64>,
    pub strong_units_multiplier: BTreeMap<String, f64>,
    pub units_table: UnitsTable,
    /// Keep rows that claim to know the dummy drug.
    pub include_dummy_drug: bool,
    /// Keep rows flagged as cigarette or alcohol outliers.
    pub include_outliers: bool,
    /// Raw column set to 1 for pupils at volunteer (non-sampled) schools.
    pub volunteer_school_var: String,
    /// Legacy derived columns discarded before the derivation pass.
    pub drop_columns: Vec<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            year: "2021".to_string(),
            weighting_var: "pupilwt".to_string(),
            strata: "gor".to_string(),
            psu: "archschn".to_string(),
            id_var: "archsn".to_string(),
            tot_code: 9999,
            breach_level: 2.0,
            high_cig_quantity: 40.0,
            high_alc_quantity: 20.0,
            high_alc_daily: 30.0,
            drugs: default_drugs(),
            drugs_classa: ["coc", "crk", "ecs", "her", "lsd", "msh", "mth"]
                .iter()
                .map(|code| (*code).to_string())
                .collect(),
            dummy_drug: "sem".to_string(),
            normal_units_multiplier: unit_map(&[
                ("al7brlrpt", 2.0),
                ("al7brlrcn", 1.5),
                ("al7brlrbt", 1.5),
                ("al7cidrpt", 2.0),
                ("al7cidrcn", 1.5),
                ("al7cidrbt", 1.5),
                ("al7winegl", 2.0),
                ("al7winebt", 9.0),
                ("al7spirgl", 1.0),
                ("al7popsbt", 1.5),
                ("al7shanpt", 0.5),
                ("al7shancn", 0.5),
            ]),
            strong_units_multiplier: unit_map(&[
                ("al7brlrpt", 3.0),
                ("al7brlrcn", 2.5),
                ("al7brlrbt", 2.0),
                ("al7cidrpt", 3.0),
                ("al7cidrcn", 2.5),
                ("al7cidrbt", 2.0),
                ("al7winegl", 2.0),
                ("al7winebt", 9.0),
                ("al7spirgl", 1.0),
                ("al7popsbt", 1.5),
                ("al7shanpt", 0.5),
                ("al7shancn", 0.5),
            ]),
            units_table: UnitsTable::Current,
            include_dummy_drug: false,
            include_outliers: false,
            volunteer_school_var: "volsch".to_string(),
            drop_columns: ["dcgstg2", "dcgstg3", "dcgstg5", "dallast3", "ddgany", "nal7ut"]
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

fn default_drugs() -> Vec<String> {
    [
        "can", "coc", "crk", "ecs", "her", "lsd", "msh", "mth", "amp", "trn", "ket", "nox", "pop",
        "glu", "mph", "nps", "oth",
    ]
    .iter()
    .map(|code| (*code).to_string())
    .collect()
}

fn unit_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, factor)| ((*name).to_string(), *factor))
        .collect()
}

impl Params {
    /// Key columns that are never measures.
    pub fn key_columns(&self) -> [&str; 4] {
        [
            self.id_var.as_str(),
            self.weighting_var.as_str(),
            self.strata.as_str(),
            self.psu.as_str(),
        ]
    }

    /// Unit factor for a container column under the given strength.
    pub fn unit_factor(&self, column: &str, strong: bool) -> Option<f64> {
        if strong {
            self.strong_units_multiplier.get(column).copied()
        } else {
            self.normal_units_multiplier.get(column).copied()
        }
    }

    pub fn is_class_a(&self, drug: &str) -> bool {
        self.drugs_classa.iter().any(|code| code == drug)
    }

    pub fn validate(&self) -> Result<()> {
        if self.drugs.is_empty() {
            return Err(SddError::Config("DRUGS must list at least one drug".into()));
        }
        if let Some(unknown) = self
            .drugs_classa
            .iter()
            .find(|code| !self.drugs.contains(*code))
        {
            return Err(SddError::Config(format!(
                "DRUGS_CLASSA entry `{unknown}` is not listed in DRUGS"
            )));
        }
        if self.drugs.contains(&self.dummy_drug) {
            return Err(SddError::Config(format!(
                "DUMMY_DRUG `{}` must not be a real drug",
                self.dummy_drug
            )));
        }
        if self.tot_code < MIN_TOT_CODE {
            return Err(SddError::Config(format!(
                "TOT_CODE {} is too small to be distinguishable from a response code",
                self.tot_code
            )));
        }
        for (name, threshold) in [
            ("HIGH_CIG_QUANTITY", self.high_cig_quantity),
            ("HIGH_ALC_QUANTITY", self.high_alc_quantity),
            ("HIGH_ALC_DAILY", self.high_alc_daily),
        ] {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(SddError::Config(format!("{name} must be positive")));
            }
        }
        for (name, value) in [
            ("WEIGHTING_VAR", &self.weighting_var),
            ("STRATA", &self.strata),
            ("PSU", &self.psu),
            ("ID_VAR", &self.id_var),
        ] {
            if value.trim().is_empty() {
                return Err(SddError::Config(format!("{name} must name a column")));
            }
        }
        Ok(())
    }
}
