//! Column kinds carried alongside the record set.

use serde::{Deserialize, Serialize};

/// Semantic kind of a record-set column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColumnKind {
    /// Positive integer response codes plus the reserved missing codes.
    #[default]
    Discrete,
    /// Non-negative real values plus the reserved missing codes.
    Continuous,
    /// Identifier, stratum, cluster, weight or year.
    NonMeasure,
}

impl ColumnKind {
    pub fn is_measure(self) -> bool {
        !matches!(self, Self::NonMeasure)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Discrete => "Discrete",
            Self::Continuous => "Continuous",
            Self::NonMeasure => "Non-measure",
        }
    }
}

/// Coding of a yes/no derivation; fixed per derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryConvention {
    /// 1 = yes, 0 = no.
    ZeroOne,
    /// 1 = yes, 2 = no.
    OneTwo,
}

impl BinaryConvention {
    pub const fn yes(self) -> f64 {
        1.0
    }

    pub const fn no(self) -> f64 {
        match self {
            Self::ZeroOne => 0.0,
            Self::OneTwo => 2.0,
        }
    }

    /// Valid (non-missing) values of the domain.
    pub const fn domain(self) -> [f64; 2] {
        [self.yes(), self.no()]
    }

    pub fn encode(self, flag: bool) -> f64 {
        if flag { self.yes() } else { self.no() }
    }
}
