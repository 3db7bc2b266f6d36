//! Reserved missing-value codes.
//!
//! Survey columns carry four reserved negative integers alongside real
//! responses. They are ranked so that combining two unknowns keeps the
//! strongest one:
//!
//! | Code | Meaning | Rank |
//! |------|---------|------|
//! | -9 | No response / item missing | 4 |
//! | -8 | Don't know | 3 |
//! | -7 | Prefer not to say | 2 |
//! | -1 | Not applicable (routing) | 1 |
//!
//! [`Response`] is the tagged form used by derivations: a valid numeric value
//! or a [`MissingCode`]. Columns are stored numerically and converted at the
//! edges with [`Response::from_f64`] and [`Response::to_f64`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the reserved negative response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MissingCode {
    /// -1: question was routed past.
    NotApplicable,
    /// -7: respondent chose not to answer.
    PreferNotToSay,
    /// -8: respondent did not know.
    DontKnow,
    /// -9: item left blank.
    NoAnswer,
}

impl MissingCode {
    /// All codes in ascending rank.
    pub const ALL: [MissingCode; 4] = [
        MissingCode::NotApplicable,
        MissingCode::PreferNotToSay,
        MissingCode::DontKnow,
        MissingCode::NoAnswer,
    ];

    /// The numeric code stored in the record set.
    pub const fn code(self) -> i64 {
        match self {
            Self::NotApplicable => -1,
            Self::PreferNotToSay => -7,
            Self::DontKnow => -8,
            Self::NoAnswer => -9,
        }
    }

    /// Numeric code as `f64`, the storage type of record columns.
    pub const fn value(self) -> f64 {
        self.code() as f64
    }

    /// Precedence rank; higher ranks win when two codes are merged.
    pub const fn rank(self) -> u8 {
        match self {
            Self::NotApplicable => 1,
            Self::PreferNotToSay => 2,
            Self::DontKnow => 3,
            Self::NoAnswer => 4,
        }
    }

    /// Looks up the code for a stored value.
    pub fn from_value(value: f64) -> Option<Self> {
        if value == -1.0 {
            Some(Self::NotApplicable)
        } else if value == -7.0 {
            Some(Self::PreferNotToSay)
        } else if value == -8.0 {
            Some(Self::DontKnow)
        } else if value == -9.0 {
            Some(Self::NoAnswer)
        } else {
            None
        }
    }

    /// Returns the higher-ranked of two codes.
    pub fn stronger(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }

    /// True for the codes that mean the answer is unknown (-9, -8, -7).
    ///
    /// Not-applicable is a routing outcome rather than an unknown answer.
    pub const fn is_unknown(self) -> bool {
        !matches!(self, Self::NotApplicable)
    }

    /// The code a statistical model sees: everything collapses to -9.
    pub const fn for_modelling(self) -> Self {
        Self::NoAnswer
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NotApplicable => "Not applicable",
            Self::PreferNotToSay => "Prefer not to say",
            Self::DontKnow => "Don't know",
            Self::NoAnswer => "No answer",
        }
    }
}

impl fmt::Display for MissingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single cell: a valid value or a reserved missing code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Value(f64),
    Missing(MissingCode),
}

impl Response {
    pub const NO_ANSWER: Response = Response::Missing(MissingCode::NoAnswer);
    pub const DONT_KNOW: Response = Response::Missing(MissingCode::DontKnow);
    pub const PREFER_NOT_TO_SAY: Response = Response::Missing(MissingCode::PreferNotToSay);
    pub const NOT_APPLICABLE: Response = Response::Missing(MissingCode::NotApplicable);

    /// Classifies a stored value.
    ///
    /// NaN and negative values outside the reserved set are treated as
    /// item missing (-9).
    pub fn from_f64(value: f64) -> Self {
        if let Some(code) = MissingCode::from_value(value) {
            return Self::Missing(code);
        }
        if value.is_nan() || value < 0.0 {
            return Self::NO_ANSWER;
        }
        Self::Value(value)
    }

    /// Classifies a nullable stored value; null is item missing.
    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(Self::NO_ANSWER, Self::from_f64)
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Self::Value(value) => value,
            Self::Missing(code) => code.value(),
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(value),
            Self::Missing(_) => None,
        }
    }

    pub fn missing(self) -> Option<MissingCode> {
        match self {
            Self::Value(_) => None,
            Self::Missing(code) => Some(code),
        }
    }

    /// The value as an integer response code, if it is one.
    pub fn code(self) -> Option<i64> {
        match self {
            Self::Value(value) if value.fract() == 0.0 => Some(value as i64),
            _ => None,
        }
    }

    /// True when the value equals the given response code.
    pub fn is(self, code: i64) -> bool {
        self.code() == Some(code)
    }

    /// True when the value is one of the given response codes.
    pub fn is_any(self, codes: &[i64]) -> bool {
        self.code().is_some_and(|value| codes.contains(&value))
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// True for -9, -8 and -7.
    pub fn is_unknown(self) -> bool {
        self.missing().is_some_and(MissingCode::is_unknown)
    }

    /// Combines two responses, keeping the strongest missing code.
    ///
    /// Any missing code outranks a valid value; two valid values keep `self`.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Missing(a), Self::Missing(b)) => Self::Missing(a.stronger(b)),
            (Self::Missing(_), Self::Value(_)) => self,
            (Self::Value(_), Self::Missing(_)) => other,
            (Self::Value(_), Self::Value(_)) => self,
        }
    }

    /// Strongest missing code among the responses, if any is missing.
    pub fn strongest_missing<I>(responses: I) -> Option<MissingCode>
    where
        I: IntoIterator<Item = Response>,
    {
        responses
            .into_iter()
            .filter_map(Response::missing)
            .reduce(MissingCode::stronger)
    }

    /// Strongest unknown code (-9, -8, -7) among the responses.
    pub fn strongest_unknown<I>(responses: I) -> Option<MissingCode>
    where
        I: IntoIterator<Item = Response>,
    {
        responses
            .into_iter()
            .filter_map(Response::missing)
            .filter(|code| code.is_unknown())
            .reduce(MissingCode::stronger)
    }
}

impl From<MissingCode> for Response {
    fn from(code: MissingCode) -> Self {
        Self::Missing(code)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Missing(code) => write!(f, "{code}"),
        }
    }
}

/// `x >= 0`.
pub fn is_valid(value: f64) -> bool {
    !value.is_nan() && value >= 0.0
}

/// `x > 0`, the validity rule for response codes.
pub fn is_valid_code(value: f64) -> bool {
    !value.is_nan() && value > 0.0
}

/// `x` is one of -9, -8, -7, -1.
pub fn is_sentinel(value: f64) -> bool {
    MissingCode::from_value(value).is_some()
}

/// Merges two stored values under the strongest-unknown-wins policy.
pub fn merge(a: f64, b: f64) -> f64 {
    Response::from_f64(a).merge(Response::from_f64(b)).to_f64()
}

/// Collapses -7, -8 and -1 to -9; other values pass through.
pub fn collapse_for_modelling(value: f64) -> f64 {
    match MissingCode::from_value(value) {
        Some(code) => code.for_modelling().value(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_precedence() {
        assert!(MissingCode::NoAnswer.rank() > MissingCode::DontKnow.rank());
        assert!(MissingCode::DontKnow.rank() > MissingCode::PreferNotToSay.rank());
        assert!(MissingCode::PreferNotToSay.rank() > MissingCode::NotApplicable.rank());
    }

    #[test]
    fn merge_keeps_strongest_unknown() {
        assert_eq!(merge(-7.0, -8.0), -8.0);
        assert_eq!(merge(-1.0, -9.0), -9.0);
        assert_eq!(merge(-1.0, -7.0), -7.0);
        assert_eq!(merge(3.0, -1.0), -1.0);
        assert_eq!(merge(3.0, 4.0), 3.0);
    }

    #[test]
    fn classification() {
        assert!(is_valid(0.0));
        assert!(!is_valid_code(0.0));
        assert!(is_sentinel(-7.0));
        assert!(!is_sentinel(-2.0));
        assert_eq!(Response::from_f64(-2.0), Response::NO_ANSWER);
        assert_eq!(Response::from_f64(f64::NAN), Response::NO_ANSWER);
        assert_eq!(Response::from_option(None), Response::NO_ANSWER);
        assert_eq!(Response::from_f64(2.0).code(), Some(2));
        assert_eq!(Response::from_f64(2.5).code(), None);
    }

    #[test]
    fn modelling_collapse() {
        assert_eq!(collapse_for_modelling(-7.0), -9.0);
        assert_eq!(collapse_for_modelling(-8.0), -9.0);
        assert_eq!(collapse_for_modelling(-1.0), -9.0);
        assert_eq!(collapse_for_modelling(-9.0), -9.0);
        assert_eq!(collapse_for_modelling(3.0), 3.0);
    }

    #[test]
    fn strongest_unknown_ignores_routing() {
        let responses = [Response::NOT_APPLICABLE, Response::PREFER_NOT_TO_SAY];
        assert_eq!(
            Response::strongest_unknown(responses),
            Some(MissingCode::PreferNotToSay)
        );
        assert_eq!(
            Response::strongest_unknown([Response::NOT_APPLICABLE]),
            None
        );
        assert_eq!(
            Response::strongest_missing([Response::NOT_APPLICABLE, Response::Value(1.0)]),
            Some(MissingCode::NotApplicable)
        );
    }
}
