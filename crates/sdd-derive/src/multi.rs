//! Combined smoking, drinking and drug use.

use sdd_model::{ColumnKind, Response};

use crate::recode::{partition, strongest};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

/// Overlap code for a (smoked, drank, took drugs) combination.
///
/// 1 smoked only, 2 drank only, 3 drugs only, 4 smoked and drank,
/// 5 smoked and drugs, 6 drank and drugs, 7 all three, 8 none.
pub fn overlap_code(smoked: bool, drank: bool, drugs: bool) -> f64 {
    match (smoked, drank, drugs) {
        (true, false, false) => 1.0,
        (false, true, false) => 2.0,
        (false, false, true) => 3.0,
        (true, true, false) => 4.0,
        (true, false, true) => 5.0,
        (false, true, true) => 6.0,
        (true, true, true) => 7.0,
        (false, false, false) => 8.0,
    }
}

/// Reads a behaviour as yes/no under its convention; `None` if missing.
fn behaviour(response: Response, yes: i64, no: i64) -> Option<bool> {
    if response.is(yes) {
        Some(true)
    } else if response.is(no) {
        Some(false)
    } else {
        None
    }
}

/// Inputs use 0/1 for smoking and drugs and 1/2 for drinking.
fn overlap(smoked: Response, drank: Response, drugs: Response) -> Response {
    match (
        behaviour(smoked, 1, 0),
        behaviour(drank, 1, 2),
        behaviour(drugs, 1, 0),
    ) {
        (Some(s), Some(a), Some(d)) => Response::Value(overlap_code(s, a, d)),
        _ => strongest(&[smoked, drank, drugs]),
    }
}

/// Ever-use inputs use 1/2 for smoking and drinking and 0/1 for drugs.
fn ever_overlap(smoked: Response, drank: Response, drugs: Response) -> Response {
    match (
        behaviour(smoked, 1, 2),
        behaviour(drank, 1, 2),
        behaviour(drugs, 1, 0),
    ) {
        (Some(s), Some(a), Some(d)) => Response::Value(overlap_code(s, a, d)),
        _ => strongest(&[smoked, drank, drugs]),
    }
}

fn behaviour_count(overlap: Response) -> Response {
    partition(
        overlap,
        &[(&[8], 0.0), (&[1, 2, 3], 1.0), (&[4, 5, 6], 2.0), (&[7], 3.0)],
    )
}

pub(crate) fn register(registry: &mut DerivationRegistry) {
    registry.register(Derivation::row_wise(
        "dmultioverlap",
        Theme::MultiBehaviour,
        names(&["dcg7", "dallastwk", "ddgmonany"]),
        ColumnKind::Discrete,
        |row| overlap(row[0], row[1], row[2]),
    ));
    registry.register(Derivation::row_wise(
        "dmulticount",
        Theme::MultiBehaviour,
        names(&["dmultioverlap"]),
        ColumnKind::Discrete,
        |row| behaviour_count(row[0]),
    ));
    registry.register(Derivation::row_wise(
        "dmultievroverlap",
        Theme::MultiBehaviour,
        names(&["dcgevr", "dalevr", "ddgany"]),
        ColumnKind::Discrete,
        |row| ever_overlap(row[0], row[1], row[2]),
    ));
    registry.register(Derivation::row_wise(
        "dmultievrcount",
        Theme::MultiBehaviour,
        names(&["dmultievroverlap"]),
        ColumnKind::Discrete,
        |row| behaviour_count(row[0]),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_covers_all_combinations() {
        let v = Response::Value;
        assert_eq!(overlap(v(1.0), v(1.0), v(1.0)), v(7.0));
        assert_eq!(overlap(v(0.0), v(2.0), v(0.0)), v(8.0));
        assert_eq!(overlap(v(1.0), v(2.0), v(1.0)), v(5.0));
        assert_eq!(overlap(v(0.0), Response::DONT_KNOW, v(1.0)), Response::DONT_KNOW);
        assert_eq!(ever_overlap(v(2.0), v(1.0), v(1.0)), v(6.0));
        assert_eq!(behaviour_count(v(6.0)), v(2.0));
        assert_eq!(behaviour_count(v(8.0)), v(0.0));
    }
}
