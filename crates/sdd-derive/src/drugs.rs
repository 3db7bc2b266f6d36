//! Drug derivations.
//!
//! Each drug in `DRUGS` has four raw columns: ever tried (`dgtd<drug>`,
//! 1 yes / 2 no), ever offered (`dgof<drug>`), when last used
//! (`duse<drug>`: 1 last week, 2 last month, 3 last year, 4 longer ago) and
//! age when first tried (`dgage<drug>`). Composite indicators are built over
//! all drugs and over the class A subset.

use sdd_model::{BinaryConvention, ColumnKind, Params, Response};

use crate::recode::{any_of, count_of, strongest, yes_no};
use crate::registry::{Derivation, DerivationRegistry, Theme};

pub fn tried_column(drug: &str) -> String {
    format!("dgtd{drug}")
}

pub fn offered_column(drug: &str) -> String {
    format!("dgof{drug}")
}

pub fn last_used_column(drug: &str) -> String {
    format!("duse{drug}")
}

pub fn first_age_column(drug: &str) -> String {
    format!("dgage{drug}")
}

/// Derived 0/1 ever-tried indicator for one drug.
pub fn derived_tried_column(drug: &str) -> String {
    format!("ddgtd{drug}")
}

const LAST_YEAR: [i64; 3] = [1, 2, 3];
const LAST_MONTH: [i64; 2] = [1, 2];

fn columns(drugs: &[String], column: fn(&str) -> String) -> Vec<String> {
    drugs.iter().map(|drug| column(drug)).collect()
}

fn any_derivation(name: &str, inputs: Vec<String>, codes: &'static [i64]) -> Derivation {
    Derivation::row_wise(name, Theme::Drugs, inputs, ColumnKind::Discrete, move |row| {
        any_of(row, |member| member.is_any(codes), BinaryConvention::ZeroOne)
    })
}

pub(crate) fn register(registry: &mut DerivationRegistry, params: &Params) {
    for drug in &params.drugs {
        registry.register(Derivation::row_wise(
            derived_tried_column(drug),
            Theme::Drugs,
            vec![tried_column(drug)],
            ColumnKind::Discrete,
            |row| yes_no(row[0], BinaryConvention::ZeroOne),
        ));
    }

    let drugs = &params.drugs;
    let class_a = &params.drugs_classa;

    registry.register(any_derivation(
        "ddgany",
        columns(drugs, derived_tried_column),
        &[1],
    ));
    registry.register(any_derivation(
        "ddgofany",
        columns(drugs, offered_column),
        &[1],
    ));
    registry.register(any_derivation(
        "ddgyrany",
        columns(drugs, last_used_column),
        &LAST_YEAR,
    ));
    registry.register(any_derivation(
        "ddgmonany",
        columns(drugs, last_used_column),
        &LAST_MONTH,
    ));
    registry.register(any_derivation(
        "ddgevrcla",
        columns(class_a, derived_tried_column),
        &[1],
    ));
    registry.register(any_derivation(
        "ddgyrcla",
        columns(class_a, last_used_column),
        &LAST_YEAR,
    ));
    registry.register(any_derivation(
        "ddgmoncla",
        columns(class_a, last_used_column),
        &LAST_MONTH,
    ));

    registry.register(Derivation::row_wise(
        "ddgyrnum",
        Theme::Drugs,
        columns(drugs, last_used_column),
        ColumnKind::Discrete,
        |row| count_of(row, |member| member.is_any(&LAST_YEAR)),
    ));

    registry.register(Derivation::row_wise(
        "ddglast3",
        Theme::Drugs,
        vec!["ddgany".into(), "ddgyrany".into(), "ddgmonany".into()],
        ColumnKind::Discrete,
        |row| last_used(row[0], row[1], row[2]),
    ));

    registry.register(Derivation::row_wise(
        "ddgfirstage",
        Theme::Drugs,
        columns(drugs, first_age_column),
        ColumnKind::Discrete,
        first_age,
    ));
}

/// 1 used in the last month, 2 in the last year but not the last month,
/// 3 not in the last year (including never).
pub fn last_used(ever: Response, year: Response, month: Response) -> Response {
    if month.is(1) {
        Response::Value(1.0)
    } else if month.is(0) && year.is(1) {
        Response::Value(2.0)
    } else if year.is(0) || ever.is(0) {
        Response::Value(3.0)
    } else {
        strongest(&[ever, year, month])
    }
}

/// Youngest age at which any drug was first tried.
///
/// Not-applicable ages are ignored; the remaining sentinels sort below any
/// real age, so an unknown age makes the result unknown with the strongest
/// code winning.
pub fn first_age(ages: &[Response]) -> Response {
    let youngest = ages
        .iter()
        .map(|age| {
            if *age == Response::NOT_APPLICABLE {
                f64::INFINITY
            } else {
                age.to_f64()
            }
        })
        .fold(f64::INFINITY, f64::min);
    if youngest.is_infinite() {
        Response::NOT_APPLICABLE
    } else {
        Response::from_f64(youngest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: f64) -> Response {
        Response::Value(v)
    }

    #[test]
    fn first_age_ignores_not_applicable() {
        let na = Response::NOT_APPLICABLE;
        assert_eq!(first_age(&[na, value(14.0), value(12.0)]), value(12.0));
        assert_eq!(first_age(&[na, na]), na);
        assert_eq!(first_age(&[value(13.0), Response::DONT_KNOW]), Response::DONT_KNOW);
        assert_eq!(
            first_age(&[Response::DONT_KNOW, Response::NO_ANSWER]),
            Response::NO_ANSWER
        );
    }

    #[test]
    fn last_used_groups() {
        assert_eq!(last_used(value(1.0), value(1.0), value(1.0)), value(1.0));
        assert_eq!(last_used(value(1.0), value(1.0), value(0.0)), value(2.0));
        assert_eq!(last_used(value(1.0), value(0.0), value(0.0)), value(3.0));
        assert_eq!(last_used(value(0.0), value(0.0), value(0.0)), value(3.0));
        assert_eq!(
            last_used(value(1.0), value(1.0), Response::DONT_KNOW),
            Response::DONT_KNOW
        );
    }
}
