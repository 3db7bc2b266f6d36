//! General derivations: age bands, ethnicity, family affluence, school.

use sdd_model::{BinaryConvention, ColumnKind, MissingCode, Response};

use crate::recode::{band_inclusive, partition, promote_refusal, yes_no};
use crate::registry::{Derivation, DerivationRegistry, Inputs, OutputColumn, Theme, names};

/// Youngest age lifted into a band; younger pupils keep their age.
const BAND_FLOOR: f64 = 10.0;

/// Family affluence items with their number of response categories.
const FAS_ITEMS: [(&str, i64); 6] = [
    ("fasbed", 3),
    ("fascar", 3),
    ("fascomp", 4),
    ("fasbath", 3),
    ("fasdish", 2),
    ("fashols", 4),
];

pub(crate) fn register(registry: &mut DerivationRegistry) {
    for (name, low) in [("age1115", 11.0), ("age1215", 12.0), ("age1315", 13.0)] {
        registry.register(Derivation::row_wise(
            name,
            Theme::General,
            names(&["age"]),
            ColumnKind::Discrete,
            move |row| age_band(row[0], low, 15.0),
        ));
    }

    registry.register(Derivation::row_wise(
        "dethgrp5",
        Theme::General,
        names(&["ethnic"]),
        ColumnKind::Discrete,
        |row| {
            partition(
                row[0],
                &[
                    (&[1, 2, 3, 4], 1.0),
                    (&[5, 6, 7, 8], 2.0),
                    (&[9, 10, 11, 12, 13], 3.0),
                    (&[14, 15, 16], 4.0),
                    (&[17, 18], 5.0),
                ],
            )
        },
    ));

    registry.register(Derivation::new(
        "dfasscore",
        Theme::General,
        FAS_ITEMS.iter().map(|(name, _)| (*name).to_string()).collect(),
        vec![
            OutputColumn {
                name: "dfasscore".to_string(),
                kind: ColumnKind::Discrete,
            },
            OutputColumn {
                name: "dfasbands".to_string(),
                kind: ColumnKind::Discrete,
            },
        ],
        |inputs: &Inputs| {
            let scores: Vec<Response> = inputs
                .map_rows(fas_score)
                .into_iter()
                .map(Response::from_f64)
                .collect();
            let bands = scores
                .iter()
                .map(|score| fas_band(*score).to_f64())
                .collect();
            vec![scores.into_iter().map(Response::to_f64).collect(), bands]
        },
    ));

    registry.register(Derivation::row_wise(
        "dtruant",
        Theme::General,
        names(&["truant"]),
        ColumnKind::Discrete,
        |row| yes_no(row[0], BinaryConvention::ZeroOne),
    ));

    registry.register(Derivation::row_wise(
        "dexclude",
        Theme::General,
        names(&["exclude"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[1, 2], 1.0), (&[3], 0.0)]),
    ));

    registry.register(Derivation::row_wise(
        "dfreeschmeal",
        Theme::General,
        names(&["fsm"]),
        ColumnKind::Discrete,
        |row| match row[0].code() {
            Some(3) => Response::DONT_KNOW,
            _ => yes_no(row[0], BinaryConvention::ZeroOne),
        },
    ));
}

/// Lifts ages from ten up to `low`, caps ages above `high`.
pub fn age_band(age: Response, low: f64, high: f64) -> Response {
    match age {
        Response::Missing(_) => age,
        Response::Value(value) if value >= BAND_FLOOR && value < low => Response::Value(low),
        Response::Value(value) if value > high => Response::Value(high),
        Response::Value(_) => age,
    }
}

/// Sums the affluence item scores; -7 counts as -9 and the strongest of
/// -9, -8, -1 wins.
fn fas_score(items: &[Response]) -> Response {
    let mut total = 0.0;
    let mut missing: Option<MissingCode> = None;
    for (item, (_, categories)) in items.iter().zip(FAS_ITEMS) {
        let item = promote_refusal(*item);
        match item {
            Response::Missing(code) => {
                missing = Some(missing.map_or(code, |current| current.stronger(code)));
            }
            Response::Value(_) => match item.code() {
                Some(code) if (1..=categories).contains(&code) => total += (code - 1) as f64,
                _ => missing = Some(MissingCode::NoAnswer),
            },
        }
    }
    missing.map_or(Response::Value(total), Response::Missing)
}

fn fas_band(score: Response) -> Response {
    band_inclusive(score, &[(0.0, 6.0, 1.0), (7.0, 9.0, 2.0), (10.0, 13.0, 3.0)])
}
