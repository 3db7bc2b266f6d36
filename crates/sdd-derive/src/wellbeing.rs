//! Wellbeing derivations: the four personal wellbeing questions, each
//! answered on a 0 to 10 scale, banded into four groups.

use sdd_model::{BinaryConvention, ColumnKind, Response};

use crate::recode::{any_of, band_inclusive};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

/// Satisfaction, worthwhile and happiness: low, medium, high, very high.
const POSITIVE_BANDS: [(f64, f64, f64); 4] = [
    (0.0, 4.0, 1.0),
    (5.0, 6.0, 2.0),
    (7.0, 8.0, 3.0),
    (9.0, 10.0, 4.0),
];

/// Anxiety: very low, low, medium, high.
const ANXIETY_BANDS: [(f64, f64, f64); 4] = [
    (0.0, 1.0, 1.0),
    (2.0, 3.0, 2.0),
    (4.0, 5.0, 3.0),
    (6.0, 10.0, 4.0),
];

pub(crate) fn register(registry: &mut DerivationRegistry) {
    for (name, raw) in [
        ("dlifsat", "lifesat"),
        ("dlifwor", "lifewor"),
        ("dlifhap", "lifehap"),
    ] {
        registry.register(Derivation::row_wise(
            name,
            Theme::Wellbeing,
            names(&[raw]),
            ColumnKind::Discrete,
            |row| band_inclusive(row[0], &POSITIVE_BANDS),
        ));
    }
    registry.register(Derivation::row_wise(
        "dlifanx",
        Theme::Wellbeing,
        names(&["lifeanx"]),
        ColumnKind::Discrete,
        |row| band_inclusive(row[0], &ANXIETY_BANDS),
    ));

    registry.register(Derivation::row_wise(
        "dlowwellany",
        Theme::Wellbeing,
        names(&["dlifsat", "dlifwor", "dlifhap", "dlifanx"]),
        ColumnKind::Discrete,
        low_wellbeing,
    ));
}

/// 1 when any measure is in its worst band: low satisfaction, worthwhile or
/// happiness, or high anxiety.
fn low_wellbeing(bands: &[Response]) -> Response {
    let worst = [1, 1, 1, 4];
    let flagged: Vec<Response> = bands
        .iter()
        .zip(worst)
        .map(|(band, worst)| match band {
            Response::Value(_) => Response::Value(if band.is(worst) { 1.0 } else { 0.0 }),
            missing => *missing,
        })
        .collect();
    any_of(&flagged, |member| member.is(1), BinaryConvention::ZeroOne)
}
