//! Smoking derivations.

use sdd_model::{BinaryConvention, ColumnKind, MissingCode, Response};

use crate::recode::{any_of, band, last_applicable, partition, strongest};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

/// Cigarettes smoked on each day of the last week.
pub const WEEKDAY_COUNTS: [&str; 7] = [
    "cg7mon", "cg7tue", "cg7wed", "cg7thu", "cg7fri", "cg7sat", "cg7sun",
];

const GET_SOURCES: [&str; 5] = ["cggetsh", "cggetfr", "cggetsib", "cggetpar", "cggetoth"];

const BUY_SOURCES: [&str; 3] = ["cgbuysh", "cgbuyven", "cgbuyoth"];

pub(crate) fn register(registry: &mut DerivationRegistry) {
    registry.register(Derivation::row_wise(
        "dcgevr",
        Theme::Smoking,
        names(&["cgstat"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[2, 3, 4, 5, 6], 1.0), (&[1], 2.0)]),
    ));

    let mut last_week = names(&["cg7"]);
    last_week.extend(names(&WEEKDAY_COUNTS));
    registry.register(Derivation::row_wise(
        "dcg7",
        Theme::Smoking,
        last_week,
        ColumnKind::Discrete,
        |row| smoked_last_week(row[0], &row[1..]),
    ));

    let mut total = names(&["dcg7"]);
    total.extend(names(&WEEKDAY_COUNTS));
    registry.register(Derivation::row_wise(
        "dcg7tot",
        Theme::Smoking,
        total,
        ColumnKind::Discrete,
        |row| week_total(row[0], &row[1..]),
    ));

    registry.register(Derivation::row_wise(
        "dcg7totg",
        Theme::Smoking,
        names(&["dcg7tot"]),
        ColumnKind::Discrete,
        |row| band(row[0], &[1.0, 7.0, 21.0, 71.0]),
    ));

    let mut ladder = names(&["cgstat", "cgireg", "cg7"]);
    ladder.extend(names(&WEEKDAY_COUNTS));
    registry.register(Derivation::row_wise(
        "dcgstg5",
        Theme::Smoking,
        ladder,
        ColumnKind::Discrete,
        |row| smoking_status(row[0], row[1], row[2], &row[3..]),
    ));

    registry.register(Derivation::row_wise(
        "dcgstg3",
        Theme::Smoking,
        names(&["dcgstg5"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[1], 1.0), (&[2], 2.0), (&[3, 4, 5], 3.0)]),
    ));

    registry.register(Derivation::row_wise(
        "dcgstg2",
        Theme::Smoking,
        names(&["dcgstg3"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[1, 2], 1.0), (&[3], 2.0)]),
    ));

    registry.register(Derivation::row_wise(
        "dcgfam",
        Theme::Smoking,
        names(&["cgfamfeel", "cgfamnd"]),
        ColumnKind::Discrete,
        |row| partition(last_applicable(row), &[(&[1, 2], 1.0), (&[3], 2.0), (&[4], 3.0)]),
    ));

    registry.register(Derivation::row_wise(
        "dcggupany",
        Theme::Smoking,
        names(&GET_SOURCES),
        ColumnKind::Discrete,
        |row| any_of(row, |member| member.is(1), BinaryConvention::ZeroOne),
    ));

    registry.register(Derivation::row_wise(
        "dcgbuyany",
        Theme::Smoking,
        names(&BUY_SOURCES),
        ColumnKind::Discrete,
        |row| any_of(row, |member| member.is(1), BinaryConvention::ZeroOne),
    ));
}

fn any_positive(counts: &[Response]) -> bool {
    counts
        .iter()
        .any(|count| count.value().is_some_and(|value| value > 0.0))
}

/// 1 if the pupil smoked in the last seven days, 0 if not.
fn smoked_last_week(cg7: Response, counts: &[Response]) -> Response {
    if cg7.is(1) || any_positive(counts) {
        return Response::Value(1.0);
    }
    match cg7 {
        Response::Missing(MissingCode::NotApplicable) => Response::Value(0.0),
        Response::Value(_) if cg7.is(2) => Response::Value(0.0),
        _ => strongest(&[cg7]),
    }
}

/// Cigarettes smoked in the last seven days.
fn week_total(smoked: Response, counts: &[Response]) -> Response {
    match smoked.code() {
        Some(0) => return Response::Value(0.0),
        Some(1) => {}
        _ => return strongest(&[smoked]),
    }
    if let Some(code) = Response::strongest_unknown(counts.iter().copied()) {
        return Response::Missing(code);
    }
    Response::Value(counts.iter().filter_map(|count| count.value()).sum())
}

/// Five-way smoking ladder.
///
/// 1 regular, 2 occasional, 3 ex-regular, 4 tried or ex-occasional,
/// 5 never. Smoking in the last week upgrades any non-smoker to occasional.
pub fn smoking_status(
    cgstat: Response,
    cgireg: Response,
    cg7: Response,
    counts: &[Response],
) -> Response {
    let status = match cgstat.code() {
        Some(5 | 6) => return Response::Value(1.0),
        Some(4) => return Response::Value(2.0),
        Some(code @ 1..=3) => code,
        _ => return strongest(&[cgstat]),
    };
    if cg7.is(1) || any_positive(counts) {
        return Response::Value(2.0);
    }
    match status {
        1 => Response::Value(5.0),
        2 => Response::Value(4.0),
        _ if cgireg.is(1) => Response::Value(3.0),
        _ if cgireg.is_unknown() => cgireg,
        _ => Response::Value(4.0),
    }
}
