//! Alcohol derivations.
//!
//! Covers drinking status and recency, frequency, drunkenness, family
//! attitudes, sources of alcohol, and last-week consumption in units.
//!
//! Last-week units are computed per drink type from container counts. Each
//! container count is multiplied by its unit factor; where the pupil gave a
//! usual strength, the factor depends on it:
//!
//! - current table: NORMAL or STRONG multiplier per container, the mean of
//!   the two when the strength is not known;
//! - legacy table: the container factor times 1, 1.5 or 1.25 for normal,
//!   strong or don't know.
//!
//! A pupil who drank a type but less than its smallest container gets a
//! fixed low-consumption value instead.

use tracing::warn;

use sdd_model::{BinaryConvention, ColumnKind, MissingCode, Params, Response, UnitsTable};

use crate::recode::{any_of, band, last_applicable, partition, strongest, yes_no};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

/// A drink type asked about in the last-week diary.
#[derive(Debug, Clone, Copy)]
pub struct DrinkType {
    /// Short key used in column names, e.g. `brlr`.
    pub key: &'static str,
    /// Container count columns.
    pub containers: &'static [&'static str],
    /// Usual-strength column, when asked.
    pub strength: Option<&'static str>,
    /// Units assumed when less than the smallest container was drunk.
    pub low_consumption: f64,
}

impl DrinkType {
    /// Drank this type last week: 1 yes, 2 no.
    pub fn lead_in(&self) -> String {
        format!("al7{}", self.key)
    }

    /// Drank less than the smallest container: 1 yes.
    pub fn less_than(&self) -> String {
        format!("al7{}lt", self.key)
    }

    /// Derived last-week units for this type.
    pub fn units_column(&self) -> String {
        format!("nal7{}ut", self.key)
    }
}

const BEER: DrinkType = DrinkType {
    key: "brlr",
    containers: &["al7brlrpt", "al7brlrcn", "al7brlrbt"],
    strength: Some("al7brlrstr"),
    low_consumption: 0.5,
};

const CIDER: DrinkType = DrinkType {
    key: "cidr",
    containers: &["al7cidrpt", "al7cidrcn", "al7cidrbt"],
    strength: Some("al7cidrstr"),
    low_consumption: 0.5,
};

const WINE: DrinkType = DrinkType {
    key: "wine",
    containers: &["al7winegl", "al7winebt"],
    strength: None,
    low_consumption: 1.0,
};

const SPIRITS: DrinkType = DrinkType {
    key: "spir",
    containers: &["al7spirgl"],
    strength: None,
    low_consumption: 0.5,
};

const ALCOPOPS: DrinkType = DrinkType {
    key: "pops",
    containers: &["al7popsbt"],
    strength: None,
    low_consumption: 0.5,
};

const SHANDY: DrinkType = DrinkType {
    key: "shan",
    containers: &["al7shanpt", "al7shancn"],
    strength: None,
    low_consumption: 0.5,
};

/// Drink types asked about under the given units table.
pub fn drink_types(table: UnitsTable) -> Vec<DrinkType> {
    match table {
        UnitsTable::Current => vec![BEER, CIDER, WINE, SPIRITS, ALCOPOPS],
        UnitsTable::Legacy => vec![BEER, CIDER, WINE, SPIRITS, ALCOPOPS, SHANDY],
    }
}

const DRINKING_DAYS: [&str; 7] = [
    "al7dmon", "al7dtue", "al7dwed", "al7dthu", "al7dfri", "al7dsat", "al7dsun",
];

const GET_SOURCES: [&str; 6] = [
    "algetpar", "algetsib", "algetfr", "algetsh", "algetpub", "algetoth",
];

const BUY_SOURCES: [&str; 4] = ["albuysh", "albuypub", "albuyoff", "albuyoth"];

/// Upper edges of the seven last-week unit groups.
const UNIT_GROUP_EDGES: [f64; 6] = [1.0, 2.0, 4.0, 7.0, 11.0, 15.0];

pub(crate) fn register(registry: &mut DerivationRegistry, params: &Params) {
    registry.register(Derivation::row_wise(
        "dalevr",
        Theme::Alcohol,
        names(&["alevr"]),
        ColumnKind::Discrete,
        |row| yes_no(row[0], BinaryConvention::OneTwo),
    ));

    registry.register(Derivation::row_wise(
        "dallast5",
        Theme::Alcohol,
        names(&["alevr", "allast"]),
        ColumnKind::Discrete,
        |row| {
            last_drank(
                row[0],
                row[1],
                &[(&[1], 1.0), (&[2, 3], 2.0), (&[4, 5], 3.0), (&[6, 7], 4.0)],
                5.0,
            )
        },
    ));

    registry.register(Derivation::row_wise(
        "dallast3",
        Theme::Alcohol,
        names(&["alevr", "allast"]),
        ColumnKind::Discrete,
        |row| last_drank(row[0], row[1], &[(&[1, 2, 3], 1.0), (&[4, 5, 6, 7], 2.0)], 3.0),
    ));

    registry.register(Derivation::row_wise(
        "dallastwk",
        Theme::Alcohol,
        names(&["dallast5"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[1], 1.0), (&[2, 3, 4, 5], 2.0)]),
    ));

    registry.register(Derivation::row_wise(
        "dalfrq7",
        Theme::Alcohol,
        names(&["alevr", "alfreq"]),
        ColumnKind::Discrete,
        |row| match never_or_missing(row[0], 7.0) {
            Some(done) => done,
            None => partition(
                not_applicable_as_missing(row[1]),
                &[
                    (&[1, 2, 3], 1.0),
                    (&[4], 2.0),
                    (&[5], 3.0),
                    (&[6], 4.0),
                    (&[7], 5.0),
                    (&[8], 6.0),
                ],
            ),
        },
    ));

    registry.register(Derivation::row_wise(
        "dal4dru6",
        Theme::Alcohol,
        names(&["dallast5", "al4dr"]),
        ColumnKind::Discrete,
        |row| match row[0].code() {
            Some(1 | 2) => partition(
                not_applicable_as_missing(row[1]),
                &[(&[1], 1.0), (&[2], 2.0), (&[3], 3.0), (&[4], 4.0)],
            ),
            Some(3 | 4) => Response::Value(5.0),
            Some(5) => Response::Value(6.0),
            _ => strongest(&row[..1]),
        },
    ));

    registry.register(Derivation::row_wise(
        "dal4dru5",
        Theme::Alcohol,
        names(&["dal4dru6"]),
        ColumnKind::Discrete,
        |row| {
            partition(
                row[0],
                &[(&[1], 1.0), (&[2], 2.0), (&[3, 4], 3.0), (&[5], 4.0), (&[6], 5.0)],
            )
        },
    ));

    registry.register(Derivation::row_wise(
        "dalfam",
        Theme::Alcohol,
        names(&["alfamfeel", "alfamnd"]),
        ColumnKind::Discrete,
        family_attitude,
    ));

    let types = drink_types(params.units_table);
    for drink in &types {
        register_units(registry, params, *drink);
    }

    let mut total_inputs = names(&["alevr", "allast"]);
    total_inputs.extend(types.iter().map(DrinkType::units_column));
    registry.register(Derivation::row_wise(
        "nal7ut",
        Theme::Alcohol,
        total_inputs,
        ColumnKind::Continuous,
        total_units,
    ));

    registry.register(Derivation::row_wise(
        "nal7utg7",
        Theme::Alcohol,
        names(&["nal7ut"]),
        ColumnKind::Discrete,
        |row| band(row[0], &UNIT_GROUP_EDGES),
    ));

    let mut day_inputs = names(&["dallastwk"]);
    day_inputs.extend(names(&DRINKING_DAYS));
    registry.register(Derivation::row_wise(
        "dal7day",
        Theme::Alcohol,
        day_inputs,
        ColumnKind::Discrete,
        |row| drinking_days(row[0], &row[1..]),
    ));

    registry.register(Derivation::row_wise(
        "dal7daymean",
        Theme::Alcohol,
        names(&["nal7ut", "dal7day"]),
        ColumnKind::Continuous,
        |row| match (row[0], row[1]) {
            (Response::Value(units), Response::Value(days)) if days > 0.0 => {
                Response::Value(units / days)
            }
            (Response::Value(_), Response::Value(_)) => Response::NOT_APPLICABLE,
            _ => row[0].merge(row[1]),
        },
    ));

    registry.register(Derivation::row_wise(
        "dalgetany",
        Theme::Alcohol,
        names(&GET_SOURCES),
        ColumnKind::Discrete,
        |row| any_of(row, |member| member.is(1), BinaryConvention::ZeroOne),
    ));

    registry.register(Derivation::row_wise(
        "dalbuyany",
        Theme::Alcohol,
        names(&BUY_SOURCES),
        ColumnKind::Discrete,
        |row| any_of(row, |member| member.is(1), BinaryConvention::ZeroOne),
    ));
}

/// Resolves "never drank" and unknown drinking status; `None` means the
/// pupil has drunk and the detail question decides.
fn never_or_missing(alevr: Response, never: f64) -> Option<Response> {
    match alevr {
        Response::Missing(MissingCode::NotApplicable) => Some(Response::NO_ANSWER),
        Response::Missing(_) => Some(alevr),
        Response::Value(_) if alevr.is(2) => Some(Response::Value(never)),
        Response::Value(_) if alevr.is(1) => None,
        Response::Value(_) => Some(Response::NO_ANSWER),
    }
}

/// Routed-past detail questions for a pupil who should have answered them.
fn not_applicable_as_missing(response: Response) -> Response {
    if response == Response::NOT_APPLICABLE {
        Response::NO_ANSWER
    } else {
        response
    }
}

/// Groups the time since the last drink; pupils who never drank get `never`.
pub fn last_drank(
    alevr: Response,
    allast: Response,
    groups: &[(&[i64], f64)],
    never: f64,
) -> Response {
    never_or_missing(alevr, never)
        .unwrap_or_else(|| partition(not_applicable_as_missing(allast), groups))
}

fn family_attitude(sources: &[Response]) -> Response {
    partition(
        last_applicable(sources),
        &[(&[1, 2], 1.0), (&[3], 2.0), (&[4], 3.0)],
    )
}

/// Unit factor of a container given the stated usual strength.
fn strength_factor(params: &Params, container: &str, strength: Option<Response>) -> f64 {
    let normal = params.unit_factor(container, false);
    let strong = params.unit_factor(container, true);
    let (Some(normal), Some(strong)) = (normal, strong) else {
        warn!(container, "no unit factor configured, container counts as zero units");
        return 0.0;
    };
    let Some(strength) = strength else {
        return normal;
    };
    match (params.units_table, strength.code()) {
        (UnitsTable::Current, Some(1)) => normal,
        (UnitsTable::Current, Some(2)) => strong,
        (UnitsTable::Current, _) => (normal + strong) / 2.0,
        (UnitsTable::Legacy, Some(1)) => normal,
        (UnitsTable::Legacy, Some(2)) => normal * 1.5,
        (UnitsTable::Legacy, _) => normal * 1.25,
    }
}

/// Per-strength unit factors for each container, resolved once at
/// registration: `[normal, strong, unknown]`.
fn container_factors(params: &Params, drink: DrinkType) -> Vec<[f64; 3]> {
    drink
        .containers
        .iter()
        .map(|container| match drink.strength {
            None => [strength_factor(params, container, None); 3],
            Some(_) => [
                strength_factor(params, container, Some(Response::Value(1.0))),
                strength_factor(params, container, Some(Response::Value(2.0))),
                strength_factor(params, container, Some(Response::DONT_KNOW)),
            ],
        })
        .collect()
}

fn register_units(registry: &mut DerivationRegistry, params: &Params, drink: DrinkType) {
    let mut inputs = vec![drink.lead_in(), drink.less_than()];
    if let Some(strength) = drink.strength {
        inputs.push(strength.to_string());
    }
    inputs.extend(names(drink.containers));
    let factors = container_factors(params, drink);
    let has_strength = drink.strength.is_some();
    registry.register(Derivation::row_wise(
        drink.units_column(),
        Theme::Alcohol,
        inputs,
        ColumnKind::Continuous,
        move |row| {
            let (strength, counts) = if has_strength {
                (Some(row[2]), &row[3..])
            } else {
                (None, &row[2..])
            };
            type_units(row[0], row[1], strength, counts, &factors, drink.low_consumption)
        },
    ));
}

/// Last-week units for one drink type.
fn type_units(
    lead_in: Response,
    less_than: Response,
    strength: Option<Response>,
    counts: &[Response],
    factors: &[[f64; 3]],
    low_consumption: f64,
) -> Response {
    match lead_in {
        Response::Missing(MissingCode::NotApplicable) => return Response::Value(0.0),
        Response::Missing(_) => return Response::NO_ANSWER,
        Response::Value(_) if lead_in.is(2) => return Response::Value(0.0),
        Response::Value(_) if !lead_in.is(1) => return Response::NO_ANSWER,
        Response::Value(_) => {}
    }
    if less_than.is(1) {
        return Response::Value(low_consumption);
    }
    let slot = match strength.and_then(Response::code) {
        Some(1) => 0,
        Some(2) => 1,
        _ => 2,
    };
    let mut units = 0.0;
    for (count, factor) in counts.iter().zip(factors) {
        match count {
            Response::Value(count) => units += count * factor[slot],
            Response::Missing(MissingCode::NotApplicable) => {}
            Response::Missing(_) => return Response::NO_ANSWER,
        }
    }
    Response::Value(units)
}

/// Total last-week units; inputs are `alevr`, `allast`, then one units
/// column per drink type.
fn total_units(row: &[Response]) -> Response {
    let (alevr, allast, per_type) = (row[0], row[1], &row[2..]);
    if alevr.is_unknown() || allast.is_unknown() || alevr == Response::NOT_APPLICABLE {
        return Response::NO_ANSWER;
    }
    if alevr.is(2) || (alevr.is(1) && allast.code().is_some_and(|code| code != 1)) {
        return Response::Value(0.0);
    }
    if !alevr.is(1) || !allast.is(1) {
        return Response::NO_ANSWER;
    }
    let mut total = 0.0;
    for units in per_type {
        match units {
            Response::Value(units) => total += units,
            Response::Missing(_) => return Response::NO_ANSWER,
        }
    }
    Response::Value(total)
}

/// Days drunk on in the last week, zero for pupils who did not drink.
fn drinking_days(last_week: Response, days: &[Response]) -> Response {
    match last_week.code() {
        Some(2) => return Response::Value(0.0),
        Some(1) => {}
        _ => return strongest(&[last_week]),
    }
    let count = days.iter().filter(|day| day.is(1)).count();
    if count > 0 {
        return Response::Value(count as f64);
    }
    match Response::strongest_unknown(days.iter().copied()) {
        Some(code) => Response::Missing(code),
        None => Response::NO_ANSWER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(v: f64) -> Response {
        Response::Value(v)
    }

    #[test]
    fn last_drank_three_groups() {
        let pairs = [
            (1.0, 1.0),
            (1.0, 2.0),
            (1.0, 3.0),
            (1.0, 4.0),
            (1.0, 5.0),
            (-7.0, 2.0),
            (-8.0, -1.0),
            (-9.0, -1.0),
            (1.0, 6.0),
            (1.0, 7.0),
            (2.0, -1.0),
        ];
        let groups: &[(&[i64], f64)] = &[(&[1, 2, 3], 1.0), (&[4, 5, 6, 7], 2.0)];
        let derived: Vec<f64> = pairs
            .iter()
            .map(|(alevr, allast)| {
                last_drank(Response::from_f64(*alevr), Response::from_f64(*allast), groups, 3.0)
                    .to_f64()
            })
            .collect();
        assert_eq!(
            derived,
            vec![1.0, 1.0, 1.0, 2.0, 2.0, -7.0, -8.0, -9.0, 2.0, 2.0, 3.0]
        );
    }

    #[test]
    fn type_units_current_table() {
        let params = Params::default();
        let factors = container_factors(&params, BEER);
        // Two pints of strong beer and one normal can.
        let counts = [value(2.0), value(1.0), value(0.0)];
        let strong = type_units(value(1.0), value(2.0), Some(value(2.0)), &counts, &factors, 0.5);
        assert_eq!(strong, value(2.0 * 3.0 + 2.5));
        let unknown = type_units(value(1.0), value(2.0), Some(Response::DONT_KNOW), &counts, &factors, 0.5);
        assert_eq!(unknown, value(2.0 * 2.5 + 2.0));
        let less = type_units(value(1.0), value(1.0), None, &counts, &factors, 0.5);
        assert_eq!(less, value(0.5));
        assert_eq!(
            type_units(Response::DONT_KNOW, value(2.0), None, &counts, &factors, 0.5),
            Response::NO_ANSWER
        );
        assert_eq!(
            type_units(value(2.0), Response::NOT_APPLICABLE, None, &counts, &factors, 0.5),
            value(0.0)
        );
    }

    #[test]
    fn type_units_legacy_strength_multiplier() {
        let params = Params {
            units_table: UnitsTable::Legacy,
            ..Params::default()
        };
        let factors = container_factors(&params, BEER);
        let counts = [value(1.0), value(0.0), value(0.0)];
        assert_eq!(
            type_units(value(1.0), value(2.0), Some(value(2.0)), &counts, &factors, 0.5),
            value(3.0)
        );
        assert_eq!(
            type_units(value(1.0), value(2.0), Some(Response::NO_ANSWER), &counts, &factors, 0.5),
            value(2.5)
        );
    }

    #[test]
    fn total_units_sum_and_missing() {
        let row = [1.0, 1.0, 2.0, 2.0, 3.0, 4.0, 5.0].map(value);
        assert_eq!(total_units(&row), value(16.0));
        let mut row = row;
        row[4] = Response::NO_ANSWER;
        assert_eq!(total_units(&row), Response::NO_ANSWER);
        let not_last_week = [1.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0].map(value);
        assert_eq!(total_units(&not_last_week), value(0.0));
        let mut unknown = not_last_week;
        unknown[1] = Response::DONT_KNOW;
        assert_eq!(total_units(&unknown), Response::NO_ANSWER);
    }

    #[test]
    fn drinking_days_counts() {
        let mut days = [2.0; 7].map(value);
        days[0] = value(1.0);
        days[5] = value(1.0);
        assert_eq!(drinking_days(value(1.0), &days), value(2.0));
        assert_eq!(drinking_days(value(2.0), &days), value(0.0));
        assert_eq!(drinking_days(Response::DONT_KNOW, &days), Response::DONT_KNOW);
    }

    #[test]
    fn family_attitude_prefers_last_applicable() {
        assert_eq!(family_attitude(&[value(3.0), Response::NOT_APPLICABLE]), value(2.0));
        assert_eq!(family_attitude(&[value(3.0), value(1.0)]), value(1.0));
        assert_eq!(
            family_attitude(&[Response::NOT_APPLICABLE, Response::NOT_APPLICABLE]),
            Response::NOT_APPLICABLE
        );
    }
}
