//! Exclusion flags.
//!
//! Flags share the derivation registry's shape but always produce 0 or 1;
//! a missing input never raises a flag. The composite alcohol flag is the OR
//! of the three alcohol flags, so it stays set once any of them is set.

use sdd_model::{ColumnKind, Params, Response};

use crate::alcohol::drink_types;
use crate::drugs::{offered_column, tried_column};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};
use crate::smoking::WEEKDAY_COUNTS;

pub const DUMMY_DRUG_FLAG: &str = "dflagdummy";
pub const CIGARETTE_FLAG: &str = "dflagcig";
pub const ALCOHOL_QUANTITY_FLAG: &str = "dflagalcqty";
pub const ALCOHOL_ALL_TYPES_FLAG: &str = "dflagalcall";
pub const ALCOHOL_DAILY_FLAG: &str = "dflagalcdaily";
pub const ALCOHOL_FLAG: &str = "dflagalc";

fn flag(raised: bool) -> Response {
    Response::Value(if raised { 1.0 } else { 0.0 })
}

fn at_least(response: Response, threshold: f64) -> bool {
    response.value().is_some_and(|value| value >= threshold)
}

/// Builds the exclusion flags in evaluation order.
pub fn build_flag_registry(params: &Params) -> DerivationRegistry {
    let mut registry = DerivationRegistry::new();

    registry.register(Derivation::row_wise(
        DUMMY_DRUG_FLAG,
        Theme::Flags,
        vec![
            offered_column(&params.dummy_drug),
            tried_column(&params.dummy_drug),
        ],
        ColumnKind::Discrete,
        |row| flag(row.iter().any(|answer| answer.is(1))),
    ));

    let cig_limit = params.high_cig_quantity;
    registry.register(Derivation::row_wise(
        CIGARETTE_FLAG,
        Theme::Flags,
        names(&WEEKDAY_COUNTS),
        ColumnKind::Discrete,
        move |row| flag(row.iter().any(|count| at_least(*count, cig_limit))),
    ));

    let types = drink_types(params.units_table);
    let alc_limit = params.high_alc_quantity;
    let containers: Vec<String> = types
        .iter()
        .flat_map(|drink| drink.containers.iter().map(|name| (*name).to_string()))
        .collect();
    registry.register(Derivation::row_wise(
        ALCOHOL_QUANTITY_FLAG,
        Theme::Flags,
        containers,
        ColumnKind::Discrete,
        move |row| flag(row.iter().any(|count| at_least(*count, alc_limit))),
    ));

    registry.register(Derivation::row_wise(
        ALCOHOL_ALL_TYPES_FLAG,
        Theme::Flags,
        types.iter().map(|drink| drink.units_column()).collect(),
        ColumnKind::Discrete,
        |row| {
            flag(
                row.iter()
                    .all(|units| units.value().is_some_and(|value| value > 0.0)),
            )
        },
    ));

    let daily_limit = params.high_alc_daily;
    registry.register(Derivation::row_wise(
        ALCOHOL_DAILY_FLAG,
        Theme::Flags,
        names(&["dal7daymean"]),
        ColumnKind::Discrete,
        move |row| flag(row[0].value().is_some_and(|mean| mean > daily_limit)),
    ));

    registry.register(Derivation::row_wise(
        ALCOHOL_FLAG,
        Theme::Flags,
        names(&[
            ALCOHOL_QUANTITY_FLAG,
            ALCOHOL_ALL_TYPES_FLAG,
            ALCOHOL_DAILY_FLAG,
        ]),
        ColumnKind::Discrete,
        |row| flag(row.iter().any(|raised| raised.is(1))),
    ));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_order_ends_with_composite() {
        let registry = build_flag_registry(&Params::default());
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                DUMMY_DRUG_FLAG,
                CIGARETTE_FLAG,
                ALCOHOL_QUANTITY_FLAG,
                ALCOHOL_ALL_TYPES_FLAG,
                ALCOHOL_DAILY_FLAG,
                ALCOHOL_FLAG,
            ]
        );
        assert!(registry.raw_inputs().contains(&"dgofsem"));
    }

    #[test]
    fn thresholds_are_inclusive_for_counts() {
        assert!(at_least(Response::Value(40.0), 40.0));
        assert!(!at_least(Response::NO_ANSWER, 1.0));
    }
}
