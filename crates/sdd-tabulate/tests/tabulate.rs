use std::collections::BTreeSet;

use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use proptest::prelude::*;

use sdd_ingest::RecordSet;
use sdd_model::{Params, SddError, Subgroup, TableQuery, TableSpec};
use sdd_tabulate::{tabulate, weighted_mean, weighted_median};

fn record_set(columns: Vec<(&str, Vec<f64>)>) -> RecordSet {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| Series::new(name.into(), values).into())
        .collect();
    RecordSet::from_frame(DataFrame::new(columns).expect("frame"))
}

fn floats(frame: &DataFrame, name: &str) -> Vec<f64> {
    frame
        .column(name)
        .expect(name)
        .f64()
        .expect("f64")
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect()
}

fn counts(frame: &DataFrame, name: &str) -> Vec<u64> {
    frame
        .column(name)
        .expect(name)
        .u64()
        .expect("u64")
        .into_no_null_iter()
        .collect()
}

fn ints(frame: &DataFrame, name: &str) -> Vec<i64> {
    frame
        .column(name)
        .expect(name)
        .i64()
        .expect("i64")
        .into_iter()
        .map(|value| value.unwrap_or(i64::MIN))
        .collect()
}

fn strings(frame: &DataFrame, name: &str) -> Vec<String> {
    frame
        .column(name)
        .expect(name)
        .str()
        .expect("str")
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect()
}

/// Six pupils, sex by q with weights, repeated 30 times over 30 schools in
/// each of two regions.
fn sex_by_q() -> RecordSet {
    let pupils = [
        (1.0, 1.0, 0.5),
        (1.0, 2.0, 0.5),
        (1.0, 3.0, 1.0),
        (2.0, 1.0, 2.0),
        (2.0, 2.0, 0.5),
        (2.0, 3.0, 1.5),
    ];
    let mut sex = Vec::new();
    let mut q = Vec::new();
    let mut weight = Vec::new();
    let mut region = Vec::new();
    let mut school = Vec::new();
    for rep in 0..30 {
        for (idx, (s, answer, w)) in pupils.iter().enumerate() {
            sex.push(*s);
            q.push(*answer);
            weight.push(*w);
            region.push((idx % 2 + 1) as f64);
            school.push(f64::from(rep));
        }
    }
    record_set(vec![
        ("sex", sex),
        ("q", q),
        ("pupilwt", weight),
        ("gor", region),
        ("archschn", school),
    ])
}

fn single(question: &str) -> TableQuery {
    TableQuery::SingleResponse {
        question: question.into(),
        subgroup: Vec::new(),
    }
}

fn close(actual: &[f64], expected: &[f64]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(a, e)| (a - e).abs() < 0.01)
}

#[test]
fn single_response_by_sex() {
    let spec = TableSpec::new("q_by_sex", single("q")).with_breakdowns(["sex"]);
    let table = tabulate(&sex_by_q(), &spec, &Params::default()).expect("tabulate");
    let raw = &table.raw;

    assert_eq!(ints(raw, "sex"), vec![1, 1, 1, 2, 2, 2, 9999, 9999, 9999]);
    assert_eq!(ints(raw, "q"), vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
    assert!(close(
        &floats(raw, "NumerW"),
        &[15.0, 15.0, 30.0, 60.0, 15.0, 45.0, 75.0, 30.0, 75.0]
    ));
    assert!(close(
        &floats(raw, "DenomW"),
        &[60.0, 60.0, 60.0, 120.0, 120.0, 120.0, 180.0, 180.0, 180.0]
    ));
    assert_eq!(
        counts(raw, "DenomU"),
        vec![90, 90, 90, 90, 90, 90, 180, 180, 180]
    );
    assert!(close(
        &floats(raw, "Percentage"),
        &[25.0, 25.0, 50.0, 50.0, 12.5, 37.5, 41.67, 16.67, 41.67]
    ));
    assert_eq!(
        strings(raw, "Breakdown_type"),
        [vec!["sex_q"; 6], vec!["q"; 3]].concat()
    );
    assert_eq!(strings(raw, "Year"), vec!["2021"; 9]);

    let formatted = strings(&table.formatted, "Percentage");
    assert_eq!(&formatted[..6], ["25", "25", "50", "50", "12.5", "37.5"]);
    for (lower, upper) in floats(raw, "lower_ci").iter().zip(floats(raw, "upper_ci")) {
        assert!(0.0 <= *lower && *lower <= upper && upper <= 100.0);
    }
}

#[test]
fn unweighted_counts_add_up_to_base() {
    let spec = TableSpec::new("q_by_sex", single("q")).with_breakdowns(["sex"]);
    let table = tabulate(&sex_by_q(), &spec, &Params::default()).expect("tabulate");
    let numer_u = counts(&table.raw, "NumerU");
    let denom_u = counts(&table.raw, "DenomU");
    for block in 0..3 {
        let cells = block * 3..block * 3 + 3;
        assert_eq!(numer_u[cells.clone()].iter().sum::<u64>(), denom_u[cells.start]);
    }
}

#[test]
fn every_subset_gets_a_breakdown_type() {
    let mut set = sex_by_q();
    let age: Vec<f64> = (0..set.height()).map(|row| 13.0 + (row % 3) as f64).collect();
    set.set_column("age1315", age, sdd_model::ColumnKind::Discrete)
        .expect("age column");
    let spec = TableSpec::new("q_by_sex_age", single("q"))
        .with_breakdowns(["sex", "age1315"])
        .without_variance();
    let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
    let types: BTreeSet<String> = strings(&table.raw, "Breakdown_type").into_iter().collect();
    let listing: Vec<String> = types.into_iter().collect();
    insta::assert_snapshot!(listing.join("\n"), @r"
    age1315_q
    q
    sex_age1315_q
    sex_q
    ");
    assert!(floats(&table.raw, "std_err").iter().all(|value| value.is_nan()));
}

#[test]
fn subgroups_share_denominator_and_filter_applies() {
    let spec = TableSpec::new(
        "q_girls",
        TableQuery::SingleResponse {
            question: "q".into(),
            subgroup: vec![Subgroup {
                code: 12,
                codes: vec![1, 2],
            }],
        },
    )
    .with_filter("sex == 2");
    let table = tabulate(&sex_by_q(), &spec, &Params::default()).expect("tabulate");
    assert_eq!(ints(&table.raw, "q"), vec![1, 2, 3, 12]);
    assert!(close(
        &floats(&table.raw, "Percentage"),
        &[50.0, 12.5, 37.5, 62.5]
    ));
    assert_eq!(counts(&table.raw, "DenomU"), vec![90; 4]);
}

#[test]
fn multi_question_templates_the_filter() {
    let mut set = sex_by_q();
    let height = set.height();
    set.set_column(
        "q2",
        (0..height).map(|row| if row % 2 == 0 { 1.0 } else { -9.0 }).collect(),
        sdd_model::ColumnKind::Discrete,
    )
    .expect("q2");
    let spec = TableSpec::new(
        "questions",
        TableQuery::MultiQuestion {
            questions: vec!["q".into(), "q2".into()],
            subgroup: Vec::new(),
        },
    )
    .with_filter("{question} != 3")
    .with_year("2023");
    let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
    let questions = strings(&table.raw, "Question");
    assert_eq!(questions, vec!["q", "q", "q2"]);
    assert_eq!(ints(&table.raw, "Response"), vec![1, 2, 1]);
    assert_eq!(counts(&table.raw, "DenomU"), vec![120, 120, 90]);
    assert_eq!(strings(&table.raw, "Year"), vec!["2023"; 3]);
}

#[test]
fn continuous_shares_add_up_to_total() {
    let mut set = sex_by_q();
    let height = set.height();
    let beer: Vec<f64> = (0..height).map(|row| (row % 4) as f64).collect();
    let wine: Vec<f64> = (0..height).map(|row| (row % 3) as f64).collect();
    let total: Vec<f64> = beer.iter().zip(&wine).map(|(b, w)| b + w).collect();
    for (name, values) in [("nal7brlrut", beer), ("nal7wineut", wine), ("nal7ut", total)] {
        set.set_column(name, values, sdd_model::ColumnKind::Continuous)
            .expect(name);
    }
    let spec = TableSpec::new(
        "units_by_type",
        TableQuery::MultiContinuous {
            responses: vec!["nal7brlrut".into(), "nal7wineut".into()],
            base: "nal7ut".into(),
        },
    )
    .with_breakdowns(["sex"]);
    let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
    let raw = &table.raw;
    let sex = ints(raw, "sex");
    let numer = floats(raw, "NumerW");
    let total = floats(raw, "DenomTotalW");
    for key in [1, 2, 9999] {
        let cells: Vec<usize> = (0..sex.len()).filter(|&idx| sex[idx] == key).collect();
        assert_eq!(cells.len(), 2);
        let sum: f64 = cells.iter().map(|&idx| numer[idx]).sum();
        assert!((sum - total[cells[0]]).abs() < 1e-9);
    }
}

#[test]
fn statistics_report_mean_and_median() {
    let mut set = sex_by_q();
    let height = set.height();
    let units: Vec<f64> = (0..height).map(|row| (row % 5) as f64).collect();
    set.set_column("nal7ut", units.clone(), sdd_model::ColumnKind::Continuous)
        .expect("units");
    let weights = floats(&set.data, "pupilwt");
    let pairs: Vec<(f64, f64)> = units.into_iter().zip(weights).collect();
    let spec = TableSpec::new(
        "units",
        TableQuery::Statistics {
            questions: vec!["nal7ut".into()],
            base: "q".into(),
        },
    );
    let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
    assert_eq!(table.height(), 1);
    let mean = floats(&table.raw, "Mean")[0];
    assert!((mean - weighted_mean(&pairs).expect("mean")).abs() < 1e-9);
    assert_eq!(floats(&table.raw, "Median"), vec![weighted_median(&pairs).expect("median")]);
    assert!(floats(&table.raw, "std_err")[0] > 0.0);
    assert_eq!(strings(&table.formatted, "Question"), vec!["nal7ut"]);
}

#[test]
fn discrete_responses_use_their_own_base() {
    let mut set = sex_by_q();
    let height = set.height();
    set.set_column(
        "dalgetpar",
        (0..height).map(|row| if row % 3 == 0 { 1.0 } else { 0.0 }).collect(),
        sdd_model::ColumnKind::Discrete,
    )
    .expect("response");
    set.set_column(
        "dalevr",
        (0..height).map(|row| if row % 2 == 0 { 1.0 } else { -9.0 }).collect(),
        sdd_model::ColumnKind::Discrete,
    )
    .expect("base");
    let spec = TableSpec::new(
        "sources",
        TableQuery::MultiDiscrete {
            responses: vec!["dalgetpar".into()],
            bases: vec!["dalevr".into()],
        },
    );
    let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
    assert_eq!(counts(&table.raw, "DenomU"), vec![90]);
    assert_eq!(counts(&table.raw, "NumerU"), vec![30]);
}

#[test]
fn configuration_errors_name_the_table() {
    let params = Params::default();
    let unknown = TableSpec::new("t1", single("nope"));
    let error = tabulate(&sex_by_q(), &unknown, &params).unwrap_err();
    let typed = error.downcast_ref::<SddError>().expect("typed");
    assert!(matches!(typed, SddError::UnknownColumn { table, column } if table == "t1" && column == "nope"));
    assert!(!typed.is_structural());

    let bad_filter = TableSpec::new("t2", single("q")).with_filter("sex ==");
    let error = tabulate(&sex_by_q(), &bad_filter, &params).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SddError>(),
        Some(SddError::FilterParse { table, .. }) if table == "t2"
    ));
}

#[test]
fn structural_errors_halt() {
    let params = Params::default();
    let spec = TableSpec::new("t", single("q"));
    let empty = sex_by_q().filter_rows(&[false; 180]).expect("empty");
    let error = tabulate(&empty, &spec, &params).unwrap_err();
    assert!(error.downcast_ref::<SddError>().expect("typed").is_structural());

    let mut no_psu = sex_by_q();
    no_psu.drop_columns(&["archschn".to_string()]).expect("drop");
    let error = tabulate(&no_psu, &spec, &params).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SddError>(),
        Some(SddError::MissingColumn { column, .. }) if column == "archschn"
    ));
}

fn pupil() -> impl proptest::strategy::Strategy<Value = (f64, f64, f64)> {
    (
        prop::sample::select(vec![1.0, 2.0, -9.0]),
        prop::sample::select(vec![1.0, 2.0, 3.0, -1.0, -8.0]),
        0.2f64..4.0,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn marginals_are_consistent(pupils in prop::collection::vec(pupil(), 1..160)) {
        let n = pupils.len();
        let set = record_set(vec![
            ("sex", pupils.iter().map(|p| p.0).collect()),
            ("q", pupils.iter().map(|p| p.1).collect()),
            ("pupilwt", pupils.iter().map(|p| p.2).collect()),
            ("gor", (0..n).map(|row| (row % 3) as f64).collect()),
            ("archschn", (0..n).map(|row| (row % 11) as f64).collect()),
        ]);
        let spec = TableSpec::new("p", single("q")).with_breakdowns(["sex"]);
        let table = tabulate(&set, &spec, &Params::default()).expect("tabulate");
        let raw = &table.raw;
        let sex = ints(raw, "sex");
        let numer = floats(raw, "NumerW");
        let denom = floats(raw, "DenomW");
        let denom_u = counts(raw, "DenomU");
        let percentage = floats(raw, "Percentage");
        let lower = floats(raw, "lower_ci");
        let upper = floats(raw, "upper_ci");
        let formatted = strings(&table.formatted, "Percentage");

        for key in sex.iter().collect::<BTreeSet<_>>() {
            let cells: Vec<usize> = (0..sex.len()).filter(|&idx| sex[idx] == *key).collect();
            let sum: f64 = cells.iter().map(|&idx| numer[idx]).sum();
            prop_assert!((sum - denom[cells[0]]).abs() < 1e-9);
        }
        for idx in 0..sex.len() {
            prop_assert!((0.0..=100.0).contains(&percentage[idx]));
            prop_assert!(0.0 <= lower[idx] && lower[idx] <= upper[idx] && upper[idx] <= 100.0);
            let cell = &formatted[idx];
            if denom_u[idx] < 30 {
                prop_assert_eq!(cell.as_str(), "u");
            } else if denom_u[idx] < 50 {
                prop_assert!(cell.starts_with('[') && cell.ends_with(']'));
            } else {
                prop_assert!(cell.parse::<f64>().is_ok());
            }
        }
        let types: BTreeSet<String> = strings(raw, "Breakdown_type").into_iter().collect();
        prop_assert!(types.len() <= 2);
    }
}
