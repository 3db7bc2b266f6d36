#![allow(dead_code)]

//! Run fixtures shared by the pipeline tests.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use sdd_derive::{build_default_registry, build_flag_registry};
use sdd_model::Params;

pub const PUPILS: usize = 120;

/// A pupil file holding every raw input: -9 throughout except age, sex and
/// the design columns. The last pupil has no weight.
pub fn write_pupils(path: &Path, params: &Params) {
    let derivations = build_default_registry(params);
    let flags = build_flag_registry(params);
    let produced = derivations.output_columns();
    let mut columns: Vec<String> = vec![
        params.id_var.clone(),
        params.strata.clone(),
        params.psu.clone(),
        params.weighting_var.clone(),
        "sex".to_string(),
    ];
    for name in derivations.raw_inputs().into_iter().chain(flags.raw_inputs()) {
        if !produced.contains(&name) && !columns.iter().any(|existing| existing == name) {
            columns.push(name.to_string());
        }
    }

    let mut csv = columns.join(",");
    csv.push('\n');
    for idx in 0..PUPILS {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| match column.as_str() {
                "archsn" => (idx + 1).to_string(),
                "gor" => (idx % 3 + 1).to_string(),
                "archschn" => (idx / 6 + 1).to_string(),
                "pupilwt" if idx == PUPILS - 1 => String::new(),
                "pupilwt" => "1.5".to_string(),
                "sex" => (idx % 2 + 1).to_string(),
                "age" => (11 + idx % 5).to_string(),
                _ => "-9".to_string(),
            })
            .collect();
        writeln!(csv, "{}", cells.join(",")).unwrap();
    }
    fs::write(path, csv).unwrap();
}

const TABLES: &str = r#"
[[table]]
name = "age_by_sex"
strategy = "single_response"
breakdowns = ["sex"]
question = "age1315"

[[table]]
name = "unknown_question"
strategy = "single_response"
question = "nosuchcolumn"

[[table]]
name = "bad_filter"
strategy = "single_response"
question = "age1315"
filter = "sex = 1"

[[table]]
name = "older_pupils"
strategy = "single_response"
breakdowns = ["sex"]
question = "age1315"
filter = "age1315 >= 14"
"#;

pub fn setup(dir: &Path) -> PathBuf {
    let params = Params::default();
    write_pupils(&dir.join("pupils.csv"), &params);
    fs::write(dir.join("teachers.csv"), "tid,q1\n1,2\n2,-9\n").unwrap();
    fs::write(dir.join("params.toml"), "YEAR = \"2023\"\n").unwrap();
    fs::write(dir.join("tables.toml"), TABLES).unwrap();
    let run_file = dir.join("run.toml");
    fs::write(
        &run_file,
        r#"
pupil_data = "pupils.csv"
teacher_data = "teachers.csv"
params = "params.toml"
tables = "tables.toml"
output_dir = "out"
"#,
    )
    .unwrap();
    run_file
}
