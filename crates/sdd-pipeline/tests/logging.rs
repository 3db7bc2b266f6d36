//! Installs the global subscriber, so this binary holds a single test.

mod common;

use std::fs;

use serde_json::Value;
use tracing::Level;

use sdd_pipeline::logging::{LogConfig, LogFormat, REDACTED_VALUE, init_logging, log_data_enabled};
use sdd_pipeline::run_survey_file;

use common::setup;

fn field<'a>(event: &'a Value, name: &str) -> Option<&'a str> {
    event.get("fields")?.get(name)?.as_str()
}

#[test]
fn json_log_file_redacts_excluded_pupils() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("run.log");
    let config = LogConfig::from_verbosity(2)
        .with_format(LogFormat::Json)
        .with_timestamps(false)
        .with_log_file(&log_path)
        .with_log_data(false);
    assert_eq!(config.level, Level::TRACE);
    init_logging(&config).unwrap();
    assert!(!log_data_enabled());
    assert!(init_logging(&config).is_err());

    run_survey_file(&setup(dir.path())).unwrap();

    let log = fs::read_to_string(&log_path).unwrap();
    let events: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(events.iter().all(|event| event.get("timestamp").is_none()));
    assert!(
        events
            .iter()
            .any(|event| field(event, "message") == Some("ingest complete"))
    );

    let excluded: Vec<&Value> = events
        .iter()
        .filter(|event| field(event, "message") == Some("excluded by publication filter"))
        .collect();
    // Only the pupil without a weight is dropped.
    assert_eq!(excluded.len(), 1, "{log}");
    assert_eq!(excluded[0]["level"], "TRACE");
    assert_eq!(field(excluded[0], "pupil"), Some(REDACTED_VALUE));
    assert!(!log.contains("\"pupil\":\"120\""));
}
