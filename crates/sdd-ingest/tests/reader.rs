use std::fs;
use std::path::PathBuf;

use sdd_ingest::{ReadOptions, read_record_set};
use sdd_model::{ColumnKind, Params, SddError};
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write file");
    path
}

#[test]
fn reads_pupil_file_with_kinds_and_missing_cells() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(
        &dir,
        "pupils.csv",
        "ArchSN,PupilWt,GOR,ArchSchN,Age,AL7BRLRPT,DCGSTG3\n\
         1,1.2,1,10,13,2,1\n\
         2,,1,10,,1.5,2\n\
         3,0.8,2,11,-8,0,3\n",
    );
    let params = Params::default();
    let set = read_record_set(&path, &ReadOptions::pupil(&params)).expect("read");

    assert_eq!(set.height(), 3);
    // Legacy derived column is dropped on read.
    assert!(!set.has_column("dcgstg3"));
    assert_eq!(set.kind("pupilwt"), ColumnKind::NonMeasure);
    assert_eq!(set.kind("age"), ColumnKind::Discrete);
    assert_eq!(set.kind("al7brlrpt"), ColumnKind::Continuous);

    assert_eq!(
        set.values("pupilwt").expect("weights"),
        vec![Some(1.2), None, Some(0.8)]
    );
    assert_eq!(
        set.values("age").expect("age"),
        vec![Some(13.0), Some(-9.0), Some(-8.0)]
    );
}

#[test]
fn text_columns_are_kept() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(&dir, "teachers.csv", "id,school,role\n1,North,2\n2,South,1\n");
    let set = read_record_set(&path, &ReadOptions::teacher()).expect("read");
    assert_eq!(set.kind("school"), ColumnKind::NonMeasure);
    assert!(set.has_column("school"));
    assert_eq!(set.values("role").expect("role"), vec![Some(2.0), Some(1.0)]);
}

#[test]
fn empty_pupil_file_is_structural() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(&dir, "empty.csv", "archsn,pupilwt\n");
    let error = read_record_set(&path, &ReadOptions::pupil(&Params::default())).unwrap_err();
    let typed = error.downcast_ref::<SddError>().expect("typed error");
    assert!(matches!(typed, SddError::EmptyRecordSet { .. }));
    assert!(typed.is_structural());
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().expect("temp dir");
    let error = read_record_set(&dir.path().join("absent.csv"), &ReadOptions::teacher())
        .unwrap_err();
    let typed = error.downcast_ref::<SddError>().expect("typed error");
    assert!(matches!(typed, SddError::Io { .. }));
}
