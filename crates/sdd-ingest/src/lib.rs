//! Survey record-set ingestion.
//!
//! Reads raw survey files into [`RecordSet`]s: lower-cased headers, numeric
//! measure columns with blanks read as item missing, inferred column kinds,
//! and removal of the legacy derived columns named by `DROP_COLUMNS`.

pub mod polars_utils;
pub mod reader;
pub mod record_set;

pub use reader::{ReadOptions, read_record_set};
pub use record_set::RecordSet;
