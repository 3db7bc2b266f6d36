//! Batch run of the pupil survey.
//!
//! - **config**: run files, parameters and table specifications
//! - **logging**: `tracing` subscriber setup
//! - **pipeline**: the staged run (ingest, derive, flag, filter, tabulate, write)
//! - **output**: CSV assets and the SHA-256 manifest
//! - **summary**: terminal overview of a run

pub mod config;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod summary;

pub use config::{RunConfig, load_params, load_table_specs};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use output::{Manifest, ManifestEntry, compute_file_sha256, write_csv};
pub use pipeline::{RunResult, TableOutcome, TableStatus, run_survey, run_survey_file};
pub use summary::{RunSummary, print_summary};
