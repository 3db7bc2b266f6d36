use std::path::PathBuf;

use thiserror::Error;

/// How an error affects a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Halts the pipeline before any output is produced.
    Structural,
    /// Halts only the affected table specification.
    Configuration,
}

#[derive(Debug, Error)]
pub enum SddError {
    #[error("missing required column `{column}` (needed by {needed_by})")]
    MissingColumn { column: String, needed_by: String },

    #[error("{count} row(s) included in tabulation have no usable weight in `{column}`")]
    MissingWeight { column: String, count: usize },

    #[error("record set is empty: {context}")]
    EmptyRecordSet { context: String },

    #[error("table `{table}` references unknown column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("table `{table}`: cannot parse filter `{filter}`: {message}")]
    FilterParse {
        table: String,
        filter: String,
        message: String,
    },

    #[error("table `{table}`: subgroup code {code} collides with an existing code of `{column}`")]
    SubgroupCollision {
        table: String,
        column: String,
        code: i64,
    },

    #[error("table `{table}`: {message}")]
    InvalidSpec { table: String, message: String },

    #[error("invalid parameters: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SddError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingColumn { .. }
            | Self::MissingWeight { .. }
            | Self::EmptyRecordSet { .. }
            | Self::Config(_)
            | Self::Io { .. } => ErrorClass::Structural,
            Self::UnknownColumn { .. }
            | Self::FilterParse { .. }
            | Self::SubgroupCollision { .. }
            | Self::InvalidSpec { .. } => ErrorClass::Configuration,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.class() == ErrorClass::Structural
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SddError>;
