//! Data model for the pupil survey derivation and tabulation engine.
//!
//! - **missing**: reserved negative response codes and their precedence
//! - **kind**: out-of-band column kinds (discrete, continuous, non-measure)
//! - **params**: the run-level parameters object
//! - **spec**: declarative table specifications
//! - **error**: the error taxonomy shared by every engine crate

pub mod error;
pub mod kind;
pub mod missing;
pub mod params;
pub mod spec;

pub use error::{ErrorClass, Result, SddError};
pub use kind::{BinaryConvention, ColumnKind};
pub use missing::{
    MissingCode, Response, collapse_for_modelling, is_sentinel, is_valid, is_valid_code, merge,
};
pub use params::{Params, UnitsTable};
pub use spec::{Strategy, Subgroup, TableQuery, TableSpec, TableSpecList};
