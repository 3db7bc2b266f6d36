//! Record-level derivations and exclusion flags for the pupil survey.
//!
//! - **registry**: the ordered derivation catalogue and its dependency check
//! - **general**, **alcohol**, **smoking**, **ecig**, **drugs**,
//!   **wellbeing**, **lessons**, **multi**: derivations by theme
//! - **flags**: exclusion flags
//! - **exclusion**: the publication filter and modelling preparation

pub mod alcohol;
pub mod drugs;
pub mod ecig;
pub mod exclusion;
pub mod flags;
pub mod general;
pub mod lessons;
pub mod multi;
pub mod recode;
pub mod registry;
pub mod smoking;
pub mod wellbeing;

pub use exclusion::{ExclusionSummary, collapse_for_modelling, publication_filter};
pub use flags::build_flag_registry;
pub use registry::{
    Derivation, DerivationRegistry, Inputs, OutputColumn, Theme, build_default_registry,
};
