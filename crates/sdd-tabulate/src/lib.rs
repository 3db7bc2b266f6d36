//! Tabulation of the derived record set.
//!
//! - **cube**: every marginal of a breakdown cross-tabulation
//! - **kernel**: the five tabulation strategies
//! - **variance**: design-based standard errors under stratified cluster sampling
//! - **suppress**: small-base suppression of published cells
//! - **filter**: row filter expressions of table specifications
//! - **table**: long-format row layout
//! - **interpreter**: runs a table specification end to end

pub mod cube;
pub mod filter;
pub mod interpreter;
pub mod kernel;
pub mod suppress;
pub mod table;
pub mod variance;

pub use cube::Cube;
pub use filter::{FilterExpr, apply_filter, render_filter};
pub use interpreter::{TabulatedTable, tabulate, validate_spec};
pub use suppress::suppress;
pub use table::ResultRow;
pub use variance::{Design, Estimate, weighted_mean, weighted_median};
