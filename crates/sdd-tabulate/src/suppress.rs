//! Small-base suppression of published cells.
//!
//! | Unweighted base | Published cell |
//! |-----------------|----------------|
//! | below 30 | `u` |
//! | 30 to 49, value 0 | `[-]` |
//! | 30 to 49, otherwise | `[v]`, rounded |
//! | 50 or more | the value |

use sdd_ingest::polars_utils::format_numeric;

/// Bases below this are suppressed.
pub const SUPPRESS_BELOW: usize = 30;
/// Bases below this (and not suppressed) are flagged as low.
pub const FLAG_BELOW: usize = 50;

/// Decimal places shown for percentages, means and medians.
pub const VALUE_DP: usize = 0;
/// Decimal places shown for standard errors, intervals and design effects.
pub const ERROR_DP: usize = 1;

pub const SUPPRESSED: &str = "u";
pub const FLAGGED_ZERO: &str = "[-]";

/// Formats a cell for publication given its unweighted base.
///
/// An absent value is suppressed below the cutoff and left blank otherwise.
pub fn suppress(value: Option<f64>, base: usize, dp: usize) -> String {
    if base < SUPPRESS_BELOW {
        return SUPPRESSED.to_string();
    }
    let Some(value) = value else {
        return String::new();
    };
    if base < FLAG_BELOW {
        if value == 0.0 {
            FLAGGED_ZERO.to_string()
        } else {
            format!("[{value:.dp$}]")
        }
    } else {
        format_numeric(value)
    }
}

/// True when [`suppress`] replaces the value with a marker string.
pub fn is_masked(base: usize) -> bool {
    base < FLAG_BELOW
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage(numer_w: f64, denom_w: f64) -> Option<f64> {
        Some(100.0 * numer_w / denom_w)
    }

    #[test]
    fn suppression_markers() {
        assert_eq!(suppress(percentage(15.0, 20.0), 10, VALUE_DP), "u");
        assert_eq!(suppress(percentage(30.0, 45.0), 30, VALUE_DP), "[67]");
        assert_eq!(suppress(percentage(0.0, 30.0), 40, VALUE_DP), "[-]");
        assert_eq!(suppress(Some(2.345), 45, ERROR_DP), "[2.3]");
        assert_eq!(suppress(Some(12.5), 50, VALUE_DP), "12.5");
        assert_eq!(suppress(None, 12, ERROR_DP), "u");
        assert_eq!(suppress(None, 120, ERROR_DP), "");
    }

    #[test]
    fn masked_below_flag_cutoff() {
        assert!(is_masked(49));
        assert!(!is_masked(50));
    }
}
