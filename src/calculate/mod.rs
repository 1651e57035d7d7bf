//! Statistics calculation engine.
//!
//! Computes derived metrics from the canonical relations:
//! - Grouped reductions (sums, distinct counts, ratios)
//! - Per-partition ranking with deterministic tie-breaks
//! - Top-K truncation and minimum-sample filtering

mod aggregate;
mod rank;

pub use aggregate::*;
pub use rank::*;

use thiserror::Error;

use crate::models::TableError;

/// Decimal places kept on every ratio.
pub const RATIO_DECIMALS: i32 = 3;

/// Errors raised while aggregating or ranking.
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Metric '{metric}' references unknown metric '{operand}'")]
    UnknownMetric { metric: String, operand: String },

    #[error("Column '{column}' holds non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    #[error("Sum of column '{0}' overflowed")]
    Overflow(String),
}

/// Round half away from zero to `decimals` places.
pub fn round_half_away(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Largest magnitude an f64 holds as an exact integer (2^53).
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

fn as_exact_int(value: f64) -> Option<i128> {
    (value.fract() == 0.0 && value.abs() <= EXACT_INT_LIMIT).then_some(value as i128)
}

/// `numerator / denominator` rounded half away from zero, in integer arithmetic.
fn round_int_ratio(numerator: i128, denominator: i128, decimals: i32) -> f64 {
    let factor = 10i128.pow(decimals.unsigned_abs());
    let (a, b) = (numerator.abs(), denominator.abs());
    let scaled = (2 * factor * a + b) / (2 * b);
    let signed = if (numerator < 0) != (denominator < 0) {
        -scaled
    } else {
        scaled
    };
    signed as f64 / factor as f64
}

/// Ratio of two reduced totals, or `None` when the denominator is zero.
///
/// Integral totals (every SUM over count columns) are divided exactly, so a
/// quotient such as 323 / 80 = 4.0375 rounds to 4.038. Fractional totals
/// fall back to rounding the binary quotient.
pub fn calculate_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    match (as_exact_int(numerator), as_exact_int(denominator)) {
        (Some(n), Some(d)) => Some(round_int_ratio(n, d, RATIO_DECIMALS)),
        _ => Some(round_half_away(numerator / denominator, RATIO_DECIMALS)),
    }
}
