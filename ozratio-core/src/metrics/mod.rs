//! Derived ratios and rolling statistics.

pub mod ratio;
pub mod rolling;

pub use ratio::{per_unit, ratio_column};
pub use rolling::{compute_rolling_metrics, rolling_mean, rolling_std, RollingConfig, RollingWindow};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
