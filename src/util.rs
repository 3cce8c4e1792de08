//! Small numeric helpers shared by the solver.
//!
//! Reduction ratios are multiplicative and accumulate floating-point
//! error across iterations, so values are snapped to six decimal places
//! before being stored or compared, and flow equality uses an epsilon
//! of 1e-9.

pub const FLOW_EPSILON: f64 = 1e-9;

pub fn flows_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < FLOW_EPSILON
}

/// Snap a ratio to six decimal places to keep accumulated reductions
/// deterministic across runs.
pub fn snap_ratio(r: f64) -> f64 {
    (r * 1_000_000.0).round() / 1_000_000.0
}

/// Round a reported flow/capacity value to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_ratio_rounds_to_six_places() {
        assert_eq!(snap_ratio(0.123_456_789), 0.123_457);
    }

    #[test]
    fn flows_equal_within_epsilon() {
        assert!(flows_equal(1.0, 1.0 + 1e-10));
        assert!(!flows_equal(1.0, 1.0 + 1e-6));
    }
}
