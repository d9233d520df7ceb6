//! Rounding helpers shared by the ledger and the simulator.

/// Tolerance below which a share count or balance is treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Round to a fixed number of decimal places.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}

/// Round a monetary amount or price to pennies.
pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}

/// Whether a value is zero within [`EPSILON`].
pub fn is_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(123.456), 123.46);
        assert_eq!(round2(123.454), 123.45);
        assert_eq!(round2(-1.005_1), -1.01);
    }

    #[test]
    fn test_round_dp_yield_precision() {
        assert_eq!(round_dp(0.000_123_456_7, 6), 0.000_123);
        assert_eq!(round_dp(0.012_345_67, 4), 0.0123);
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(0.0));
        assert!(is_zero(1e-12));
        assert!(!is_zero(0.001));
    }
}
