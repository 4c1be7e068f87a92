/// Divides `numerator` by `denominator`, returning 0.0 when the divisor is
/// zero or the quotient is not finite.
pub fn guarded_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() { q } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_div_zero_divisor() {
        assert_eq!(guarded_div(10.0, 0.0), 0.0);
        assert_eq!(guarded_div(0.0, 0.0), 0.0);
        assert_eq!(guarded_div(-3.0, -0.0), 0.0);
    }

    #[test]
    fn test_guarded_div_normal_values() {
        assert_eq!(guarded_div(10.0, 4.0), 2.5);
        assert_eq!(guarded_div(-9.0, 3.0), -3.0);
    }

    #[test]
    fn test_guarded_div_non_finite() {
        assert_eq!(guarded_div(f64::MAX, f64::MIN_POSITIVE), 0.0);
        assert_eq!(guarded_div(f64::NAN, 2.0), 0.0);
    }
}
