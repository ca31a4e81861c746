//! Numeric helpers shared by the scoring stages.

/// Round to two decimal places for presentation.
///
/// Non-finite input rounds to `0.0` so serialized reports never carry NaN.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Clamp a score into `[0, 100]`. NaN maps to `0.0`.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Clamp a ratio into `[0, 1]`. NaN maps to `0.0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(89.104), 89.1);
        assert_eq!(round2(12.345_6), 12.35);
        assert_eq!(round2(f64::NAN), 0.0);
        assert_eq!(round2(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(100.000_001), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(0.25), 0.25);
    }
}
