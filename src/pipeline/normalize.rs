use crate::common::constants::GRAMS_PER_OUNCE;
use crate::domain::Unit;

/// Converts weight mentions to grams with a fixed ounce factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitNormalizer {
    grams_per_ounce: f64,
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::new(GRAMS_PER_OUNCE)
    }
}

impl UnitNormalizer {
    pub fn new(grams_per_ounce: f64) -> Self {
        Self { grams_per_ounce }
    }

    pub fn grams_per_ounce(&self) -> f64 {
        self.grams_per_ounce
    }

    /// Convert `value` written in `unit` to grams. Unrecognised units yield `None`.
    pub fn normalize(&self, value: f64, unit: &str) -> Option<f64> {
        Unit::from_token(unit).map(|unit| self.to_grams(value, unit))
    }

    pub fn to_grams(&self, value: f64, unit: Unit) -> f64 {
        match unit {
            Unit::Grams => value,
            Unit::Ounces => value * self.grams_per_ounce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::FLOAT_TOLERANCE;

    #[test]
    fn test_ounces_use_literal_factor() {
        let n = UnitNormalizer::default();
        assert_eq!(n.grams_per_ounce(), 28.3495);
        assert_eq!(n.normalize(1.0, "oz"), Some(28.3495));
        assert_eq!(n.normalize(2.0, "Ounces"), Some(56.699));
    }

    #[test]
    fn test_grams_pass_through() {
        let n = UnitNormalizer::default();
        assert_eq!(n.normalize(125.0, "g"), Some(125.0));
        assert_eq!(n.normalize(30.0, "grams"), Some(30.0));
    }

    #[test]
    fn test_unrecognized_unit() {
        let n = UnitNormalizer::default();
        assert_eq!(n.normalize(1.0, "lb"), None);
        assert_eq!(n.normalize(1.0, "kg"), None);
        assert_eq!(n.normalize(1.0, ""), None);
    }

    #[test]
    fn test_ounce_round_trip() {
        let n = UnitNormalizer::default();
        for ounces in [0.5, 1.0, 1.76, 8.8, 17.6, 35.27] {
            let grams = n.normalize(ounces, "oz").unwrap();
            let back = grams / n.grams_per_ounce();
            assert!((back - ounces).abs() < FLOAT_TOLERANCE, "{ounces} -> {grams} -> {back}");
        }
    }
}
