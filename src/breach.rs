// ===============================
// src/breach.rs
// ===============================
use serde::{Deserialize, Serialize};

/// Band pnl yang diperbolehkan. Di luar band -> breach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreachBand {
    pub low: f64,
    pub high: f64,
}

impl Default for BreachBand {
    fn default() -> Self {
        Self { low: -300.0, high: 300.0 }
    }
}

impl BreachBand {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Strict comparison on both sides; NaN (no price yet) never breaches.
    pub fn is_breach(&self, pnl: f64) -> bool {
        pnl < self.low || pnl > self.high
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(-800.0, true)]
    #[case(-350.0, true)]
    #[case(-300.0, false)]
    #[case(-50.0, false)]
    #[case(300.0, false)]
    #[case(300.5, true)]
    #[case(f64::NAN, false)]
    #[case(f64::NEG_INFINITY, true)]
    fn test_default_band(#[case] pnl: f64, #[case] expected: bool) {
        assert_eq!(BreachBand::default().is_breach(pnl), expected);
    }

    #[rstest]
    fn test_custom_band() {
        let band = BreachBand::new(-400.0, 100.0);
        assert!(!band.is_breach(-350.0));
        assert!(band.is_breach(150.0));
    }
}
