use super::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// One portfolio value observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    #[serde(rename = "datetime")]
    pub timestamp: Timestamp,
    pub value: f64,
}

impl EquitySample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Equality at 8-decimal precision.
    pub fn same_value(&self, other: &EquitySample) -> bool {
        match (scaled8(self.value), scaled8(other.value)) {
            (Some(a), Some(b)) => a.round() == b.round(),
            // Beyond ~1e300 an f64 has no fractional digits left to round.
            _ => self.value == other.value,
        }
    }
}

fn scaled8(v: f64) -> Option<f64> {
    Some(v * 1e8).filter(|s| s.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(v: f64) -> EquitySample {
        EquitySample::new("2024-01-02".parse().unwrap(), v)
    }

    #[test]
    fn equal_below_eighth_decimal() {
        assert!(sample(100.000000001).same_value(&sample(100.0)));
    }

    #[test]
    fn differs_at_eighth_decimal() {
        assert!(!sample(100.00000002).same_value(&sample(100.0)));
    }

    #[test]
    fn huge_values_compare_exactly() {
        assert!(!sample(2e301).same_value(&sample(1e301)));
        assert!(sample(1e301).same_value(&sample(1e301)));
        assert!(!sample(-2e301).same_value(&sample(-1e301)));
    }
}
