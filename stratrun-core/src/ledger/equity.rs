//! Equity curve: arrival-ordered samples with adjacent-duplicate suppression.
//!
//! Simulators emit equity on every bar even when nothing changed. Repeated
//! values would add zero-return periods to every return-based statistic, so a
//! sample equal (at 8 decimals) to the one before it is skipped. Only the
//! immediately preceding sample is compared: A, B, A keeps all three.

use crate::domain::EquitySample;

#[derive(Debug, Clone, Default)]
pub struct EquityCurve {
    samples: Vec<EquitySample>,
    duplicates_skipped: u64,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample unless it repeats the last value. Returns whether it was kept.
    pub fn push(&mut self, sample: EquitySample) -> bool {
        if self.samples.last().is_some_and(|last| last.same_value(&sample)) {
            self.duplicates_skipped += 1;
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn samples(&self) -> &[EquitySample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped
    }

    pub fn into_samples(self) -> Vec<EquitySample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(day: u32, v: f64) -> EquitySample {
        EquitySample::new(format!("2024-01-{day:02}").parse().unwrap(), v)
    }

    #[test]
    fn adjacent_duplicates_collapse() {
        let mut curve = EquityCurve::new();
        assert!(curve.push(sample(1, 100.0)));
        assert!(!curve.push(sample(2, 100.0)));
        assert!(!curve.push(sample(3, 100.000000001)));
        assert!(curve.push(sample(4, 90.0)));
        assert_eq!(curve.values(), vec![100.0, 90.0]);
        assert_eq!(curve.duplicates_skipped(), 2);
    }

    #[test]
    fn distinct_huge_values_are_both_kept() {
        let mut curve = EquityCurve::new();
        assert!(curve.push(sample(1, 1e301)));
        assert!(curve.push(sample(2, 2e301)));
        assert!(!curve.push(sample(3, 2e301)));
        assert_eq!(curve.values(), vec![1e301, 2e301]);
    }

    #[test]
    fn first_sample_of_a_run_is_kept() {
        let mut curve = EquityCurve::new();
        curve.push(sample(1, 100.0));
        curve.push(sample(2, 100.0));
        assert_eq!(curve.samples()[0].timestamp.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn non_adjacent_duplicates_retained() {
        let mut curve = EquityCurve::new();
        for (d, v) in [(1, 100.0), (2, 105.0), (3, 100.0)] {
            assert!(curve.push(sample(d, v)));
        }
        assert_eq!(curve.len(), 3);
    }
}
