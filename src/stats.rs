//! Simulation metrics.

use order_stat::kth_by;

/// An append-only statistical sample.
#[derive(Clone, Default)]
pub struct SampleMetric {
    data: Vec<f64>,
}

impl SampleMetric {
    pub fn add(&mut self, x: f64) {
        self.data.push(x);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().copied().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / (self.data.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::max)
    }

    /// Returns the k-th order statistic of the sample (`1 <= idx <= len`).
    pub fn ordered_statistic(&self, idx: usize) -> f64 {
        debug_assert!((1..=self.data.len()).contains(&idx));
        let mut tmp = self.data.clone();
        *kth_by(&mut tmp, idx - 1, |x, y| x.total_cmp(y))
    }

    /// Returns the q-th sample quantile, `0 <= q <= 1`, using the R-7 estimator (the default
    /// method in R's `stats` package).
    pub fn quantile(&self, q: f64) -> f64 {
        debug_assert!((0. ..=1.).contains(&q));
        debug_assert!(!self.data.is_empty());
        let h = ((self.data.len() - 1) as f64) * q + 1.;
        let fl = h.floor();
        let k1 = (fl + 1e-9) as usize;
        let k2 = (h.ceil() + 1e-9) as usize;
        let s1 = self.ordered_statistic(k1);
        s1 + (h - fl) * (self.ordered_statistic(k2) - s1)
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Folds every value from `other` into this sample.
    pub fn merge(&mut self, other: &SampleMetric) {
        self.data.extend_from_slice(&other.data);
    }
}
