use num_traits::Float;
use ordered_float::{OrderedFloat, PrimitiveFloat};

use alloc::collections::VecDeque;

use crate::RbTree;

/// Sliding-window order statistics for a float time series.
///
/// Maintains the last `period` values in arrival order next to a
/// red-black tree keyed by value, so each new sample costs O(log n) and
/// `min`/`max`/`median`/`quantile`/`rank` answer in O(log n) without
/// re-sorting the window. Values are wrapped in `OrderedFloat` for a
/// total order, so NaN samples are accepted and sort after all other
/// values.
///
/// This structure manages the window itself: push values with
/// [`next`](Self::next) and the oldest sample is evicted once the window
/// is full.
#[derive(Debug)]
pub struct RollingQuantile<T> {
    /// Tree over the windowed values, weighted by multiplicity
    tree: RbTree<OrderedFloat<T>>,

    /// Windowed values in arrival order, oldest at the front
    window: VecDeque<OrderedFloat<T>>,

    /// Maximum number of values kept
    period: usize,
}

impl<T: Float + PrimitiveFloat> RollingQuantile<T> {
    /// Creates a new `RollingQuantile` with the specified window size.
    ///
    /// # Arguments
    ///
    /// * `period` - The size of the sliding window
    ///
    /// # Returns
    ///
    /// A new `RollingQuantile` instance with pre-allocated capacity
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "period can not be zero");
        Self {
            tree: RbTree::with_capacity(period),
            window: VecDeque::with_capacity(period),
            period,
        }
    }

    /// Returns the window size.
    #[inline]
    pub const fn period(&self) -> usize {
        self.period
    }

    /// Returns the number of values currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns `true` if no values have been observed yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Feeds a new value, evicting the oldest one once the window is full.
    ///
    /// # Arguments
    ///
    /// * `value` - The new value in the time series
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The tracker, for call chaining
    pub fn next(&mut self, value: T) -> &mut Self {
        if self.window.len() == self.period {
            if let Some(oldest) = self.window.pop_front() {
                self.tree.remove(&oldest);
            }
        }
        let value = OrderedFloat(value);
        self.window.push_back(value);
        self.tree.insert(value);
        self
    }

    /// Returns the smallest value in the window.
    pub fn min(&self) -> Option<T> {
        self.tree.min().map(|value| value.into_inner())
    }

    /// Returns the largest value in the window.
    pub fn max(&self) -> Option<T> {
        self.tree.max().map(|value| value.into_inner())
    }

    /// Returns the median of the window.
    ///
    /// For an even number of values this is the mean of the two middle
    /// values; for an odd number it is the middle value itself.
    pub fn median(&self) -> Option<T> {
        let total = self.tree.total_count();
        if total == 0 {
            return None;
        }

        let mid = total / 2;
        if total % 2 == 1 {
            self.tree.select(mid).map(|value| value.into_inner())
        } else {
            let lower = self.tree.select(mid - 1)?.into_inner();
            let upper = self.tree.select(mid)?.into_inner();
            T::from(2.0).map(|two| (lower + upper) / two)
        }
    }

    /// Returns the `q`-quantile of the window by nearest rank.
    ///
    /// `q` is clamped to `[0.0, 1.0]` and mapped to the element at index
    /// `floor(q * (len - 1))` of the sorted window.
    ///
    /// # Arguments
    ///
    /// * `q` - The quantile to calculate
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The quantile, or `None` if the window is empty
    pub fn quantile(&self, q: f64) -> Option<T> {
        let total = self.tree.total_count();
        if total == 0 {
            return None;
        }

        let clamped = q.clamp(0.0, 1.0);
        let target = if clamped >= 1.0 {
            total - 1
        } else if clamped <= 0.0 {
            0
        } else {
            (clamped * (total - 1) as f64).floor() as usize
        };

        self.tree.select(target).map(|value| value.into_inner())
    }

    /// Returns the `p`-th percentile of the window.
    pub fn percentile(&self, p: f64) -> Option<T> {
        self.quantile(p / 100.0)
    }

    /// Returns how many windowed values are less than or equal to `value`.
    pub fn rank(&self, value: T) -> usize {
        self.tree.rank(&OrderedFloat(value))
    }

    /// Clears the window.
    pub fn reset(&mut self) {
        self.tree.reset();
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_rolling_empty() {
        let q = RollingQuantile::<f64>::new(5);
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.period(), 5);
        assert_eq!(q.median(), None);
        assert_eq!(q.min(), None);
        assert_eq!(q.max(), None);
        assert_eq!(q.quantile(0.5), None);
    }

    #[test]
    #[should_panic(expected = "period can not be zero")]
    fn test_rolling_zero_period() {
        RollingQuantile::<f64>::new(0);
    }

    #[test]
    fn test_rolling_single_value() {
        let mut q = RollingQuantile::new(5);
        q.next(42.0);

        assert_eq!(q.len(), 1);
        assert_eq!(q.median(), Some(42.0));
        assert_eq!(q.min(), Some(42.0));
        assert_eq!(q.max(), Some(42.0));
        assert_eq!(q.quantile(0.0), Some(42.0));
        assert_eq!(q.quantile(1.0), Some(42.0));
    }

    #[test]
    fn test_rolling_median_odd_and_even() {
        let mut q = RollingQuantile::new(5);
        q.next(1.0).next(3.0).next(2.0);
        assert_eq!(q.median(), Some(2.0));

        q.next(4.0);
        assert_eq!(q.median(), Some(2.5));
    }

    #[test]
    fn test_rolling_median_interpolation() {
        let mut q = RollingQuantile::new(4);
        q.next(0.1).next(0.2);
        assert_approx_eq!(q.median().unwrap(), 0.15);
    }

    #[test]
    fn test_rolling_window_slides() {
        let mut q = RollingQuantile::new(3);
        q.next(1.0).next(2.0).next(3.0);
        assert_eq!(q.median(), Some(2.0));

        q.next(4.0); // evicts 1.0
        assert_eq!(q.median(), Some(3.0));
        assert_eq!(q.min(), Some(2.0));

        q.next(5.0); // evicts 2.0
        assert_eq!(q.median(), Some(4.0));
        assert_eq!(q.max(), Some(5.0));
    }

    #[test]
    fn test_rolling_duplicates() {
        let mut q = RollingQuantile::new(5);
        q.next(1.0).next(2.0).next(2.0).next(2.0).next(5.0);
        assert_eq!(q.median(), Some(2.0));
        assert_eq!(q.rank(2.0), 4);

        q.next(6.0); // evicts 1.0, the window keeps all three 2.0s
        assert_eq!(q.len(), 5);
        assert_eq!(q.min(), Some(2.0));
        assert_eq!(q.rank(2.0), 3);
    }

    #[test]
    fn test_rolling_quantiles() {
        let mut q = RollingQuantile::new(10);
        for i in 1..=5 {
            q.next(i as f64);
        }

        assert_eq!(q.quantile(0.0), Some(1.0));
        assert_eq!(q.quantile(0.25), Some(2.0));
        assert_eq!(q.quantile(0.5), Some(3.0));
        assert_eq!(q.quantile(0.75), Some(4.0));
        assert_eq!(q.quantile(1.0), Some(5.0));
        assert_eq!(q.percentile(50.0), Some(3.0));
    }

    #[test]
    fn test_rolling_quantile_clamps_inputs() {
        let mut q = RollingQuantile::new(5);
        q.next(1.0).next(2.0).next(3.0);

        assert_eq!(q.quantile(-0.5), Some(1.0));
        assert_eq!(q.quantile(1.5), Some(3.0));
        assert!(q.quantile(f64::NAN).is_some());
        assert!(q.percentile(150.0).is_some());
    }

    #[test]
    fn test_rolling_period_one() {
        let mut q = RollingQuantile::new(1);
        q.next(5.0);
        assert_eq!(q.median(), Some(5.0));

        q.next(10.0);
        assert_eq!(q.median(), Some(10.0));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_rolling_rank() {
        let mut q = RollingQuantile::new(5);
        q.next(10.0).next(20.0).next(30.0).next(40.0);

        assert_eq!(q.rank(5.0), 0);
        assert_eq!(q.rank(20.0), 2);
        assert_eq!(q.rank(25.0), 2);
        assert_eq!(q.rank(100.0), 4);
    }

    #[test]
    fn test_rolling_reset() {
        let mut q = RollingQuantile::new(3);
        q.next(1.0).next(2.0).next(3.0);
        assert_eq!(q.median(), Some(2.0));

        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.median(), None);

        q.next(10.0).next(20.0);
        assert_eq!(q.median(), Some(15.0));
    }

    #[test]
    fn test_rolling_extreme_values() {
        let mut q = RollingQuantile::new(5);
        q.next(1.0).next(f64::INFINITY).next(f64::NEG_INFINITY).next(2.0);

        assert_eq!(q.min(), Some(f64::NEG_INFINITY));
        assert_eq!(q.max(), Some(f64::INFINITY));
    }

    #[test]
    fn test_rolling_nan_samples_are_kept() {
        let mut q = RollingQuantile::new(5);
        q.next(1.0).next(f64::NAN).next(2.0);

        assert_eq!(q.len(), 3);
        assert_eq!(q.min(), Some(1.0));
        assert!(q.max().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_rolling_stress_against_sorted_window() {
        let inputs = [10.0, 10.5, 11.2, 10.9, 11.5, 11.9, 12.3, 12.1, 11.8, 12.5];
        let mut q = RollingQuantile::new(5);

        for (i, &value) in inputs.iter().enumerate() {
            q.next(value);

            let start = i.saturating_sub(4);
            let mut window: std::vec::Vec<f64> = inputs[start..=i].to_vec();
            window.sort_by(|a, b| a.partial_cmp(b).unwrap());

            assert_eq!(q.min(), Some(window[0]));
            assert_eq!(q.max(), Some(window[window.len() - 1]));
            assert_eq!(q.quantile(0.0), Some(window[0]));
            assert_eq!(q.quantile(1.0), Some(window[window.len() - 1]));
        }
    }
}
