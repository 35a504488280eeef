use std::ops::Range;

use crate::value::{FlameChartValue, TraceValue, XYValue};

/// Anything that sorts by an x key.
pub trait Keyed {
    fn key(&self) -> f64;
}

impl Keyed for XYValue {
    fn key(&self) -> f64 {
        self.x
    }
}

impl Keyed for TraceValue {
    fn key(&self) -> f64 {
        self.x
    }
}

impl Keyed for FlameChartValue {
    fn key(&self) -> f64 {
        self.trace_value.x
    }
}

impl Keyed for (f64, f64) {
    fn key(&self) -> f64 {
        self.0
    }
}

/// A read-only, randomly indexable sequence sorted ascending by key.
///
/// Implementations must guarantee `get(i).key() <= get(i + 1).key()`. The
/// engine never mutates a buffer, so any owned or borrowed storage works.
pub trait OrderedBuffer<T>: Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> &T;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Sync> OrderedBuffer<T> for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> &T {
        &self[index]
    }
}

impl<T: Sync> OrderedBuffer<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> &T {
        &self[index]
    }
}

/// First index whose key is `>= key`, or `len` if there is none.
pub fn bisect_left<T: Keyed>(buffer: &(impl OrderedBuffer<T> + ?Sized), key: f64) -> usize {
    let (mut lo, mut hi) = (0, buffer.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if buffer.get(mid).key() < key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// First index whose key is `> key`, or `len` if there is none.
pub fn bisect_right<T: Keyed>(buffer: &(impl OrderedBuffer<T> + ?Sized), key: f64) -> usize {
    let (mut lo, mut hi) = (0, buffer.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if key < buffer.get(mid).key() {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Index range covering `[x_start, x_end]` plus one element of context on
/// each side, so that a renderer can draw into the window edges.
pub fn visible_range<T: Keyed>(
    buffer: &(impl OrderedBuffer<T> + ?Sized),
    x_start: f64,
    x_end: f64,
) -> Range<usize> {
    let mut left = bisect_left(buffer, x_start);
    let mut right = bisect_right(buffer, x_end);
    if left > 0 {
        left -= 1;
    }
    if right < buffer.len() {
        right += 1;
    }
    left..right.max(left)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn xs(keys: &[f64]) -> Vec<(f64, f64)> {
        keys.iter().map(|&k| (k, 0.0)).collect()
    }

    #[test]
    fn bisect_on_duplicates() {
        let buf = xs(&[0.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(bisect_left(&buf, 1.0), 1);
        assert_eq!(bisect_right(&buf, 1.0), 4);
        assert_eq!(bisect_left(&buf, -1.0), 0);
        assert_eq!(bisect_right(&buf, 5.0), 5);
        assert_eq!(bisect_left(&buf, 1.5), 4);
    }

    #[test]
    fn bisect_empty() {
        let buf: Vec<(f64, f64)> = Vec::new();
        assert_eq!(bisect_left(&buf, 0.0), 0);
        assert_eq!(bisect_right(&buf, 0.0), 0);
        assert_eq!(visible_range(&buf, 0.0, 1.0), 0..0);
    }

    #[test]
    fn visible_range_adds_one_point_of_context() {
        let buf = xs(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(visible_range(&buf, 2.0, 3.0), 1..5);
        assert_eq!(visible_range(&buf, 0.0, 5.0), 0..6);
        assert_eq!(visible_range(&buf, 2.5, 2.7), 2..4);
    }

    #[test]
    fn visible_range_outside_data() {
        let buf = xs(&[0.0, 1.0, 2.0]);
        assert_eq!(visible_range(&buf, 10.0, 20.0), 2..3);
        assert_eq!(visible_range(&buf, -20.0, -10.0), 0..1);
    }

    #[test]
    fn works_on_slices() {
        let buf = xs(&[0.0, 1.0, 2.0]);
        let slice: &[(f64, f64)] = &buf[1..];
        assert_eq!(bisect_left(slice, 2.0), 1);
    }

    proptest! {
        #[test]
        fn prop_bisect_matches_linear_scan(
            mut keys in prop::collection::vec(-50i32..50, 0..200),
            probe in -60i32..60,
        ) {
            keys.sort_unstable();
            let buf: Vec<(f64, f64)> = keys.iter().map(|&k| (k as f64, 0.0)).collect();
            let k = probe as f64;

            let left = buf.iter().position(|p| p.0 >= k).unwrap_or(buf.len());
            let right = buf.iter().position(|p| p.0 > k).unwrap_or(buf.len());
            prop_assert_eq!(bisect_left(&buf, k), left);
            prop_assert_eq!(bisect_right(&buf, k), right);
        }
    }
}
