use std::ops::RangeInclusive;

use crate::scale::ScaleMapping;

/// Bucket arithmetic over a scale mapping. A bucket is one unit of output
/// coordinate: bucket `b` covers coordinates `[b, b + 1)`.
#[derive(Clone, Copy)]
pub struct Buckets<'a> {
    scales: &'a dyn ScaleMapping,
}

impl<'a> Buckets<'a> {
    pub fn new(scales: &'a dyn ScaleMapping) -> Self {
        Buckets { scales }
    }

    pub fn index(&self, x: f64) -> i64 {
        self.scales.x_value_to_coord(x).floor() as i64
    }

    /// Value-space start of bucket `b`.
    pub fn start(&self, b: i64) -> f64 {
        self.scales.x_coord_to_value(b as f64)
    }

    pub fn end(&self, b: i64) -> f64 {
        self.scales.x_coord_to_value((b + 1) as f64)
    }

    pub fn width(&self, b: i64) -> f64 {
        self.end(b) - self.start(b)
    }

    /// Buckets touched by the value window `[x_start, x_end]`. A window that
    /// ends exactly on a bucket boundary does not include the next bucket.
    ///
    /// The span never leaves the pixel extent of the x axis, so an unclamped
    /// scale with a far-off window still yields at most one bucket per pixel.
    pub fn span(&self, x_start: f64, x_end: f64) -> RangeInclusive<i64> {
        let [a, b] = self.scales.x_coord_extent();
        let lo = a.min(b).floor() as i64;
        let hi = (b.max(a).ceil() as i64).saturating_sub(1).max(lo);

        let first = self.index(x_start).clamp(lo, hi);
        let last = self.index_exclusive(x_end).clamp(first, hi);
        first..=last
    }

    /// Last bucket overlapped by the half-open interval ending at `end`.
    pub fn index_exclusive(&self, end: f64) -> i64 {
        (self.scales.x_value_to_coord(end).ceil() as i64).saturating_sub(1)
    }

    pub fn x_value_to_coord(&self, x: f64) -> f64 {
        self.scales.x_value_to_coord(x)
    }

    pub fn y_value_to_coord(&self, y: f64) -> f64 {
        self.scales.y_value_to_coord(y)
    }
}

/// Length of the intersection of `[a0, a1)` and `[b0, b1)`.
pub fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    (a1.min(b1) - a0.max(b0)).max(0.0)
}
