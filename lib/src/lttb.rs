use crate::buffer::{visible_range, OrderedBuffer};
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::Result;
use crate::point::scalar;

/// Largest Triangle Three Buckets (LTTB) selection.
///
/// Picks at most `threshold` of the x-sorted points, always keeping the first
/// and the last, so that the visual shape of the series survives. Returns the
/// indices of the kept points in order; every index when `threshold >= len`
/// or `threshold < 3`.
pub fn downsample(data: &[(f64, f64)], threshold: usize) -> Vec<usize> {
    let n = data.len();
    if threshold >= n || threshold < 3 {
        return (0..n).collect();
    }

    let mut sampled = Vec::with_capacity(threshold);
    sampled.push(0);

    let bucket_size = (n - 2) as f64 / (threshold - 2) as f64;

    let mut a_idx = 0usize;

    for i in 0..(threshold - 2) {
        let bucket_start = (i as f64 * bucket_size) as usize + 1;
        let bucket_end = (((i as f64 + 1.0) * bucket_size) as usize + 1).min(n - 1);

        // Average of next bucket for the triangle area calculation.
        let next_start = bucket_end;
        let next_end = (((i as f64 + 2.0) * bucket_size) as usize + 1).min(n);
        let mut avg_x = 0.0f64;
        let mut avg_y = 0.0f64;
        let next_len = next_end - next_start;
        if next_len > 0 {
            for item in data.iter().take(next_end).skip(next_start) {
                avg_x += item.0;
                avg_y += item.1;
            }
            avg_x /= next_len as f64;
            avg_y /= next_len as f64;
        }

        let (ax, ay) = data[a_idx];
        let mut max_area = -1.0f64;
        let mut max_idx = bucket_start;

        for (j, item) in data.iter().enumerate().take(bucket_end).skip(bucket_start) {
            let area = ((item.0 - ax) * (avg_y - ay) - (avg_x - ax) * (item.1 - ay)).abs();
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        sampled.push(max_idx);
        a_idx = max_idx;
    }

    sampled.push(n - 1);
    sampled
}

/// Shape-preserving point selection, one point per bucket of the window on
/// average.
#[derive(Debug, Default)]
pub struct LttbDecimator;

impl Decimator for LttbDecimator {
    fn key(&self) -> &'static str {
        "lttb"
    }

    fn name(&self) -> &'static str {
        "Largest Triangle Three Buckets"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Xy
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let buffer = *expect_input!(self, input, Xy);
        let range = visible_range(buffer, x_start, x_end);
        let offset = range.start;

        let points = range
            .map(|i| {
                let value = buffer.get(i);
                scalar(i, value).map(|y| (value.x, y))
            })
            .collect::<Result<Vec<_>>>()?;

        let span = ctx.buckets().span(x_start, x_end);
        let threshold = (span.end() - span.start() + 1).max(0) as usize;

        let out = downsample(&points, threshold)
            .into_iter()
            .map(|i| buffer.get(offset + i).clone())
            .collect();
        Ok(DecimationOutput::Xy(out))
    }
}
