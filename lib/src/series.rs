//! Step-series bucket distribution.
//!
//! A series is read as consecutive intervals: the pair `(value, next)` says
//! that `next.y` accrued over `[value.x, next.x)`, i.e. at a rate of
//! `next.y / (next.x - value.x)` per unit of x. Each bucket receives that rate
//! weighted by the share of the bucket the interval covers, so a bucket fully
//! covered by a constant-rate series reports exactly the rate.

use std::ops::RangeInclusive;

use crate::bucket::{overlap, Buckets};
use crate::buffer::{visible_range, OrderedBuffer};
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::Result;
use crate::point::scalar;
use crate::value::XYValue;

/// Weighted per-bucket sums for every series over the window.
///
/// Returns the bucket span and, per series, one sum per bucket in that span.
/// An empty span is returned when every series is empty.
pub fn sum_multi_xy_series_values(
    buckets: &Buckets<'_>,
    x_start: f64,
    x_end: f64,
    series: &[&dyn OrderedBuffer<XYValue>],
) -> Result<(RangeInclusive<i64>, Vec<Vec<f64>>)> {
    if series.iter().all(|s| s.is_empty()) {
        return Ok((1..=0, vec![Vec::new(); series.len()]));
    }

    let span = buckets.span(x_start, x_end);
    let (first, last) = (*span.start(), *span.end());
    let len = (last - first + 1) as usize;
    let mut sums = Vec::with_capacity(series.len());

    for buffer in series {
        let mut acc = vec![0.0; len];
        let range = visible_range(*buffer, x_start, x_end);
        for i in range.start..range.end.saturating_sub(1) {
            let (value, next) = (buffer.get(i), buffer.get(i + 1));
            let width = next.x - value.x;
            let value_per_x = if width > 0.0 {
                scalar(i + 1, next)? / width
            } else {
                0.0
            };
            if value_per_x == 0.0 {
                continue;
            }

            // Clip the interval to the window.
            let a = value.x.max(x_start);
            let b = next.x.min(x_end);
            if b <= a {
                continue;
            }

            let start_bucket = buckets.index(a).max(first);
            if start_bucket > last {
                continue;
            }
            let end_bucket = buckets.index_exclusive(b).max(start_bucket).min(last);

            let fraction = |k: i64| {
                let (lo, hi) = (buckets.start(k), buckets.end(k));
                let w = hi - lo;
                if w > 0.0 {
                    value_per_x * overlap(a, b, lo, hi) / w
                } else {
                    0.0
                }
            };

            acc[(start_bucket - first) as usize] += fraction(start_bucket);
            if end_bucket > start_bucket {
                for k in start_bucket + 1..end_bucket {
                    acc[(k - first) as usize] += value_per_x;
                }
                acc[(end_bucket - first) as usize] += fraction(end_bucket);
            }
        }
        sums.push(acc);
    }

    Ok((span, sums))
}

fn to_xy(buckets: &Buckets<'_>, span: &RangeInclusive<i64>, sums: Vec<f64>) -> Vec<XYValue> {
    span.clone()
        .zip(sums)
        .map(|(k, y)| XYValue::new(buckets.start(k), y))
        .collect()
}

fn multi_xy(
    buckets: &Buckets<'_>,
    span: RangeInclusive<i64>,
    sums: Vec<Vec<f64>>,
) -> DecimationOutput {
    DecimationOutput::MultiXy(sums.into_iter().map(|s| to_xy(buckets, &span, s)).collect())
}

#[derive(Debug, Default)]
pub struct SummedValueXYSeriesDecimator;

impl Decimator for SummedValueXYSeriesDecimator {
    fn key(&self) -> &'static str {
        "summed-value-xy-series"
    }

    fn name(&self) -> &'static str {
        "Summed Value XY Series"
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
        let buckets = ctx.buckets();
        let (span, mut sums) = sum_multi_xy_series_values(&buckets, x_start, x_end, &[buffer])?;
        let sums = sums.pop().unwrap_or_default();
        Ok(DecimationOutput::Xy(to_xy(&buckets, &span, sums)))
    }
}

#[derive(Debug, Default)]
pub struct SummedValueMultiXYSeriesDecimator;

impl Decimator for SummedValueMultiXYSeriesDecimator {
    fn key(&self) -> &'static str {
        "summed-value-multi-xy-series"
    }

    fn name(&self) -> &'static str {
        "Summed Value Multi XY Series"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::MultiXy
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let series = expect_input!(self, input, MultiXy);
        let buckets = ctx.buckets();
        let (span, sums) = sum_multi_xy_series_values(&buckets, x_start, x_end, series)?;
        Ok(multi_xy(&buckets, span, sums))
    }
}

/// Summed values rescaled so that the series in each bucket add up to 100.
/// Buckets whose total is zero are left as zeros.
#[derive(Debug, Default)]
pub struct ResidencyDecimator;

impl Decimator for ResidencyDecimator {
    fn key(&self) -> &'static str {
        "residency"
    }

    fn name(&self) -> &'static str {
        "Residency"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::MultiXy
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let series = expect_input!(self, input, MultiXy);
        let buckets = ctx.buckets();
        let (span, mut sums) = sum_multi_xy_series_values(&buckets, x_start, x_end, series)?;

        let len = sums.first().map(Vec::len).unwrap_or(0);
        for k in 0..len {
            let total: f64 = sums.iter().map(|s| s[k]).sum();
            if total == 0.0 {
                continue;
            }
            for s in sums.iter_mut() {
                s[k] = s[k] / total * 100.0;
            }
        }
        Ok(multi_xy(&buckets, span, sums))
    }
}

/// Summed values scaled against the hottest cell of the whole grid, giving
/// an intensity in `[0, 100]`.
#[derive(Debug, Default)]
pub struct HeatMapDecimator;

impl Decimator for HeatMapDecimator {
    fn key(&self) -> &'static str {
        "heat-map"
    }

    fn name(&self) -> &'static str {
        "Heat Map"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::MultiXy
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let series = expect_input!(self, input, MultiXy);
        let buckets = ctx.buckets();
        let (span, mut sums) = sum_multi_xy_series_values(&buckets, x_start, x_end, series)?;

        let hottest = sums
            .iter()
            .flatten()
            .fold(0.0f64, |m, &v| m.max(v.abs()));
        if hottest > 0.0 {
            for v in sums.iter_mut().flatten() {
                *v = *v / hottest * 100.0;
            }
        }
        Ok(multi_xy(&buckets, span, sums))
    }
}
