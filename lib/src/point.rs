use std::collections::HashSet;

use crate::buffer::{visible_range, OrderedBuffer};
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::{Error, Result};
use crate::value::XYValue;

pub(crate) fn scalar(index: usize, value: &XYValue) -> Result<f64> {
    value.y.as_scalar().ok_or(Error::NonScalarValue { index })
}

#[derive(Debug, Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

impl Extreme {
    fn prefers(self, candidate: f64, best: f64) -> bool {
        match self {
            Extreme::Min => candidate < best,
            Extreme::Max => candidate > best,
        }
    }
}

/// Keep one sample per run of samples that share a bucket: the one with the
/// smallest (or largest) y. Ties keep the earliest sample.
fn extreme_per_bucket(
    ctx: &Context<'_>,
    buffer: &dyn OrderedBuffer<XYValue>,
    x_start: f64,
    x_end: f64,
    extreme: Extreme,
) -> Result<Vec<XYValue>> {
    let buckets = ctx.buckets();
    let mut out = Vec::new();
    // (bucket, index of best sample, its y)
    let mut current: Option<(i64, usize, f64)> = None;

    for i in visible_range(buffer, x_start, x_end) {
        let value = buffer.get(i);
        let y = scalar(i, value)?;
        let b = buckets.index(value.x);
        match current {
            Some((cb, _, best)) if cb == b => {
                if extreme.prefers(y, best) {
                    current = Some((b, i, y));
                }
            }
            _ => {
                if let Some((_, idx, _)) = current {
                    out.push(buffer.get(idx).clone());
                }
                current = Some((b, i, y));
            }
        }
    }
    if let Some((_, idx, _)) = current {
        out.push(buffer.get(idx).clone());
    }
    Ok(out)
}

#[derive(Debug, Default)]
pub struct MinPointDecimator;

impl Decimator for MinPointDecimator {
    fn key(&self) -> &'static str {
        "min-point"
    }

    fn name(&self) -> &'static str {
        "Min Point"
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
        extreme_per_bucket(ctx, buffer, x_start, x_end, Extreme::Min).map(DecimationOutput::Xy)
    }
}

#[derive(Debug, Default)]
pub struct MaxPointDecimator;

impl Decimator for MaxPointDecimator {
    fn key(&self) -> &'static str {
        "max-point"
    }

    fn name(&self) -> &'static str {
        "Max Point"
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
        extreme_per_bucket(ctx, buffer, x_start, x_end, Extreme::Max).map(DecimationOutput::Xy)
    }
}

/// Averages x and y over each run of samples that share a bucket.
#[derive(Debug, Default)]
pub struct AvgPointDecimator;

impl Decimator for AvgPointDecimator {
    fn key(&self) -> &'static str {
        "avg-point"
    }

    fn name(&self) -> &'static str {
        "Average Point"
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
        let mut out = Vec::new();
        // (bucket, sum x, sum y, count)
        let mut run: Option<(i64, f64, f64, usize)> = None;

        let flush = |run: (i64, f64, f64, usize), out: &mut Vec<XYValue>| {
            let (_, sx, sy, n) = run;
            out.push(XYValue::new(sx / n as f64, sy / n as f64));
        };

        for i in visible_range(buffer, x_start, x_end) {
            let value = buffer.get(i);
            let y = scalar(i, value)?;
            let b = buckets.index(value.x);
            run = match run {
                Some((cb, sx, sy, n)) if cb == b => Some((cb, sx + value.x, sy + y, n + 1)),
                prev => {
                    if let Some(prev) = prev {
                        flush(prev, &mut out);
                    }
                    Some((b, value.x, y, 1))
                }
            };
        }
        if let Some(run) = run {
            flush(run, &mut out);
        }
        Ok(DecimationOutput::Xy(out))
    }
}

/// Keeps the first sample at each distinct y pixel within a bucket, so points
/// that would overdraw each other are emitted once.
#[derive(Debug, Default)]
pub struct XYPointDecimator;

impl Decimator for XYPointDecimator {
    fn key(&self) -> &'static str {
        "xy-point"
    }

    fn name(&self) -> &'static str {
        "XY Point"
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
        let mut out = Vec::new();
        let mut bucket = None;
        let mut seen: HashSet<i64> = HashSet::new();

        for i in visible_range(buffer, x_start, x_end) {
            let value = buffer.get(i);
            let y = scalar(i, value)?;
            let b = buckets.index(value.x);
            if bucket != Some(b) {
                bucket = Some(b);
                seen.clear();
            }
            let y_px = buckets.y_value_to_coord(y).floor() as i64;
            if seen.insert(y_px) {
                out.push(value.clone());
            }
        }
        Ok(DecimationOutput::Xy(out))
    }
}
