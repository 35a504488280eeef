//! Entry / exit / min / max bucket summaries.
//!
//! Every accumulator here is created inside `decimate` and dropped when it
//! returns, so concurrent handles over one strategy never share scratch state.

use crate::buffer::{visible_range, OrderedBuffer};
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::{Error, Result};
use crate::point::scalar;
use crate::value::{NewsValue, XYValue, YValue};

struct PointBucket {
    bucket: i64,
    entry: f64,
    exit: f64,
    min: f64,
    max: f64,
    sum_x: f64,
    sum_y: f64,
    count: usize,
}

impl PointBucket {
    fn open(bucket: i64, x: f64, y: f64) -> Self {
        PointBucket {
            bucket,
            entry: y,
            exit: y,
            min: y,
            max: y,
            sum_x: x,
            sum_y: y,
            count: 1,
        }
    }

    fn add(&mut self, x: f64, y: f64) {
        self.exit = y;
        self.min = self.min.min(y);
        self.max = self.max.max(y);
        self.sum_x += x;
        self.sum_y += y;
        self.count += 1;
    }

    fn close(self) -> NewsValue<f64> {
        let n = self.count as f64;
        NewsValue {
            x: self.sum_x / n,
            y: Some(self.sum_y / n),
            entry: self.entry,
            exit: self.exit,
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

#[derive(Debug, Default)]
pub struct NewsPointDecimator;

impl Decimator for NewsPointDecimator {
    fn key(&self) -> &'static str {
        "news-point"
    }

    fn name(&self) -> &'static str {
        "NEWS Point"
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
        let mut open: Option<PointBucket> = None;

        for i in visible_range(buffer, x_start, x_end) {
            let value = buffer.get(i);
            let y = scalar(i, value)?;
            let b = buckets.index(value.x);
            match open.as_mut() {
                Some(acc) if acc.bucket == b => acc.add(value.x, y),
                _ => {
                    if let Some(acc) = open.replace(PointBucket::open(b, value.x, y)) {
                        out.push(acc.close());
                    }
                }
            }
        }
        if let Some(acc) = open {
            out.push(acc.close());
        }
        Ok(DecimationOutput::News(out))
    }
}

/// State weights of one sample, as (ordinal, weight) pairs.
fn sample_weights(ctx: &Context<'_>, value: &XYValue) -> Result<Vec<(usize, f64)>> {
    match &value.y {
        YValue::Scalar(y) => {
            if *y < 0.0 || y.fract() != 0.0 || *y as usize >= ctx.states.len() {
                return Err(Error::UnknownState(y.to_string()));
            }
            Ok(vec![(*y as usize, 1.0)])
        }
        YValue::States(weights) => weights
            .iter()
            .map(|(name, w)| -> Result<(usize, f64)> { Ok((ctx.state_index(name)?, *w)) })
            .collect(),
    }
}

/// The heaviest state of a sample; ties go to the lower ordinal.
fn dominant(weights: &[(usize, f64)]) -> usize {
    weights
        .iter()
        .copied()
        .fold(None, |best: Option<(usize, f64)>, (s, w)| match best {
            Some((bs, bw)) if bw > w || (bw == w && bs < s) => Some((bs, bw)),
            _ => Some((s, w)),
        })
        .map(|(s, _)| s)
        .unwrap_or(0)
}

struct StateBucket {
    bucket: i64,
    entry: usize,
    exit: usize,
    // (screen coordinate, ordinal)
    min: (f64, usize),
    max: (f64, usize),
    sum_x: f64,
    count: usize,
    weighted: Vec<f64>,
    // Dominant state of the last sample that carried any weight.
    held: Option<usize>,
}

impl StateBucket {
    fn open(ctx: &Context<'_>, bucket: i64, x: f64, weights: &[(usize, f64)]) -> Self {
        let state = dominant(weights);
        let coord = ctx.scales.y_value_to_coord(state as f64);
        let mut acc = StateBucket {
            bucket,
            entry: state,
            exit: state,
            min: (coord, state),
            max: (coord, state),
            sum_x: 0.0,
            count: 0,
            weighted: vec![0.0; ctx.states.len()],
            held: None,
        };
        acc.add(ctx, x, weights);
        acc
    }

    fn add(&mut self, ctx: &Context<'_>, x: f64, weights: &[(usize, f64)]) {
        self.exit = dominant(weights);
        if weights.iter().any(|&(_, w)| w > 0.0) {
            self.held = Some(self.exit);
        }
        for &(s, _) in weights {
            let coord = ctx.scales.y_value_to_coord(s as f64);
            if coord < self.min.0 {
                self.min = (coord, s);
            }
            if coord > self.max.0 {
                self.max = (coord, s);
            }
        }
        self.sum_x += x;
        self.count += 1;
    }

    /// Credit the time a state was held to this bucket.
    fn credit(&mut self, duration: f64, weights: &[(usize, f64)]) {
        for &(s, w) in weights {
            self.weighted[s] += duration * w;
        }
    }

    fn close(self, ctx: &Context<'_>, decimator: &'static str) -> Result<NewsValue<String>> {
        let mut y = None;
        let mut best = 0.0;
        for (s, &w) in self.weighted.iter().enumerate() {
            if w > best {
                best = w;
                y = Some(s);
            }
        }
        // A bucket whose samples were held for no time (the last one in the
        // window, or several samples at the same x) shows the state it was
        // left in. Only samples without any weight leave it degenerate.
        if y.is_none() {
            y = self.held;
        }
        if y.is_none() {
            ctx.degenerate(decimator, self.bucket)?;
        }
        let name = |s: usize| ctx.state_name(s).map(str::to_string);
        Ok(NewsValue {
            x: self.sum_x / self.count as f64,
            y: y.map(name).transpose()?,
            entry: name(self.entry)?,
            exit: name(self.exit)?,
            min: name(self.min.1)?,
            max: name(self.max.1)?,
            count: self.count,
        })
    }
}

/// NEWS summary of a categorical series. Each sample's state holds until the
/// next sample; the state held longest in a bucket becomes its `y`. `min` and
/// `max` are chosen by screen coordinate, since the y axis may be inverted.
#[derive(Debug, Default)]
pub struct NewsStateDecimator;

impl Decimator for NewsStateDecimator {
    fn key(&self) -> &'static str {
        "news-state"
    }

    fn name(&self) -> &'static str {
        "NEWS State"
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
        ctx.require_states(self.key())?;
        let buckets = ctx.buckets();
        let mut out = Vec::new();
        let mut open: Option<StateBucket> = None;
        let mut prev: Option<(f64, Vec<(usize, f64)>)> = None;

        for i in visible_range(buffer, x_start, x_end) {
            let value = buffer.get(i);
            let weights = sample_weights(ctx, value)?;
            let b = buckets.index(value.x);

            if let (Some(acc), Some((prev_x, prev_weights))) = (open.as_mut(), prev.as_ref()) {
                acc.credit(value.x - prev_x, prev_weights);
            }

            match open.as_mut() {
                Some(acc) if acc.bucket == b => acc.add(ctx, value.x, &weights),
                _ => {
                    if let Some(acc) = open.replace(StateBucket::open(ctx, b, value.x, &weights)) {
                        out.push(acc.close(ctx, self.key())?);
                    }
                }
            }
            prev = Some((value.x, weights));
        }
        if let Some(acc) = open {
            out.push(acc.close(ctx, self.key())?);
        }
        Ok(DecimationOutput::NewsStates(out))
    }
}
