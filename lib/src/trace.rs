use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::bucket::{overlap, Buckets};
use crate::buffer::{visible_range, OrderedBuffer};
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::Result;
use crate::value::{ResidencyValue, TraceStateValue, TraceValue, XYValue};

/// Buckets inside `span` that the interval `[x, x + dx)` touches. A zero
/// width interval still touches the bucket it sits in.
fn touched(buckets: &Buckets<'_>, span: &RangeInclusive<i64>, tv: &TraceValue) -> Option<(i64, i64)> {
    let first = buckets.index(tv.x);
    let last = buckets.index_exclusive(tv.end()).max(first);
    let lo = first.max(*span.start());
    let hi = last.min(*span.end());
    (lo <= hi).then_some((lo, hi))
}

/// Share of each bucket's width covered by each named state, as a percentage.
///
/// Columns are the caller's state names when given, otherwise every name
/// observed in the window. Once anything is visible, every bucket of the
/// window gets a row carrying every column, zero when the state never occurs
/// there.
#[derive(Debug, Default)]
pub struct TraceResidencyDecimator;

impl Decimator for TraceResidencyDecimator {
    fn key(&self) -> &'static str {
        "trace-residency"
    }

    fn name(&self) -> &'static str {
        "Trace Residency"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Trace
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let buffer = *expect_input!(self, input, Trace);
        let buckets = ctx.buckets();
        let span = buckets.span(x_start, x_end);

        let mut columns: Vec<String> = ctx.states.to_vec();
        let mut occupancy: BTreeMap<i64, BTreeMap<String, f64>> = BTreeMap::new();

        for i in visible_range(buffer, x_start, x_end) {
            let tv = buffer.get(i);
            if ctx.states.is_empty() {
                if !columns.contains(&tv.name) {
                    columns.push(tv.name.clone());
                }
            } else {
                ctx.state_index(&tv.name)?;
            }
            let Some((lo, hi)) = touched(&buckets, &span, tv) else {
                continue;
            };
            for b in lo..=hi {
                let width = buckets.width(b);
                if width <= 0.0 {
                    continue;
                }
                let covered = overlap(tv.x, tv.end(), buckets.start(b), buckets.end(b));
                *occupancy
                    .entry(b)
                    .or_default()
                    .entry(tv.name.clone())
                    .or_insert(0.0) += covered / width * 100.0;
            }
        }

        if occupancy.is_empty() {
            return Ok(DecimationOutput::Residency(Vec::new()));
        }

        let out = span
            .map(|b| {
                let seen = occupancy.get(&b);
                let states = columns
                    .iter()
                    .map(|name| {
                        let share = seen.and_then(|s| s.get(name)).copied().unwrap_or(0.0);
                        (name.clone(), share)
                    })
                    .collect();
                ResidencyValue {
                    x: buckets.start(b),
                    dx: buckets.width(b),
                    states,
                }
            })
            .collect();
        Ok(DecimationOutput::Residency(out))
    }
}

#[derive(Debug, Clone, Copy)]
struct StateSummary {
    entry: usize,
    exit: usize,
    min: usize,
    max: usize,
}

impl StateSummary {
    fn new(ordinal: usize) -> Self {
        StateSummary {
            entry: ordinal,
            exit: ordinal,
            min: ordinal,
            max: ordinal,
        }
    }

    fn update(&mut self, ordinal: usize) {
        self.exit = ordinal;
        self.min = self.min.min(ordinal);
        self.max = self.max.max(ordinal);
    }
}

/// Entry, exit, lowest and highest state per bucket of a categorical trace.
///
/// A bucket that no interval reaches stays in the state the previous bucket
/// exited with.
#[derive(Debug, Default)]
pub struct TraceStateDecimator;

impl Decimator for TraceStateDecimator {
    fn key(&self) -> &'static str {
        "trace-state"
    }

    fn name(&self) -> &'static str {
        "Trace State"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Trace
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let buffer = *expect_input!(self, input, Trace);
        ctx.require_states(self.key())?;
        let buckets = ctx.buckets();
        let span = buckets.span(x_start, x_end);

        let mut summaries: BTreeMap<i64, StateSummary> = BTreeMap::new();
        for i in visible_range(buffer, x_start, x_end) {
            let tv = buffer.get(i);
            let ordinal = ctx.state_index(&tv.name)?;
            let Some((lo, hi)) = touched(&buckets, &span, tv) else {
                continue;
            };
            for b in lo..=hi {
                summaries
                    .entry(b)
                    .and_modify(|s| s.update(ordinal))
                    .or_insert_with(|| StateSummary::new(ordinal));
            }
        }

        let (Some(&first), Some(&last)) = (summaries.keys().next(), summaries.keys().next_back())
        else {
            return Ok(DecimationOutput::TraceStates(Vec::new()));
        };

        let mut out = Vec::with_capacity((last - first + 1) as usize);
        let mut previous: Option<StateSummary> = None;
        for b in first..=last {
            let summary = match summaries.get(&b) {
                Some(s) => *s,
                // first is always present, so previous is set from here on.
                None => match previous {
                    Some(p) => StateSummary::new(p.exit),
                    None => continue,
                },
            };
            out.push(TraceStateValue {
                x: buckets.start(b),
                dx: buckets.width(b),
                entry: ctx.state_name(summary.entry)?.to_string(),
                exit: ctx.state_name(summary.exit)?.to_string(),
                min: ctx.state_name(summary.min)?.to_string(),
                max: ctx.state_name(summary.max)?.to_string(),
            });
            previous = Some(summary);
        }
        Ok(DecimationOutput::TraceStates(out))
    }
}

/// Drops markers that would land on the same x pixel as the last one drawn.
#[derive(Debug, Default)]
pub struct SimpleMarkerDecimator;

impl Decimator for SimpleMarkerDecimator {
    fn key(&self) -> &'static str {
        "simple-marker"
    }

    fn name(&self) -> &'static str {
        "Simple Marker"
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
        let mut out: Vec<XYValue> = Vec::new();
        let mut last_pixel = None;

        for i in visible_range(buffer, x_start, x_end) {
            let marker = buffer.get(i);
            let pixel = buckets.index(marker.x);
            if last_pixel != Some(pixel) {
                last_pixel = Some(pixel);
                out.push(marker.clone());
            }
        }
        Ok(DecimationOutput::Xy(out))
    }
}
