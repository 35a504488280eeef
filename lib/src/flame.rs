use std::collections::BTreeMap;

use crate::bucket::Buckets;
use crate::buffer::OrderedBuffer;
use crate::decimator::{
    expect_input, Context, DecimationInput, DecimationOutput, Decimator, InputKind,
};
use crate::error::Result;
use crate::value::{FlameChartValue, TraceValue};

/// Key given to rectangles synthesized from a sub-pixel group.
pub const MERGED_KEY: &str = "merged";

/// Top-K by duration. Without a limit every rectangle passes through in its
/// input order.
#[derive(Debug, Default)]
pub struct FlameChartRectLimitDecimator;

impl Decimator for FlameChartRectLimitDecimator {
    fn key(&self) -> &'static str {
        "flame-chart-rect-limit"
    }

    fn name(&self) -> &'static str {
        "Flame Chart Rect Limit"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::FlameChart
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        _x_start: f64,
        _x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let buffer = *expect_input!(self, input, FlameChart);
        let mut rects: Vec<FlameChartValue> =
            (0..buffer.len()).map(|i| buffer.get(i).clone()).collect();

        if let Some(limit) = ctx.options.rect_limit {
            // Stable, so equal durations keep input order.
            rects.sort_by(|a, b| b.trace_value.dx.total_cmp(&a.trace_value.dx));
            rects.truncate(limit);
        }
        Ok(DecimationOutput::FlameChart(rects))
    }
}

/// Collapses flame chart rectangles per depth.
///
/// A rectangle that shares its key with the rectangle emitted just before it
/// at the same depth, and starts exactly where that one ends, extends it.
/// Otherwise the rectangles that follow it are grouped while their rounded
/// end coordinate stays less than `pixel_width` pixels past the pixel the
/// group starts on; a group of two or more becomes one rectangle spanning the
/// group, named after whichever name covers the most time inside it.
#[derive(Debug, Default)]
pub struct FlameChartMergeRectDecimator;

impl Decimator for FlameChartMergeRectDecimator {
    fn key(&self) -> &'static str {
        "flame-chart-merge-rect"
    }

    fn name(&self) -> &'static str {
        "Flame Chart Merge Rect"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::FlameChart
    }

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput> {
        let buffer = *expect_input!(self, input, FlameChart);

        let mut depths: BTreeMap<u32, Vec<&TraceValue>> = BTreeMap::new();
        for i in 0..buffer.len() {
            let rect = buffer.get(i);
            let tv = &rect.trace_value;
            if tv.end() > x_start && tv.x < x_end {
                depths.entry(rect.depth).or_default().push(tv);
            }
        }

        let buckets = ctx.buckets();
        let mut out = Vec::new();
        for (depth, rects) in depths {
            out.extend(
                merge_depth(&buckets, &rects, ctx.options.pixel_width)
                    .into_iter()
                    .map(|tv| FlameChartValue::new(tv, depth)),
            );
        }
        Ok(DecimationOutput::FlameChart(out))
    }
}

fn merge_depth(
    buckets: &Buckets<'_>,
    rects: &[&TraceValue],
    min_rect_delta: f64,
) -> Vec<TraceValue> {
    let mut out: Vec<TraceValue> = Vec::with_capacity(rects.len());
    let mut i = 0;

    while i < rects.len() {
        let rect = rects[i];

        if let Some(prev) = out.last_mut() {
            // Absent keys compare equal, so adjacent keyless rects merge too.
            let mergeable = prev.key == rect.key
                && prev.key.as_deref() != Some(MERGED_KEY)
                && prev.x + prev.dx == rect.x;
            if mergeable {
                prev.dx += rect.dx;
                i += 1;
                continue;
            }
        }

        let pixel = buckets.x_value_to_coord(rect.x).round();
        let mut j = i;
        while j < rects.len()
            && buckets.x_value_to_coord(rects[j].end()).round() - pixel < min_rect_delta
        {
            j += 1;
        }

        if j - i <= 1 {
            out.push(rect.clone());
            i += 1;
            continue;
        }

        out.push(merge_group(&rects[i..j]));
        i = j;
    }
    out
}

/// One rectangle spanning the group, named by its sub-pixel majority.
fn merge_group(group: &[&TraceValue]) -> TraceValue {
    // Insertion order breaks ties in favour of the first name seen.
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for rect in group {
        match totals.iter_mut().find(|(name, _)| *name == rect.name) {
            Some((_, total)) => *total += rect.dx,
            None => totals.push((&rect.name, rect.dx)),
        }
    }
    let winner = totals
        .iter()
        .fold(None, |best: Option<(&str, f64)>, &(name, total)| match best {
            Some((_, t)) if t >= total => best,
            _ => Some((name, total)),
        })
        .map(|(name, _)| name)
        .unwrap_or_default();

    let x = group[0].x;
    let end = group.iter().map(|r| r.end()).fold(f64::MIN, f64::max);
    TraceValue::keyed(x, end - x, winner, MERGED_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimator::testutil::{assert_close, unit_scales};
    use crate::decimator::{BoundDecimator, DecimatorOptions};
    use crate::scale::{AxisScales, ScaleMapping};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn flame(x: f64, dx: f64, name: &str, key: &str, depth: u32) -> FlameChartValue {
        FlameChartValue::new(TraceValue::keyed(x, dx, name, key), depth)
    }

    fn merge(
        scales: Arc<dyn ScaleMapping>,
        pixel_width: f64,
        xs: f64,
        xe: f64,
        rects: &[FlameChartValue],
    ) -> Vec<FlameChartValue> {
        let mut bound = BoundDecimator::initialize(Arc::new(FlameChartMergeRectDecimator), scales, None);
        bound.set_pixel_width(pixel_width);
        bound
            .decimate_values(xs, xe, &DecimationInput::FlameChart(&rects.to_vec()))
            .unwrap()
            .as_flame_chart()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn touching_same_key_rects_merge() {
        let rects = vec![flame(0.0, 5.0, "A", "A", 0), flame(5.0, 3.0, "A", "A", 0)];
        let out = merge(unit_scales(10.0), 0.0, 0.0, 10.0, &rects);
        assert_eq!(out, vec![flame(0.0, 8.0, "A", "A", 0)]);
    }

    #[test]
    fn gap_or_other_key_prevents_merge() {
        let rects = vec![
            flame(0.0, 2.0, "A", "A", 0),
            flame(3.0, 2.0, "A", "A", 0),
            flame(5.0, 2.0, "B", "B", 0),
        ];
        let out = merge(unit_scales(10.0), 0.0, 0.0, 10.0, &rects);
        assert_eq!(out, rects);
    }

    #[test]
    fn touching_keyless_rects_merge() {
        let keyless = |x, dx, name: &str| FlameChartValue::new(TraceValue::new(x, dx, name), 0);
        let rects = vec![keyless(0.0, 2.0, "A"), keyless(2.0, 3.0, "A"), keyless(6.0, 1.0, "A")];
        let out = merge(unit_scales(10.0), 0.0, 0.0, 10.0, &rects);
        assert_eq!(out, vec![keyless(0.0, 5.0, "A"), keyless(6.0, 1.0, "A")]);
    }

    #[test]
    fn depths_merge_independently() {
        let rects = vec![
            flame(0.0, 4.0, "root", "r", 0),
            flame(0.0, 2.0, "a", "a", 1),
            flame(2.0, 2.0, "a", "a", 1),
            flame(4.0, 4.0, "root", "r", 0),
        ];
        let out = merge(unit_scales(10.0), 0.0, 0.0, 10.0, &rects);
        assert_eq!(
            out,
            vec![flame(0.0, 8.0, "root", "r", 0), flame(0.0, 4.0, "a", "a", 1)]
        );
    }

    #[test]
    fn sub_pixel_group_takes_majority_name() {
        // 1000 units over 10 pixels: every rect below is far narrower than a pixel.
        let scales: Arc<dyn ScaleMapping> = Arc::new(AxisScales::linear_x([0.0, 1000.0], [0.0, 10.0]));
        let rects = vec![
            flame(0.0, 10.0, "a", "1", 0),
            flame(10.0, 5.0, "b", "2", 0),
            flame(15.0, 10.0, "b", "3", 0),
            flame(25.0, 5.0, "c", "4", 0),
            // Starts a pixel further on and is wide: kept as is.
            flame(200.0, 300.0, "d", "5", 0),
        ];
        let out = merge(scales, 1.0, 0.0, 1000.0, &rects);
        assert_eq!(out.len(), 2);
        let merged = &out[0].trace_value;
        assert_eq!(merged.name, "b");
        assert_eq!(merged.key.as_deref(), Some(MERGED_KEY));
        assert_close(merged.x, 0.0);
        assert_close(merged.dx, 30.0);
        assert_eq!(out[1], rects[4]);
    }

    #[test]
    fn single_rect_group_is_verbatim() {
        let scales: Arc<dyn ScaleMapping> = Arc::new(AxisScales::linear_x([0.0, 1000.0], [0.0, 10.0]));
        let rects = vec![flame(0.0, 10.0, "a", "1", 0), flame(500.0, 10.0, "b", "2", 0)];
        let out = merge(scales, 1.0, 0.0, 1000.0, &rects);
        assert_eq!(out, rects);
    }

    #[test]
    fn window_prefilter_drops_non_overlapping() {
        let rects = vec![
            flame(0.0, 1.0, "a", "a", 0),
            flame(2.0, 1.0, "b", "b", 0),
            flame(5.0, 1.0, "c", "c", 0),
        ];
        let out = merge(unit_scales(10.0), 0.0, 1.0, 5.0, &rects);
        assert_eq!(out, vec![rects[1].clone()]);
    }

    #[test]
    fn rect_limit_keeps_longest() {
        let rects = vec![
            flame(0.0, 1.0, "a", "a", 0),
            flame(1.0, 5.0, "b", "b", 0),
            flame(6.0, 3.0, "c", "c", 1),
        ];
        let mut bound = BoundDecimator::initialize(Arc::new(FlameChartRectLimitDecimator), unit_scales(10.0), None)
            .with_options(DecimatorOptions {
                rect_limit: Some(2),
                ..DecimatorOptions::default()
            });
        let out = bound
            .decimate_values(0.0, 10.0, &DecimationInput::FlameChart(&rects))
            .unwrap();
        assert_eq!(out.as_flame_chart().unwrap(), &[rects[1].clone(), rects[2].clone()]);

        bound.set_rect_limit(None);
        let out = bound
            .decimate_values(0.0, 10.0, &DecimationInput::FlameChart(&rects))
            .unwrap();
        assert_eq!(out.as_flame_chart().unwrap(), rects.as_slice());
    }

    fn total(rects: &[FlameChartValue]) -> f64 {
        rects.iter().map(|r| r.trace_value.dx).sum()
    }

    prop_compose! {
        // Gap-free rows of rectangles at a few depths, keys drawn from a
        // small alphabet so that merges happen.
        fn arb_rows()(
            widths in prop::collection::vec((0.01f64..20.0, 0usize..3, 0u32..3), 0..60),
        ) -> Vec<FlameChartValue> {
            let mut ends = [0.0f64; 3];
            let mut rects: Vec<FlameChartValue> = widths
                .into_iter()
                .map(|(dx, name, depth)| {
                    let x = ends[depth as usize];
                    ends[depth as usize] += dx;
                    let name = ["a", "b", "c"][name];
                    flame(x, dx, name, name, depth)
                })
                .collect();
            rects.sort_by(|a, b| a.trace_value.x.total_cmp(&b.trace_value.x));
            rects
        }
    }

    proptest! {
        #[test]
        fn prop_merge_never_adds_duration(rects in arb_rows(), pixel_width in 0.0f64..4.0) {
            let scales: Arc<dyn ScaleMapping> = Arc::new(AxisScales::linear_x([0.0, 400.0], [0.0, 100.0]));
            let out = merge(scales, pixel_width, 0.0, 1e9, &rects);
            prop_assert!(total(&out) <= total(&rects) + 1e-6);
        }

        #[test]
        fn prop_zero_delta_conserves_duration(rects in arb_rows()) {
            let scales: Arc<dyn ScaleMapping> = Arc::new(AxisScales::linear_x([0.0, 400.0], [0.0, 100.0]));
            let out = merge(scales, 0.0, 0.0, 1e9, &rects);
            prop_assert!((total(&out) - total(&rects)).abs() < 1e-6);
        }
    }
}
