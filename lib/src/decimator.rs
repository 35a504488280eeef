use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::bucket::Buckets;
use crate::buffer::OrderedBuffer;
use crate::error::{Error, Result};
use crate::scale::ScaleMapping;
use crate::value::{
    FlameChartValue, NewsValue, ResidencyValue, TraceStateValue, TraceValue, XYValue,
};

/// The input shape a strategy consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Xy,
    MultiXy,
    Trace,
    FlameChart,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputKind::Xy => write!(f, "xy"),
            InputKind::MultiXy => write!(f, "multi-xy"),
            InputKind::Trace => write!(f, "trace"),
            InputKind::FlameChart => write!(f, "flame-chart"),
        }
    }
}

pub enum DecimationInput<'a> {
    Xy(&'a dyn OrderedBuffer<XYValue>),
    MultiXy(Vec<&'a dyn OrderedBuffer<XYValue>>),
    Trace(&'a dyn OrderedBuffer<TraceValue>),
    FlameChart(&'a dyn OrderedBuffer<FlameChartValue>),
}

impl<'a> DecimationInput<'a> {
    pub fn kind(&self) -> InputKind {
        match self {
            DecimationInput::Xy(_) => InputKind::Xy,
            DecimationInput::MultiXy(_) => InputKind::MultiXy,
            DecimationInput::Trace(_) => InputKind::Trace,
            DecimationInput::FlameChart(_) => InputKind::FlameChart,
        }
    }
}

/// A strategy's native result shape. Serializes as the bare array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecimationOutput {
    Xy(Vec<XYValue>),
    /// One sequence per input series, aligned by bucket.
    MultiXy(Vec<Vec<XYValue>>),
    News(Vec<NewsValue<f64>>),
    NewsStates(Vec<NewsValue<String>>),
    Trace(Vec<TraceValue>),
    FlameChart(Vec<FlameChartValue>),
    TraceStates(Vec<TraceStateValue>),
    Residency(Vec<ResidencyValue>),
}

impl DecimationOutput {
    pub fn len(&self) -> usize {
        match self {
            DecimationOutput::Xy(v) => v.len(),
            DecimationOutput::MultiXy(v) => v.len(),
            DecimationOutput::News(v) => v.len(),
            DecimationOutput::NewsStates(v) => v.len(),
            DecimationOutput::Trace(v) => v.len(),
            DecimationOutput::FlameChart(v) => v.len(),
            DecimationOutput::TraceStates(v) => v.len(),
            DecimationOutput::Residency(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_xy(&self) -> Option<&[XYValue]> {
        match self {
            DecimationOutput::Xy(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_multi_xy(&self) -> Option<&[Vec<XYValue>]> {
        match self {
            DecimationOutput::MultiXy(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flame_chart(&self) -> Option<&[FlameChartValue]> {
        match self {
            DecimationOutput::FlameChart(v) => Some(v),
            _ => None,
        }
    }
}

/// Per-handle tuning. Travels with the bound decimator, never with the
/// shared strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecimatorOptions {
    /// Pixel tolerance under which flame chart rectangles are grouped.
    pub pixel_width: f64,
    /// Keep at most this many rectangles in rect-limit decimation.
    pub rect_limit: Option<usize>,
    /// Fail on buckets without contributing samples instead of marking them.
    pub strict: bool,
}

impl Default for DecimatorOptions {
    fn default() -> Self {
        DecimatorOptions {
            pixel_width: 1.0,
            rect_limit: None,
            strict: false,
        }
    }
}

/// Everything a strategy may read during one call.
pub struct Context<'a> {
    pub scales: &'a dyn ScaleMapping,
    pub states: &'a [String],
    pub options: &'a DecimatorOptions,
}

impl<'a> Context<'a> {
    pub fn buckets(&self) -> Buckets<'a> {
        Buckets::new(self.scales)
    }

    pub fn require_states(&self, decimator: &'static str) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::MissingStates(decimator));
        }
        Ok(())
    }

    /// Ordinal of a state name in the caller-supplied list.
    pub fn state_index(&self, name: &str) -> Result<usize> {
        self.states
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| Error::UnknownState(name.to_string()))
    }

    /// Name of the state at ordinal `index`.
    pub fn state_name(&self, index: usize) -> Result<&'a str> {
        self.states
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownState(index.to_string()))
    }

    /// Handle a bucket that accumulated nothing: an error in strict mode,
    /// otherwise a warning and `Ok`.
    pub fn degenerate(&self, decimator: &'static str, bucket: i64) -> Result<()> {
        if self.options.strict {
            return Err(Error::DegenerateBucket { bucket });
        }
        log::warn!("{}: bucket {} has no contributing samples", decimator, bucket);
        Ok(())
    }
}

/// A decimation strategy.
///
/// Strategies hold no per-call state; every accumulator lives on the stack of
/// `decimate`, so one instance may serve any number of bound handles.
pub trait Decimator: Send + Sync {
    /// Registry key.
    fn key(&self) -> &'static str;

    /// Human readable label.
    fn name(&self) -> &'static str;

    fn input_kind(&self) -> InputKind;

    fn decimate(
        &self,
        ctx: &Context<'_>,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<DecimationOutput>;
}

/// Unpack the expected input variant or report the mismatch.
macro_rules! expect_input {
    ($self:ident, $input:expr, $variant:ident) => {
        match $input {
            $crate::decimator::DecimationInput::$variant(buffer) => buffer,
            other => {
                return Err($crate::error::Error::InputMismatch {
                    decimator: $self.key(),
                    expected: $self.input_kind(),
                    actual: other.kind(),
                })
            }
        }
    };
}

pub(crate) use expect_input;

/// A strategy bound to one viewport's scale mapping and state names.
///
/// This is what `initialize` produces. It can be asked to decimate any number
/// of windows; a new viewport needs a new handle.
pub struct BoundDecimator {
    strategy: Arc<dyn Decimator>,
    scales: Arc<dyn ScaleMapping>,
    states: Vec<String>,
    options: DecimatorOptions,
    values: Option<DecimationOutput>,
}

impl BoundDecimator {
    pub fn initialize(
        strategy: Arc<dyn Decimator>,
        scales: Arc<dyn ScaleMapping>,
        states: Option<Vec<String>>,
    ) -> Self {
        BoundDecimator {
            strategy,
            scales,
            states: states.unwrap_or_default(),
            options: DecimatorOptions::default(),
            values: None,
        }
    }

    pub fn with_options(mut self, options: DecimatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key(&self) -> &'static str {
        self.strategy.key()
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn options(&self) -> &DecimatorOptions {
        &self.options
    }

    pub fn set_pixel_width(&mut self, pixel_width: f64) {
        self.options.pixel_width = pixel_width;
    }

    pub fn set_rect_limit(&mut self, rect_limit: Option<usize>) {
        self.options.rect_limit = rect_limit;
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.options.strict = strict;
    }

    pub fn decimate_values(
        &mut self,
        x_start: f64,
        x_end: f64,
        input: &DecimationInput<'_>,
    ) -> Result<&DecimationOutput> {
        if input.kind() != self.strategy.input_kind() {
            return Err(Error::InputMismatch {
                decimator: self.strategy.key(),
                expected: self.strategy.input_kind(),
                actual: input.kind(),
            });
        }
        let ctx = Context {
            scales: self.scales.as_ref(),
            states: &self.states,
            options: &self.options,
        };
        let output = self.strategy.decimate(&ctx, x_start, x_end, input)?;
        Ok(self.values.insert(output))
    }

    /// The most recent result, without recomputing.
    pub fn values(&self) -> Option<&DecimationOutput> {
        self.values.as_ref()
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::unit_scales;
    use super::*;
    use crate::point::MinPointDecimator;
    use crate::value::TraceValue;

    #[test]
    fn values_returns_last_result() {
        let mut bound = BoundDecimator::initialize(Arc::new(MinPointDecimator), unit_scales(4.0), None);
        assert!(bound.values().is_none());

        let data = vec![XYValue::new(0.0, 5.0), XYValue::new(1.0, 1.0)];
        let len = bound
            .decimate_values(0.0, 4.0, &DecimationInput::Xy(&data))
            .unwrap()
            .len();
        assert_eq!(len, 2);
        assert_eq!(bound.values().map(DecimationOutput::len), Some(2));
    }

    #[test]
    fn wrong_input_shape_is_rejected() {
        let mut bound = BoundDecimator::initialize(Arc::new(MinPointDecimator), unit_scales(4.0), None);
        let traces = vec![TraceValue::new(0.0, 1.0, "a")];
        let err = bound
            .decimate_values(0.0, 4.0, &DecimationInput::Trace(&traces))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InputMismatch {
                expected: InputKind::Xy,
                actual: InputKind::Trace,
                ..
            }
        ));
    }

    #[test]
    fn options_deserialize_partially() {
        let opts: DecimatorOptions = serde_json::from_str(r#"{"rectLimit": 3}"#).unwrap();
        assert_eq!(opts.rect_limit, Some(3));
        assert_eq!(opts.pixel_width, 1.0);
        assert!(!opts.strict);
    }
}
