use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The y component of a sample: either a plain number or, for multi-state
/// step series, the weight each named state carries at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YValue {
    Scalar(f64),
    States(BTreeMap<String, f64>),
}

impl YValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            YValue::Scalar(y) => Some(*y),
            YValue::States(_) => None,
        }
    }
}

impl From<f64> for YValue {
    fn from(y: f64) -> Self {
        YValue::Scalar(y)
    }
}

// XYValue is one ordered sample of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XYValue {
    pub x: f64,
    pub y: YValue,
}

impl XYValue {
    pub fn new(x: f64, y: f64) -> Self {
        XYValue {
            x,
            y: YValue::Scalar(y),
        }
    }

    pub fn with_states<I, S>(x: f64, states: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        XYValue {
            x,
            y: YValue::States(states.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

/// A named interval `[x, x + dx)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceValue {
    pub x: f64,
    pub dx: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl TraceValue {
    pub fn new(x: f64, dx: f64, name: impl Into<String>) -> Self {
        TraceValue {
            x,
            dx,
            name: name.into(),
            key: None,
        }
    }

    pub fn keyed(x: f64, dx: f64, name: impl Into<String>, key: impl Into<String>) -> Self {
        TraceValue {
            x,
            dx,
            name: name.into(),
            key: Some(key.into()),
        }
    }

    pub fn end(&self) -> f64 {
        self.x + self.dx
    }
}

// FlameChartValue places a TraceValue at a call-stack depth. Depth 0 is the root frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlameChartValue {
    pub trace_value: TraceValue,
    pub depth: u32,
}

impl FlameChartValue {
    pub fn new(trace_value: TraceValue, depth: u32) -> Self {
        FlameChartValue { trace_value, depth }
    }
}

/// Entry, exit, min and max of one bucket, plus its representative value.
///
/// `y` is `None` when the bucket accumulated no weight at all ("no data").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsValue<T> {
    pub x: f64,
    pub y: Option<T>,
    pub entry: T,
    pub exit: T,
    pub min: T,
    pub max: T,
    pub count: usize,
}

/// Per-bucket summary of a categorical trace, expressed by state name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStateValue {
    pub x: f64,
    pub dx: f64,
    pub entry: String,
    pub exit: String,
    pub min: String,
    pub max: String,
}

/// Percentage of one bucket occupied by each known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidencyValue {
    pub x: f64,
    pub dx: f64,
    pub states: BTreeMap<String, f64>,
}
