use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maps between value space and pixel space.
///
/// Every decimator buckets samples with `x_value_to_coord`, converts bucket
/// boundaries back with `x_coord_to_value`, and orders categorical states on
/// screen with `y_value_to_coord`. A mapping is only valid for the viewport
/// it was built for.
pub trait ScaleMapping: Send + Sync {
    fn x_value_to_coord(&self, x: f64) -> f64;
    fn x_coord_to_value(&self, coord: f64) -> f64;
    fn y_value_to_coord(&self, y: f64) -> f64;

    /// Pixel extent of the x axis, in either order. Buckets outside it are
    /// never drawn.
    fn x_coord_extent(&self) -> [f64; 2];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    Ordinal,
    Linear,
    Logarithmic,
}

impl FromStr for ScaleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Ordinal" | "ordinal" => Ok(ScaleKind::Ordinal),
            "Linear" | "linear" => Ok(ScaleKind::Linear),
            "Logarithmic" | "logarithmic" | "log" => Ok(ScaleKind::Logarithmic),
            other => Err(Error::UnsupportedScaleKind(other.to_string())),
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScaleKind::Ordinal => write!(f, "Ordinal"),
            ScaleKind::Linear => write!(f, "Linear"),
            ScaleKind::Logarithmic => write!(f, "Logarithmic"),
        }
    }
}

fn default_clamp() -> bool {
    true
}

/// Axis description as it arrives from the host: the scale kind by name and,
/// for ordinal axes, the explicit ordered keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<f64>,
    #[serde(default = "default_clamp")]
    pub clamp: bool,
}

impl AxisDescriptor {
    pub fn new(kind: ScaleKind) -> Self {
        AxisDescriptor {
            kind: kind.to_string(),
            keys: Vec::new(),
            clamp: true,
        }
    }

    pub fn ordinal(keys: Vec<f64>) -> Self {
        AxisDescriptor {
            kind: ScaleKind::Ordinal.to_string(),
            keys,
            clamp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Linear {
        domain: [f64; 2],
        range: [f64; 2],
        clamp: bool,
    },
    Logarithmic {
        domain: [f64; 2],
        range: [f64; 2],
        clamp: bool,
    },
    /// Discrete bands, one per key, laid out in key order across the range.
    Ordinal {
        keys: Vec<f64>,
        // (key, band index) sorted by key, for nearest-key lookup.
        sorted: Vec<(f64, usize)>,
        range: [f64; 2],
    },
}

impl Scale {
    /// Build a scale from a descriptor. Fails fast on an unknown kind instead
    /// of handing back a mapping that cannot be called.
    pub fn from_descriptor(
        axis: &'static str,
        descriptor: &AxisDescriptor,
        domain: [f64; 2],
        range: [f64; 2],
    ) -> Result<Self> {
        let kind: ScaleKind = descriptor.kind.parse().map_err(|e| {
            log::warn!("{} axis: {}", axis, e);
            e
        })?;
        match kind {
            ScaleKind::Linear => {
                if domain[0] == domain[1] {
                    return Err(Error::InvalidDomain {
                        axis,
                        reason: format!("zero-width domain [{}, {}]", domain[0], domain[1]),
                    });
                }
                Ok(Scale::Linear {
                    domain,
                    range,
                    clamp: descriptor.clamp,
                })
            }
            ScaleKind::Logarithmic => {
                if domain[0] <= 0.0 || domain[1] <= 0.0 || domain[0] == domain[1] {
                    return Err(Error::InvalidDomain {
                        axis,
                        reason: format!(
                            "logarithmic domain [{}, {}] must be positive and non-empty",
                            domain[0], domain[1]
                        ),
                    });
                }
                Ok(Scale::Logarithmic {
                    domain,
                    range,
                    clamp: descriptor.clamp,
                })
            }
            ScaleKind::Ordinal => Scale::ordinal(axis, descriptor.keys.clone(), range),
        }
    }

    pub fn linear(domain: [f64; 2], range: [f64; 2]) -> Self {
        Scale::Linear {
            domain,
            range,
            clamp: true,
        }
    }

    /// Unclamped one-to-one mapping.
    pub fn identity() -> Self {
        Scale::Linear {
            domain: [0.0, 1.0],
            range: [0.0, 1.0],
            clamp: false,
        }
    }

    pub fn ordinal(axis: &'static str, keys: Vec<f64>, range: [f64; 2]) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::InvalidDomain {
                axis,
                reason: "ordinal scale has no keys".to_string(),
            });
        }
        let mut sorted: Vec<(f64, usize)> = keys.iter().copied().zip(0..).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Scale::Ordinal {
            keys,
            sorted,
            range,
        })
    }

    pub fn kind(&self) -> ScaleKind {
        match self {
            Scale::Linear { .. } => ScaleKind::Linear,
            Scale::Logarithmic { .. } => ScaleKind::Logarithmic,
            Scale::Ordinal { .. } => ScaleKind::Ordinal,
        }
    }

    pub fn range(&self) -> [f64; 2] {
        match self {
            Scale::Linear { range, .. }
            | Scale::Logarithmic { range, .. }
            | Scale::Ordinal { range, .. } => *range,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Scale::Linear {
                domain,
                range,
                clamp,
            } => {
                let t = normalize(value, domain[0], domain[1], *clamp);
                lerp(range[0], range[1], t)
            }
            Scale::Logarithmic {
                domain,
                range,
                clamp,
            } => {
                if value <= 0.0 {
                    return range[0];
                }
                let t = normalize(value.ln(), domain[0].ln(), domain[1].ln(), *clamp);
                lerp(range[0], range[1], t)
            }
            Scale::Ordinal { sorted, range, keys } => {
                let band = band_width(range, keys.len());
                range[0] + nearest_band(sorted, value) as f64 * band
            }
        }
    }

    pub fn invert(&self, coord: f64) -> f64 {
        match self {
            Scale::Linear {
                domain,
                range,
                clamp,
            } => {
                let t = normalize(coord, range[0], range[1], *clamp);
                lerp(domain[0], domain[1], t)
            }
            Scale::Logarithmic {
                domain,
                range,
                clamp,
            } => {
                let t = normalize(coord, range[0], range[1], *clamp);
                lerp(domain[0].ln(), domain[1].ln(), t).exp()
            }
            Scale::Ordinal { keys, range, .. } => {
                let band = band_width(range, keys.len());
                let idx = if band == 0.0 {
                    0.0
                } else {
                    ((coord - range[0]) / band).floor()
                };
                let idx = idx.clamp(0.0, (keys.len() - 1) as f64) as usize;
                keys[idx]
            }
        }
    }
}

fn normalize(v: f64, lo: f64, hi: f64, clamp: bool) -> f64 {
    let t = if hi == lo { 0.0 } else { (v - lo) / (hi - lo) };
    if clamp {
        t.clamp(0.0, 1.0)
    } else {
        t
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn band_width(range: &[f64; 2], n: usize) -> f64 {
    (range[1] - range[0]) / n as f64
}

fn nearest_band(sorted: &[(f64, usize)], value: f64) -> usize {
    let i = sorted.partition_point(|(k, _)| *k < value);
    match (i.checked_sub(1).map(|j| sorted[j]), sorted.get(i)) {
        (Some(lo), Some(hi)) => {
            if value - lo.0 <= hi.0 - value {
                lo.1
            } else {
                hi.1
            }
        }
        (Some(lo), None) => lo.1,
        (None, Some(hi)) => hi.1,
        (None, None) => 0,
    }
}

/// The x and y scales of one viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisScales {
    pub x: Scale,
    pub y: Scale,
}

impl AxisScales {
    pub fn new(x: Scale, y: Scale) -> Self {
        AxisScales { x, y }
    }

    /// Linear x over `domain -> range`, identity y.
    pub fn linear_x(domain: [f64; 2], range: [f64; 2]) -> Self {
        AxisScales {
            x: Scale::linear(domain, range),
            y: Scale::identity(),
        }
    }
}

impl ScaleMapping for AxisScales {
    fn x_value_to_coord(&self, x: f64) -> f64 {
        self.x.apply(x)
    }

    fn x_coord_to_value(&self, coord: f64) -> f64 {
        self.x.invert(coord)
    }

    fn y_value_to_coord(&self, y: f64) -> f64 {
        self.y.apply(y)
    }

    fn x_coord_extent(&self) -> [f64; 2] {
        self.x.range()
    }
}
