use std::result;

use crate::decimator::InputKind;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unsupported scale kind: {0}")]
    UnsupportedScaleKind(String),

    #[error("invalid {axis} domain: {reason}")]
    InvalidDomain { axis: &'static str, reason: String },

    #[error("no decimator registered under key {0:?}")]
    UnknownDecimator(String),

    #[error("a decimator is already registered under key {0:?}")]
    DuplicateDecimator(String),

    #[error("decimator {decimator} expects {expected} input, got {actual}")]
    InputMismatch {
        decimator: &'static str,
        expected: InputKind,
        actual: InputKind,
    },

    #[error("value at index {index} carries state weights where a scalar was expected")]
    NonScalarValue { index: usize },

    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("decimator {0} requires an ordered list of state names")]
    MissingStates(&'static str),

    #[error("bucket {bucket} has no contributing samples")]
    DegenerateBucket { bucket: i64 },

    #[error("malformed request payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("decimation host is not running")]
    HostClosed,

    #[error("decimation aborted: {0}")]
    Aborted(String),
}
