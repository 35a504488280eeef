mod bucket;
mod buffer;
mod decimator;
mod error;
mod flame;
mod host;
mod lttb;
mod news;
mod point;
mod registry;
mod scale;
mod series;
mod trace;
mod value;

pub use bucket::*;
pub use buffer::*;
pub use decimator::*;
pub use error::{Error, Result};
pub use flame::*;
pub use host::*;
pub use lttb::*;
pub use news::*;
pub use point::*;
pub use registry::*;
pub use scale::*;
pub use series::*;
pub use trace::*;
pub use value::*;
