use std::collections::BTreeMap;
use std::sync::Arc;

use crate::decimator::{BoundDecimator, Decimator};
use crate::error::{Error, Result};
use crate::flame::{FlameChartMergeRectDecimator, FlameChartRectLimitDecimator};
use crate::lttb::LttbDecimator;
use crate::news::{NewsPointDecimator, NewsStateDecimator};
use crate::point::{AvgPointDecimator, MaxPointDecimator, MinPointDecimator, XYPointDecimator};
use crate::scale::ScaleMapping;
use crate::series::{
    HeatMapDecimator, ResidencyDecimator, SummedValueMultiXYSeriesDecimator,
    SummedValueXYSeriesDecimator,
};
use crate::trace::{SimpleMarkerDecimator, TraceResidencyDecimator, TraceStateDecimator};

/// Strategies by key.
///
/// Owned by whoever builds it. Strategies are stateless, so handing out
/// `Arc` clones to any number of bound decimators is safe.
#[derive(Default, Clone)]
pub struct DecimatorRegistry {
    strategies: BTreeMap<&'static str, Arc<dyn Decimator>>,
}

impl DecimatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in strategy.
    pub fn with_builtins() -> Self {
        let builtins: [Arc<dyn Decimator>; 16] = [
            Arc::new(MinPointDecimator),
            Arc::new(MaxPointDecimator),
            Arc::new(AvgPointDecimator),
            Arc::new(XYPointDecimator),
            Arc::new(NewsPointDecimator),
            Arc::new(NewsStateDecimator),
            Arc::new(SummedValueXYSeriesDecimator),
            Arc::new(SummedValueMultiXYSeriesDecimator),
            Arc::new(ResidencyDecimator),
            Arc::new(HeatMapDecimator),
            Arc::new(FlameChartRectLimitDecimator),
            Arc::new(FlameChartMergeRectDecimator),
            Arc::new(TraceResidencyDecimator),
            Arc::new(TraceStateDecimator),
            Arc::new(SimpleMarkerDecimator),
            Arc::new(LttbDecimator),
        ];

        let mut registry = Self::new();
        for strategy in builtins {
            registry.strategies.insert(strategy.key(), strategy);
        }
        registry
    }

    /// Adds a strategy under its own key. A key can only be registered once.
    pub fn register(&mut self, strategy: Arc<dyn Decimator>) -> Result<()> {
        let key = strategy.key();
        if self.strategies.contains_key(key) {
            return Err(Error::DuplicateDecimator(key.to_string()));
        }
        log::debug!("registered decimator {} ({})", key, strategy.name());
        self.strategies.insert(key, strategy);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn Decimator>> {
        self.strategies
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownDecimator(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Decimator>> + '_ {
        self.strategies.values()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Looks up `key` and binds it to a viewport.
    pub fn initialize(
        &self,
        key: &str,
        scales: Arc<dyn ScaleMapping>,
        states: Option<Vec<String>>,
    ) -> Result<BoundDecimator> {
        Ok(BoundDecimator::initialize(self.get(key)?, scales, states))
    }
}
