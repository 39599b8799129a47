//! Name-keyed strategy factories.
//!
//! The CLI only exposes `StrategyKind`; suite configs and tests resolve
//! strategies by name so extra implementations can be plugged in without
//! touching the built-in enum.

use std::collections::BTreeMap;
use std::fmt;

use super::{Strategy, StrategyKind, new_strategy, normalize_name};

/// Builds an unprepared strategy from a client seed.
pub type StrategyFactory = Box<dyn Fn(u64) -> Box<dyn Strategy> + Send + Sync>;

#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every `StrategyKind`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in StrategyKind::ALL {
            registry.register(kind.as_str(), move |seed| new_strategy(kind, seed));
        }
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(u64) -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        self.factories.insert(normalize_name(name), Box::new(factory));
    }

    pub fn create(&self, name: &str, seed: u64) -> Option<Box<dyn Strategy>> {
        self.factories.get(&normalize_name(name)).map(|f| f(seed))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    /// Registered names, normalized and sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}
