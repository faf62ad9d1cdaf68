//! Filter registry: lookup by kind and per-render instantiation.

use std::collections::HashMap;

use tracing::info;
use vl_common::{FilterCategory, FilterDescriptor, FilterKind};

use crate::blur::GaussianBlur;
use crate::color::{BrightnessContrast, Exposure, HslAdjust, Invert, Monochrome, Opacity};
use crate::error::EffectError;
use crate::params::{resolve_params, ResolvedParams};
use crate::stylize::{EdgeDetect, Sharpen};
use crate::traits::{Filter, FilterFactory};

/// Registry holding one factory per filter kind.
pub struct FilterRegistry {
    factories: HashMap<FilterKind, Box<dyn FilterFactory>>,
}

impl FilterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with all built-in filters registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // Color
        registry.register(Box::new(BrightnessContrast::new()));
        registry.register(Box::new(Exposure::new()));
        registry.register(Box::new(HslAdjust::new()));
        registry.register(Box::new(Invert::new()));
        registry.register(Box::new(Monochrome::new()));
        registry.register(Box::new(Opacity::new()));

        // Blur
        registry.register(Box::new(GaussianBlur::new()));

        // Stylize
        registry.register(Box::new(Sharpen::new()));
        registry.register(Box::new(EdgeDetect::new()));

        info!(
            count = registry.factories.len(),
            "Registered built-in filters"
        );

        registry
    }

    /// Register a factory. Overwrites any previous factory for the same kind.
    pub fn register(&mut self, factory: Box<dyn FilterFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    /// Register a factory, failing if its kind is already present.
    pub fn try_register(&mut self, factory: Box<dyn FilterFactory>) -> Result<(), EffectError> {
        let kind = factory.kind();
        if self.factories.contains_key(&kind) {
            return Err(EffectError::AlreadyRegistered { kind });
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    pub fn get(&self, kind: FilterKind) -> Option<&dyn FilterFactory> {
        self.factories.get(&kind).map(|f| f.as_ref())
    }

    /// Clamped parameters for a descriptor, without building a filter.
    pub fn resolve(&self, descriptor: &FilterDescriptor) -> Result<ResolvedParams, EffectError> {
        let factory = self.get(descriptor.kind).ok_or(EffectError::NotFound {
            kind: descriptor.kind,
        })?;
        Ok(resolve_params(factory.name(), factory.param_defs(), &descriptor.params))
    }

    /// Build a brand-new filter instance for one render.
    ///
    /// Parameters are clamped to the factory's ranges before construction.
    pub fn instantiate(&self, descriptor: &FilterDescriptor) -> Result<Box<dyn Filter>, EffectError> {
        let factory = self.get(descriptor.kind).ok_or(EffectError::NotFound {
            kind: descriptor.kind,
        })?;
        let params = resolve_params(factory.name(), factory.param_defs(), &descriptor.params);
        Ok(factory.instantiate(&params))
    }

    /// List all registered factories, sorted by name.
    pub fn list(&self) -> Vec<&dyn FilterFactory> {
        let mut factories: Vec<_> = self.factories.values().map(|f| f.as_ref()).collect();
        factories.sort_by_key(|f| f.name());
        factories
    }

    /// List factories filtered by category, sorted by name.
    pub fn list_by_category(&self, category: FilterCategory) -> Vec<&dyn FilterFactory> {
        let mut factories: Vec<_> = self
            .factories
            .values()
            .filter(|f| f.category() == category)
            .map(|f| f.as_ref())
            .collect();
        factories.sort_by_key(|f| f.name());
        factories
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry() {
        let reg = FilterRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.get(FilterKind::Invert).is_none());
        assert!(reg.list().is_empty());
    }

    #[test]
    fn with_builtins_has_every_kind() {
        let reg = FilterRegistry::with_builtins();
        assert_eq!(reg.len(), FilterKind::ALL.len());
        for kind in FilterKind::ALL {
            let factory = reg.get(kind).unwrap();
            assert_eq!(factory.kind(), kind);
            assert_eq!(factory.name(), kind.name());
        }
    }

    #[test]
    fn list_sorted_by_name() {
        let reg = FilterRegistry::with_builtins();
        let list = reg.list();
        for window in list.windows(2) {
            assert!(window[0].name() <= window[1].name());
        }
    }

    #[test]
    fn category_counts() {
        let reg = FilterRegistry::with_builtins();
        assert_eq!(reg.list_by_category(FilterCategory::Color).len(), 6);
        assert_eq!(reg.list_by_category(FilterCategory::Blur).len(), 1);
        assert_eq!(reg.list_by_category(FilterCategory::Stylize).len(), 2);
    }

    #[test]
    fn try_register_duplicate_fails() {
        let mut reg = FilterRegistry::new();
        reg.register(Box::new(Invert::new()));
        let err = reg.try_register(Box::new(Invert::new())).unwrap_err();
        assert!(matches!(err, EffectError::AlreadyRegistered { .. }));
    }

    #[test]
    fn instantiate_unregistered_kind_fails() {
        let reg = FilterRegistry::new();
        let err = reg
            .instantiate(&FilterDescriptor::new(FilterKind::Sharpen))
            .err()
            .unwrap();
        assert!(matches!(err, EffectError::NotFound { .. }));
    }

    #[test]
    fn instantiate_builds_requested_kind() {
        let reg = FilterRegistry::with_builtins();
        let filter = reg
            .instantiate(&FilterDescriptor::new(FilterKind::Monochrome).with_float("amount", 9.0))
            .unwrap();
        assert_eq!(filter.kind(), FilterKind::Monochrome);
    }
}
