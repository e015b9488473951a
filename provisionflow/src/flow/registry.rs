//! Memoized lifecycle flows, one per resource kind.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ChildInvocation, Flow, LifecycleFlow};
use crate::errors::FlowError;
use crate::resources::{ResourceCatalog, ResourceKind};

/// Builds each kind's [`LifecycleFlow`] from the catalog once and hands out
/// shared references afterwards.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    catalog: ResourceCatalog,
    lifecycles: RwLock<HashMap<ResourceKind, Arc<LifecycleFlow>>>,
}

impl FlowRegistry {
    /// Creates a registry over `catalog`.
    #[must_use]
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self {
            catalog,
            lifecycles: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog lifecycles are built from.
    #[must_use]
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Returns the lifecycle flow for `kind`, building it on first use.
    pub fn lifecycle(&self, kind: ResourceKind) -> Result<Arc<LifecycleFlow>, FlowError> {
        if let Some(flow) = self.lifecycles.read().get(&kind) {
            return Ok(Arc::clone(flow));
        }
        let descriptor = self.catalog.get(kind)?.clone();
        let mut lifecycles = self.lifecycles.write();
        let flow = lifecycles
            .entry(kind)
            .or_insert_with(|| Arc::new(LifecycleFlow::new(descriptor)));
        Ok(Arc::clone(flow))
    }

    /// The parent-side invocation step for `kind`.
    pub fn invocation(&self, kind: ResourceKind) -> Result<Arc<dyn Flow>, FlowError> {
        Ok(Arc::new(ChildInvocation::lifecycle(self.lifecycle(kind)?)))
    }

    /// Number of lifecycles built so far.
    #[must_use]
    pub fn built(&self) -> usize {
        self.lifecycles.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_is_memoized() {
        let registry = FlowRegistry::new(ResourceCatalog::standard());

        let first = registry.lifecycle(ResourceKind::Campaign).unwrap();
        let second = registry.lifecycle(ResourceKind::Campaign).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.built(), 1);
        assert_eq!(first.name(), "CampaignLifecycle");
    }

    #[test]
    fn test_invocation_uses_step_name() {
        let registry = FlowRegistry::new(ResourceCatalog::standard());

        let step = registry.invocation(ResourceKind::DatasetImportJob).unwrap();

        assert_eq!(step.name(), "DatasetImportJobTask");
    }

    #[test]
    fn test_missing_kind_is_an_error() {
        let registry = FlowRegistry::new(ResourceCatalog::empty());

        let err = registry.lifecycle(ResourceKind::Filter).unwrap_err();

        assert!(err.to_string().contains("Filter"));
        assert_eq!(registry.built(), 0);
    }
}
