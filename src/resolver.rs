//! Frozen dependency resolver for handler argument injection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("no dependency registered for type {0}")]
pub struct ArgumentResolutionFailed(pub &'static str);

/// Frozen map from declared dependency type to a shared instance, resolved
/// by type rather than by name. Built once at startup and shared by every
/// `MessageExecutor`.
#[derive(Clone, Default)]
pub struct DependencyResolver {
    entries: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl DependencyResolver {
    pub fn builder() -> DependencyResolverBuilder {
        DependencyResolverBuilder::default()
    }

    /// Resolve a dependency by its declared type. Handlers call this inside
    /// their registration wrapper; a miss raises `ArgumentResolutionFailed`
    /// before the handler body runs.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ArgumentResolutionFailed> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
            .ok_or_else(|| ArgumentResolutionFailed(std::any::type_name::<T>()))
    }
}

#[derive(Default)]
pub struct DependencyResolverBuilder {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl DependencyResolverBuilder {
    pub fn provide<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.entries.insert(TypeId::of::<T>(), value as Arc<dyn Any + Send + Sync>);
        self
    }

    pub fn build(self) -> DependencyResolver {
        DependencyResolver {
            entries: Arc::new(self.entries),
        }
    }
}
