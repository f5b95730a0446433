//! Thread-safe provider lookup table.

use std::sync::Arc;

use dashmap::DashMap;

use super::{HttpProvider, MockProvider, ProviderDescriptor, StatusProvider, http, mock};
use crate::error::ProviderError;

/// Maps provider identifiers to implementations.
///
/// Lookups never block each other; registration and removal lock only the
/// affected shard. The registry is created explicitly and shared through
/// `Arc` by the orchestrator, the health checker and the service facade.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn StatusProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `mock` and `http` providers.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(mock::ID, Arc::new(MockProvider::new()));
        registry.register(http::ID, Arc::new(HttpProvider::new()));
        registry
    }

    /// Binds `provider` to `id`, replacing and returning any previous binding.
    pub fn register(
        &self,
        id: impl Into<String>,
        provider: Arc<dyn StatusProvider>,
    ) -> Option<Arc<dyn StatusProvider>> {
        let id = id.into();
        tracing::info!(provider_id = %id, "provider registered");
        self.providers.insert(id, provider)
    }

    /// Removes the binding for `id`, if any.
    pub fn unregister(&self, id: &str) -> Option<Arc<dyn StatusProvider>> {
        let removed = self.providers.remove(id).map(|(_, provider)| provider);
        if removed.is_some() {
            tracing::info!(provider_id = %id, "provider unregistered");
        }
        removed
    }

    /// Looks up the provider bound to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if nothing is bound to `id`.
    pub fn get(&self, id: &str) -> Result<Arc<dyn StatusProvider>, ProviderError> {
        self.providers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    /// Lists every binding, sorted by identifier.
    ///
    /// The listed identifier is the registration key, which may differ from
    /// the provider's own [`StatusProvider::describe`] id.
    #[must_use]
    pub fn list(&self) -> Vec<ProviderDescriptor> {
        let mut descriptors: Vec<ProviderDescriptor> = self
            .providers
            .iter()
            .map(|entry| ProviderDescriptor {
                id: entry.key().clone(),
                description: entry.value().describe().description,
            })
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
