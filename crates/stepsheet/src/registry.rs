//! Registry of step performers.

use crate::step::StepPerformer;
use indexmap::IndexMap;
use std::sync::Arc;

/// Errors from building a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("step type already registered: {0}")]
    Duplicate(String),
}

/// Step performers indexed by step type.
///
/// Populated once before any pipeline uses it, then shared read-only.
#[derive(Clone, Default)]
pub struct Registry {
    performers: IndexMap<String, Arc<dyn StepPerformer>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a performer under its step type.
    ///
    /// Fails if another performer already claimed that step type.
    pub fn register(&mut self, performer: impl StepPerformer + 'static) -> Result<(), RegistryError> {
        let step_type = performer.step_type();
        if self.performers.contains_key(step_type) {
            return Err(RegistryError::Duplicate(step_type.to_string()));
        }
        tracing::debug!(step_type, version = performer.step_version(), "registered step");
        self.performers
            .insert(step_type.to_string(), Arc::new(performer));
        Ok(())
    }

    /// Get a performer by step type.
    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepPerformer>> {
        self.performers.get(step_type).cloned()
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.performers.contains_key(step_type)
    }

    /// Registered step types, in registration order.
    pub fn step_types(&self) -> impl Iterator<Item = &str> {
        self.performers.keys().map(String::as_str)
    }

    /// Iterate over all performers.
    pub fn performers(&self) -> impl Iterator<Item = &Arc<dyn StepPerformer>> {
        self.performers.values()
    }

    /// Number of registered performers.
    pub fn len(&self) -> usize {
        self.performers.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.performers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("step_types", &self.performers.keys().collect::<Vec<_>>())
            .finish()
    }
}
