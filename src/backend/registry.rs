//! Named backend factories.
//!
//! Applications register one factory per backend kind and create configured
//! instances by id, passing backend-specific options as a TOML table.

use crate::backend::SpeechBackend;
use crate::config::Config;
use crate::error::{Result, ScriptvoxError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a factory gets to see when it builds a backend.
#[derive(Debug, Clone)]
pub struct BackendContext {
    pub id: String,
    pub config: Arc<Config>,
}

/// Builds backends of one kind.
pub trait BackendFactory: Send + Sync {
    fn id(&self) -> &str;

    fn create(&self, ctx: &BackendContext, options: &toml::Value)
    -> Result<Arc<dyn SpeechBackend>>;
}

/// Registry of backend factories keyed by id.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory`, replacing any previous factory with the same id.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) -> String {
        let id = factory.id().to_string();
        tracing::debug!(backend = %id, "Registered backend");
        self.factories.insert(id.clone(), factory);
        id
    }

    pub fn has(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn create(
        &self,
        id: &str,
        config: Arc<Config>,
        options: &toml::Value,
    ) -> Result<Arc<dyn SpeechBackend>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ScriptvoxError::BackendNotRegistered { id: id.to_string() })?;
        tracing::info!(backend = id, "Creating backend instance");
        let ctx = BackendContext {
            id: factory.id().to_string(),
            config,
        };
        factory.create(&ctx, options)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("factories", &self.list())
            .finish()
    }
}
