//! Well-known shared locations for the configurator.
//!
//! # Responsibilities
//! - Let independent copies of the bridge find one shared configurator
//! - Report when publishing into the shared location is not permitted

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::ScopeError;
use crate::install::configurator::Configurator;

static PROCESS_SCOPE: OnceLock<Arc<ProcessScope>> = OnceLock::new();

/// A location reachable by every copy of the bridge that should cooperate.
pub trait SharedScope: Send + Sync {
    /// The configurator published under `key`, if any.
    fn probe(&self, key: &str) -> Option<Arc<dyn Configurator>>;

    /// Publish `configurator` under `key`. If another one is already there it
    /// is returned instead and `configurator` is discarded.
    fn publish(
        &self,
        key: &str,
        configurator: Arc<dyn Configurator>,
    ) -> Result<Arc<dyn Configurator>, ScopeError>;
}

/// In-process shared scope.
#[derive(Default)]
pub struct ProcessScope {
    slots: DashMap<String, Arc<dyn Configurator>>,
}

impl ProcessScope {
    /// A private scope, shared only by bridges handed this instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide scope.
    pub fn global() -> Arc<ProcessScope> {
        PROCESS_SCOPE.get_or_init(|| Arc::new(ProcessScope::new())).clone()
    }
}

impl SharedScope for ProcessScope {
    fn probe(&self, key: &str) -> Option<Arc<dyn Configurator>> {
        self.slots.get(key).map(|c| Arc::clone(c.value()))
    }

    fn publish(
        &self,
        key: &str,
        configurator: Arc<dyn Configurator>,
    ) -> Result<Arc<dyn Configurator>, ScopeError> {
        let slot = self.slots.entry(key.to_string()).or_insert(configurator);
        Ok(Arc::clone(slot.value()))
    }
}

/// A scope that can be probed but not published to, e.g. when the host
/// forbids this copy from registering process-wide components.
pub struct ReadOnlyScope {
    inner: Option<Arc<dyn SharedScope>>,
}

impl ReadOnlyScope {
    /// Sees nothing and accepts nothing.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Sees what `inner` holds but cannot add to it.
    pub fn over(inner: Arc<dyn SharedScope>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl SharedScope for ReadOnlyScope {
    fn probe(&self, key: &str) -> Option<Arc<dyn Configurator>> {
        self.inner.as_ref().and_then(|s| s.probe(key))
    }

    fn publish(
        &self,
        key: &str,
        _configurator: Arc<dyn Configurator>,
    ) -> Result<Arc<dyn Configurator>, ScopeError> {
        Err(ScopeError::AccessDenied(format!("scope is read-only, cannot publish {key}")))
    }
}
