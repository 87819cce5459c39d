use std::sync::Arc;

use keel_config::{config::Config, environment::Environment};
use keel_events::EventSinkHandle;
use keel_registry::SystemRepository;
use tracing::trace;

use crate::error::Result;

/// Shared state for operations: configuration, runtime environment and the
/// sink progress events are sent to.
#[derive(Clone)]
pub struct KeelContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: Config,
    env: Environment,
    events: EventSinkHandle,
}

impl KeelContext {
    pub fn new(config: Config, events: EventSinkHandle) -> Self {
        trace!("creating new KeelContext");
        let env = Environment::from_config(&config);
        Self {
            inner: Arc::new(ContextInner {
                config,
                env,
                events,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn env(&self) -> &Environment {
        &self.inner.env
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.inner.events
    }

    /// Descriptors of every enabled repository, in configuration order.
    pub fn configured_repositories(&self) -> Result<Vec<SystemRepository>> {
        Ok(self
            .inner
            .config
            .enabled_repositories()
            .map(SystemRepository::from_config)
            .collect::<keel_registry::Result<_>>()?)
    }
}
