use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chanmirror_config::config::Config;
use chanmirror_core::{error::MirrorError, resolver::Resolver, validate::Validator, MirrorResult};
use chanmirror_dl::transport::Transport;
use chanmirror_events::EventSinkHandle;

/// Shared state of one run.
///
/// Cheap to clone; worker tasks each hold their own copy.
#[derive(Clone)]
pub struct MirrorContext {
    config: Arc<Config>,
    events: EventSinkHandle,
    transport: Arc<dyn Transport>,
    resolver: Option<Arc<dyn Resolver>>,
    repo_root: PathBuf,
}

impl MirrorContext {
    pub fn new(
        config: Config,
        events: EventSinkHandle,
        transport: Arc<dyn Transport>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            events,
            transport,
            resolver: None,
            repo_root: repo_root.into(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn resolver(&self) -> MirrorResult<&Arc<dyn Resolver>> {
        self.resolver
            .as_ref()
            .ok_or_else(|| MirrorError::Custom("No resolver configured for this run".into()))
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.config.validate_sha256())
    }
}
