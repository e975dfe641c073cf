use std::sync::Arc;
use multiplexer_core::{BatchDispatcher, Config};

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: Arc<BatchDispatcher>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Arc<BatchDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &BatchDispatcher {
        &self.dispatcher
    }
}
