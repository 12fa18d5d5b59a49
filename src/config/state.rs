// Application state module
// Shared, read-only state handed to every connection

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::Notify;

use super::types::Config;
use crate::assets::StaticAssetStore;
use crate::dispatch::{Dispatcher, InferenceError};
use crate::inference::HttpInferenceClient;

/// Application state
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
    /// Open connections, for admission control and shutdown draining
    pub active_connections: Arc<AtomicUsize>,
    /// Notified by the signal handler when the server should stop
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Wire the filesystem asset store and the HTTP inference client from config
    pub fn from_config(config: Config) -> Result<Self, InferenceError> {
        let assets = StaticAssetStore::new(&config.assets, config.http.enable_cors);
        let inference = HttpInferenceClient::new(&config.inference)?;
        let dispatcher = Dispatcher::new(
            Arc::new(assets),
            Arc::new(inference),
            config.inference.model.as_str(),
        );
        Ok(Self::new(config, dispatcher))
    }
}
