// Application state module
// Shared runtime state handed to every connection

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use super::types::{Config, HttpConfig};

/// Application state
pub struct AppState {
    pub config: Config,
    /// HTTP settings shared with every exchange
    pub http: Arc<HttpConfig>,
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            http: Arc::new(config.http.clone()),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.config.performance.response_timeout)
    }

    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.config.performance.connection_timeout)
    }
}
