//! Shared server state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clawsec_engine::SecurityEngine;

/// Bind address and request-handling knobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum in-flight requests across all connections.
    pub max_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_concurrency: 64,
        }
    }
}

pub struct AppState {
    pub engine: Arc<SecurityEngine>,
    pub config: ServerConfig,
    requests_served: AtomicU64,
    requests_blocked: AtomicU64,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<SecurityEngine>, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            requests_served: AtomicU64::new(0),
            requests_blocked: AtomicU64::new(0),
        }
    }

    pub fn count_request(&self, allowed: bool) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        if !allowed {
            self.requests_blocked.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn requests_blocked(&self) -> u64 {
        self.requests_blocked.load(Ordering::Relaxed)
    }
}
