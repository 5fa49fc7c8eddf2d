//! Deterministic round-robin proxy assignment.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::models::ProxyEndpoint;

/// Maps a session index to a proxy endpoint.
///
/// `assign(i)` is `proxies[i % len]`, or `None` (direct) when the list is
/// empty. The list is replaced wholesale by [`reload`](Self::reload); an
/// endpoint already handed out is unaffected.
#[derive(Debug, Default)]
pub struct ProxyAllocator {
    proxies: RwLock<Arc<Vec<ProxyEndpoint>>>,
}

impl ProxyAllocator {
    /// Create an allocator over `proxies`.
    #[must_use]
    pub fn new(proxies: Vec<ProxyEndpoint>) -> Self {
        Self {
            proxies: RwLock::new(Arc::new(proxies)),
        }
    }

    fn current(&self) -> Arc<Vec<ProxyEndpoint>> {
        match self.proxies.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Endpoint for session index `index`, `None` for a direct connection.
    #[must_use]
    pub fn assign(&self, index: usize) -> Option<ProxyEndpoint> {
        let proxies = self.current();
        if proxies.is_empty() {
            None
        } else {
            Some(proxies[index % proxies.len()].clone())
        }
    }

    /// Atomically replace the proxy list. Returns the new length.
    pub fn reload(&self, proxies: Vec<ProxyEndpoint>) -> usize {
        let len = proxies.len();
        let next = Arc::new(proxies);
        match self.proxies.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(count = len, "proxy list replaced");
        len
    }

    /// Number of loaded endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Whether every session connects directly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }
}
