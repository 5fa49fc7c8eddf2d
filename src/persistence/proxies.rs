//! Proxy list file loading and optional hot reload.
//!
//! The file holds one endpoint per line (`http://…`, `socks4://…`,
//! `socks5://…`). Blank lines and `#` comments are ignored. Lines are not
//! validated here; a malformed endpoint fails the one session it is
//! assigned to.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, info_span, warn};

use crate::models::ProxyEndpoint;
use crate::orchestrator::proxy_allocator::ProxyAllocator;
use crate::{AppError, Result};

/// Parse the contents of a proxies file.
#[must_use]
pub fn parse_proxy_list(raw: &str) -> Vec<ProxyEndpoint> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ProxyEndpoint::new)
        .collect()
}

/// Read the proxies file. A missing file is an empty list.
///
/// # Errors
///
/// Returns `AppError::Io` if the file exists but cannot be read.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyEndpoint>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(parse_proxy_list(&raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no proxies file; all sessions connect directly");
            Ok(Vec::new())
        }
        Err(err) => Err(AppError::Io(format!(
            "failed to read {}: {err}",
            path.display()
        ))),
    }
}

/// Keeps a filesystem watcher alive that reloads the proxy list into an
/// allocator whenever the proxies file changes.
pub struct ProxyWatcher {
    _watcher: RecommendedWatcher,
}

impl ProxyWatcher {
    /// Start watching `path`.
    ///
    /// The parent directory is watched (editors often replace files rather
    /// than modify them in place) and events are filtered by file name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the watcher cannot be created.
    pub fn spawn(path: PathBuf, allocator: Arc<ProxyAllocator>) -> Result<Self> {
        let _span = info_span!("proxy_watcher", path = %path.display()).entered();

        let file_name = path
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| AppError::Config(format!("invalid proxies path {}", path.display())))?;
        let watch_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
            _ => PathBuf::from("."),
        };

        let reload_path = path.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|name| name == file_name));
                    if !relevant {
                        return;
                    }
                    match load_proxies(&reload_path) {
                        Ok(proxies) => {
                            let count = allocator.reload(proxies);
                            info!(count, "hot-reloaded proxy list");
                        }
                        Err(err) => warn!(%err, "failed to reload proxy list; keeping previous"),
                    }
                }
                Err(err) => warn!(%err, "proxy file watcher error"),
            },
        )
        .map_err(|err| AppError::Config(format!("failed to create watcher: {err}")))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|err| AppError::Config(format!("failed to watch directory: {err}")))?;

        info!("watching proxies file for changes");
        Ok(Self { _watcher: watcher })
    }
}
