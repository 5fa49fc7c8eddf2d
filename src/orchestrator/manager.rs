//! Control-plane facade over registry, allocator, flags and scheduler.
//!
//! Every operator surface (console, IPC) goes through [`Orchestrator`]; it
//! returns structured reports and never formats text for display.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

use crate::client::Connector;
use crate::config::GlobalConfig;
use crate::models::{ServerAddress, SessionSummary};
use crate::orchestrator::auth_sequencer::AuthSequencer;
use crate::orchestrator::flags::{ActionFlag, ActionFlags, FlagSnapshot};
use crate::orchestrator::lifecycle::ReconnectPolicy;
use crate::orchestrator::proxy_allocator::ProxyAllocator;
use crate::orchestrator::registry::{InsertOutcome, SessionRegistry};
use crate::orchestrator::scheduler::ActionScheduler;
use crate::orchestrator::session::{Session, SessionContext};
use crate::persistence::proxies::load_proxies;
use crate::persistence::{AccountStore, Journal};
use crate::status::{query_status, RemoteStatus};
use crate::{AppError, Result};

/// Which sessions a stop applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopTarget {
    /// Every registered session.
    All,
    /// One identity.
    Identity(String),
}

impl FromStr for StopTarget {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "" => Err(AppError::InvalidCommand("stop needs an identity or 'all'".into())),
            "all" => Ok(Self::All),
            identity => Ok(Self::Identity(identity.to_owned())),
        }
    }
}

/// Outcome of [`Orchestrator::start`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StartReport {
    /// Sessions requested by the operator.
    pub requested: usize,
    /// Sessions attempted after clamping to the account list.
    pub attempted: usize,
    /// Identities newly registered.
    pub started: Vec<String>,
    /// Identities already running.
    pub skipped: Vec<String>,
    /// Identities whose handle could not be built, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Outcome of [`Orchestrator::stop`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StopReport {
    /// Identities removed.
    pub stopped: Vec<String>,
}

/// Outcome of [`Orchestrator::broadcast_chat`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that accepted the message.
    pub delivered: usize,
    /// Sessions that could not send it.
    pub failed: usize,
}

/// Outcome of [`Orchestrator::status_snapshot`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    /// Loaded accounts.
    pub accounts: usize,
    /// Loaded proxy endpoints.
    pub proxies: usize,
    /// Registered sessions.
    pub running: usize,
    /// Registered sessions that are currently interactive.
    pub interactive: usize,
    /// Current action flags.
    pub flags: FlagSnapshot,
    /// One row per registered session, ordered by identity.
    pub sessions: Vec<SessionSummary>,
}

/// The orchestrator facade.
pub struct Orchestrator {
    config: Arc<GlobalConfig>,
    accounts: AccountStore,
    allocator: Arc<ProxyAllocator>,
    registry: Arc<SessionRegistry>,
    flags: Arc<ActionFlags>,
    context: Arc<SessionContext>,
}

impl Orchestrator {
    /// Wire up an orchestrator.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        accounts: AccountStore,
        allocator: Arc<ProxyAllocator>,
        connector: Arc<dyn Connector>,
        journal: Arc<dyn Journal>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let context = Arc::new(SessionContext {
            registry: Arc::clone(&registry),
            connector,
            journal,
            policy: ReconnectPolicy::from(&config.reconnect),
            max_attempts: config.reconnect.max_attempts,
            auth: AuthSequencer::from_config(&config.auth),
            tracker: TaskTracker::new(),
        });
        Self {
            config,
            accounts,
            allocator,
            registry,
            flags: Arc::new(ActionFlags::new()),
            context,
        }
    }

    /// Start up to `count` sessions against `server`, one per account in
    /// file order. Account index `i` uses proxy `assign(i)`. Identities
    /// already running are skipped; construction failures are reported
    /// and do not stop the rest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidCommand` if `count` is zero, or
    /// `AppError::Config` if no accounts are loaded.
    pub async fn start(&self, server: ServerAddress, count: usize) -> Result<StartReport> {
        let span = info_span!("start", %server, count);
        self.start_sessions(server, count).instrument(span).await
    }

    async fn start_sessions(&self, server: ServerAddress, count: usize) -> Result<StartReport> {
        if count == 0 {
            return Err(AppError::InvalidCommand("count must be at least 1".into()));
        }
        if self.accounts.is_empty() {
            return Err(AppError::Config(format!(
                "no accounts loaded from {}",
                self.accounts.path().display()
            )));
        }

        let attempted = count.min(self.accounts.len());
        if attempted < count {
            warn!(
                requested = count,
                available = self.accounts.len(),
                "not enough accounts; starting fewer sessions"
            );
        }

        let mut report = StartReport {
            requested: count,
            attempted,
            ..StartReport::default()
        };

        for (index, account) in self.accounts.accounts().iter().take(attempted).enumerate() {
            let identity = account.identity.clone();
            let proxy = self.allocator.assign(index);
            let proxy_label = proxy
                .as_ref()
                .map_or_else(|| "direct".to_owned(), ToString::to_string);

            let outcome = self
                .registry
                .insert_with(&identity, || {
                    Session::create(
                        account.clone(),
                        proxy.clone(),
                        server.clone(),
                        self.context.connector.as_ref(),
                    )
                })
                .await;

            match outcome {
                Ok(InsertOutcome::Inserted(session, driver)) => {
                    self.record(&identity, &format!("spawning session (proxy={proxy_label})"));
                    driver.spawn(session, Arc::clone(&self.context));
                    report.started.push(identity);
                }
                Ok(InsertOutcome::AlreadyPresent) => {
                    report.skipped.push(identity);
                }
                Err(err) => {
                    warn!(identity, %err, "session construction failed");
                    self.record(&identity, &format!("construction failed: {err}"));
                    report.failed.push((identity, err.to_string()));
                }
            }
        }

        info!(
            started = report.started.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "start complete"
        );
        Ok(report)
    }

    /// Stop one identity or every session. A stopped session never
    /// reconnects.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if a named identity is not running.
    pub async fn stop(&self, target: StopTarget) -> Result<StopReport> {
        match target {
            StopTarget::All => {
                let stopped = self.registry.remove_all("stopped by operator").await;
                for identity in &stopped {
                    self.record(identity, "stopped by operator");
                }
                Ok(StopReport { stopped })
            }
            StopTarget::Identity(identity) => {
                if self.registry.remove(&identity, "stopped by operator").await {
                    self.record(&identity, "stopped by operator");
                    Ok(StopReport {
                        stopped: vec![identity],
                    })
                } else {
                    Err(AppError::NotFound(format!("{identity} is not running")))
                }
            }
        }
    }

    /// Send `text` from every registered session.
    pub async fn broadcast_chat(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for session in self.registry.snapshot().await {
            match session.commands().chat(text) {
                Ok(()) => {
                    report.delivered += 1;
                    self.record(session.identity(), &format!("SENT_CHAT: {text}"));
                }
                Err(err) => {
                    report.failed += 1;
                    self.record(session.identity(), &format!("CHAT_ERR: {err}"));
                }
            }
        }
        if let Err(err) = self.context.journal.transcript(&format!("[BROADCAST] {text}")) {
            warn!(%err, "failed to write chat transcript");
        }
        info!(delivered = report.delivered, failed = report.failed, "broadcast sent");
        report
    }

    /// Send `text` from one session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if `identity` is not running, or
    /// `AppError::Dispatch` if its handle cannot send right now.
    pub async fn send_chat(&self, identity: &str, text: &str) -> Result<()> {
        let session = self
            .registry
            .get(identity)
            .await
            .ok_or_else(|| AppError::NotFound(format!("{identity} is not running")))?;
        if let Err(err) = session.commands().chat(text) {
            self.record(identity, &format!("CHAT_ERR: {err}"));
            return Err(err);
        }
        self.record(identity, &format!("SENT_CHAT: {text}"));
        if let Err(err) = self
            .context
            .journal
            .transcript(&format!("[{identity}] {text}"))
        {
            warn!(%err, "failed to write chat transcript");
        }
        Ok(())
    }

    /// Turn an action on or off. Returns the previous value.
    pub fn set_flag(&self, flag: ActionFlag, on: bool) -> bool {
        let previous = self.flags.set(flag, on);
        info!(flag = %flag, on, "action flag set");
        previous
    }

    /// Current action flags.
    #[must_use]
    pub fn flags(&self) -> FlagSnapshot {
        self.flags.snapshot()
    }

    /// Point-in-time status of every registered session.
    pub async fn status_snapshot(&self) -> StatusReport {
        let sessions: Vec<SessionSummary> = self
            .registry
            .snapshot()
            .await
            .iter()
            .map(|s| s.summary())
            .collect();
        StatusReport {
            accounts: self.accounts.len(),
            proxies: self.allocator.len(),
            running: sessions.len(),
            interactive: sessions.iter().filter(|s| s.state.is_interactive()).count(),
            flags: self.flags.snapshot(),
            sessions,
        }
    }

    /// Query a server's public status with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Status` on any query failure.
    pub async fn query_remote_status(&self, host: &str, port: u16) -> Result<RemoteStatus> {
        query_status(host, port, self.config.status_timeout()).await
    }

    /// Re-read the proxies file. Running sessions keep their endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be read; the
    /// previous list stays in effect.
    pub fn reload_proxies(&self) -> Result<usize> {
        let proxies = load_proxies(&self.config.proxies_path)?;
        Ok(self.allocator.reload(proxies))
    }

    /// Tail of an identity's log.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no log exists for `identity`.
    pub fn logs(&self, identity: &str, lines: usize) -> Result<Vec<String>> {
        self.context.journal.tail(identity, lines)
    }

    /// Start the action scheduler; it runs until `cancel` fires.
    #[must_use]
    pub fn spawn_scheduler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.scheduler().spawn(cancel)
    }

    /// A scheduler over this orchestrator's sessions and flags.
    #[must_use]
    pub fn scheduler(&self) -> ActionScheduler {
        ActionScheduler::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.flags),
            Arc::clone(&self.context.journal),
            self.config.actions.clone(),
            self.context.tracker.clone(),
        )
    }

    /// Default server from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configured address is malformed.
    pub fn default_server(&self) -> Result<ServerAddress> {
        self.config
            .default_server
            .parse()
            .map_err(|e| AppError::Config(format!("default_server: {e}")))
    }

    /// Number of loaded accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Proxy allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<ProxyAllocator> {
        &self.allocator
    }

    /// Stop every session and wait (bounded) for background tasks.
    pub async fn shutdown(&self, grace: Duration) {
        let stopped = self.registry.remove_all("shutting down").await;
        for identity in &stopped {
            self.record(identity, "stopped: shutting down");
        }
        let tracker = &self.context.tracker;
        tracker.close();
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                pending = tracker.len(),
                "background tasks still running after shutdown grace period"
            );
        }
        info!(stopped = stopped.len(), "orchestrator shut down");
    }

    fn record(&self, identity: &str, text: &str) {
        if let Err(err) = self.context.journal.record(identity, text) {
            warn!(identity, %err, "failed to write session log");
        }
    }
}
