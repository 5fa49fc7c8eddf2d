//! One managed session and the task that drives it.
//!
//! A [`Session`] owns the current protocol-client handle for one identity.
//! Its lifecycle state lives in a `watch` channel written only by the
//! session's event task ([`SessionDriver`]); everyone else reads it. The
//! task consumes the handle's events strictly in order, applies
//! [`lifecycle::decide`], and performs the resulting effects, including
//! delayed reconnection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{
    ClientEvent, ConnectRequest, Connector, Direction, GameClient, Position, VisibleEntity,
};
use crate::models::{Account, ProxyEndpoint, ServerAddress, SessionState, SessionSummary};
use crate::orchestrator::auth_sequencer::AuthSequencer;
use crate::orchestrator::lifecycle::{self, Effect, ReconnectPolicy};
use crate::orchestrator::registry::SessionRegistry;
use crate::persistence::Journal;
use crate::Result;

/// Shared dependencies of every session task.
pub struct SessionContext {
    /// Registry consulted before each reconnect.
    pub registry: Arc<SessionRegistry>,
    /// Builds protocol-client handles.
    pub connector: Arc<dyn Connector>,
    /// Log and transcript sink.
    pub journal: Arc<dyn Journal>,
    /// Reconnect timing.
    pub policy: ReconnectPolicy,
    /// Consecutive failed reconnects tolerated before giving up; `0` is unbounded.
    pub max_attempts: u32,
    /// Post-spawn login/register issuer.
    pub auth: AuthSequencer,
    /// Tracks every task spawned on behalf of sessions.
    pub tracker: TaskTracker,
}

impl SessionContext {
    fn note(&self, identity: &str, text: &str) {
        info!(identity, "{text}");
        if let Err(err) = self.journal.record(identity, text) {
            warn!(identity, %err, "failed to write session log");
        }
    }

    fn transcript(&self, line: &str) {
        if let Err(err) = self.journal.transcript(line) {
            warn!(%err, "failed to write chat transcript");
        }
    }
}

/// Gameplay command surface of a session's handle.
///
/// Holds the handle that was current when it was obtained, so a command
/// pair (press, then release) always reaches the same connection. It
/// cannot close the handle.
#[derive(Clone)]
pub struct SessionCommands {
    client: Arc<dyn GameClient>,
}

impl SessionCommands {
    /// Send a chat line or slash command.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the handle is not interactive.
    pub fn chat(&self, text: &str) -> Result<()> {
        self.client.send_chat(text)
    }

    /// Press or release a movement key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the handle is not interactive.
    pub fn set_movement(&self, direction: Direction, active: bool) -> Result<()> {
        self.client.set_movement(direction, active)
    }

    /// Toggle sprinting.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the handle is not interactive.
    pub fn set_sprint(&self, active: bool) -> Result<()> {
        self.client.set_sprint(active)
    }

    /// Attack `target`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the handle is not interactive or the
    /// target is gone.
    pub fn attack(&self, target: &VisibleEntity) -> Result<()> {
        self.client.attack(target)
    }

    /// Entities the handle can see.
    #[must_use]
    pub fn visible_entities(&self) -> Vec<VisibleEntity> {
        self.client.visible_entities()
    }

    /// Own position, `None` before spawn.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.client.position()
    }
}

/// A registered session.
pub struct Session {
    account: Account,
    proxy: Option<ProxyEndpoint>,
    server: ServerAddress,
    instance_id: Uuid,
    started_at: DateTime<Utc>,
    client: Mutex<Arc<dyn GameClient>>,
    state: watch::Receiver<SessionState>,
    attempts: AtomicU32,
    cancel: CancellationToken,
}

/// Write side of a freshly created session, consumed by [`spawn`](Self::spawn).
pub struct SessionDriver {
    events: mpsc::Receiver<ClientEvent>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Build the first handle for `account`.
    ///
    /// Nothing is registered or spawned here: the caller inserts the
    /// session into the registry and then starts its [`SessionDriver`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Construction` if the proxy endpoint is malformed
    /// or the connector refuses the request.
    pub fn create(
        account: Account,
        proxy: Option<ProxyEndpoint>,
        server: ServerAddress,
        connector: &dyn Connector,
    ) -> Result<(Arc<Self>, SessionDriver)> {
        let request = connect_request(&account, proxy.as_ref(), &server)?;
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let connection = connector.connect(request)?;
        state_tx.send_replace(SessionState::Connecting);

        let session = Arc::new(Self {
            account,
            proxy,
            server,
            instance_id: Uuid::new_v4(),
            started_at: Utc::now(),
            client: Mutex::new(connection.client),
            state: state_rx,
            attempts: AtomicU32::new(0),
            cancel: CancellationToken::new(),
        });
        let driver = SessionDriver {
            events: connection.events,
            state: state_tx,
        };
        Ok((session, driver))
    }

    /// Session identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.account.identity
    }

    /// Identifier distinguishing this session from any later one with the
    /// same identity.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Assigned proxy, `None` for a direct connection.
    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyEndpoint> {
        self.proxy.as_ref()
    }

    /// Target server.
    #[must_use]
    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Whether gameplay commands can be issued right now.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.state().is_interactive()
    }

    /// Reconnect attempts since the last successful spawn.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Command surface bound to the current handle.
    #[must_use]
    pub fn commands(&self) -> SessionCommands {
        SessionCommands {
            client: self.current_client(),
        }
    }

    /// Status row for this session.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            identity: self.account.identity.clone(),
            instance_id: self.instance_id.to_string(),
            state: self.state(),
            proxy: self.proxy.clone(),
            server: self.server.clone(),
            reconnect_attempts: self.reconnect_attempts(),
            started_at: self.started_at,
        }
    }

    /// Cancel all pending work for this session and close its handle.
    /// Only the registry calls this, while removing the session.
    pub(crate) fn end(&self, reason: &str) {
        self.cancel.cancel();
        self.terminate_handle(reason);
    }

    /// Whether [`end`](Self::end) has been called.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn current_client(&self) -> Arc<dyn GameClient> {
        Arc::clone(&self.client.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn terminate_handle(&self, reason: &str) {
        if let Err(err) = self.current_client().terminate(reason) {
            debug!(identity = self.identity(), %err, "terminate failed; ignoring");
        }
    }

    /// Build a new handle and make it current. Called by the session task
    /// while the registry lock is held and this instance is still registered.
    pub(crate) fn reconnect(&self, connector: &dyn Connector) -> Result<mpsc::Receiver<ClientEvent>> {
        let request = connect_request(&self.account, self.proxy.as_ref(), &self.server)?;
        let connection = connector.connect(request)?;
        let previous = {
            let mut guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, connection.client)
        };
        if let Err(err) = previous.terminate("replaced by reconnect") {
            debug!(identity = self.identity(), %err, "closing replaced handle failed");
        }
        Ok(connection.events)
    }
}

fn connect_request(
    account: &Account,
    proxy: Option<&ProxyEndpoint>,
    server: &ServerAddress,
) -> Result<ConnectRequest> {
    let route = proxy.map(ProxyEndpoint::route).transpose()?;
    Ok(ConnectRequest {
        server: server.clone(),
        identity: account.identity.clone(),
        credential: account.credential.clone(),
        proxy: route,
    })
}

/// How an event pump ended.
enum PumpExit {
    /// Recreate the handle after the delay.
    Reconnect(Duration),
    /// Nothing more to do for this handle.
    Finished,
    /// The session was stopped.
    Cancelled,
}

impl SessionDriver {
    /// Start the session's event task on `ctx.tracker`.
    pub fn spawn(self, session: Arc<Session>, ctx: Arc<SessionContext>) {
        let span = info_span!(
            "session",
            identity = session.identity(),
            instance = %session.instance_id()
        );
        let tracker = ctx.tracker.clone();
        tracker.spawn(self.run(session, ctx).instrument(span));
    }

    async fn run(mut self, session: Arc<Session>, ctx: Arc<SessionContext>) {
        loop {
            let delay = match self.pump(&session, &ctx).await {
                PumpExit::Reconnect(delay) => delay,
                PumpExit::Cancelled => {
                    self.state.send_replace(SessionState::Terminated);
                    ctx.note(session.identity(), "stopped");
                    return;
                }
                PumpExit::Finished => {
                    debug!("event stream finished without reconnect");
                    return;
                }
            };

            match self.reconnect_after(delay, &session, &ctx).await {
                Some(events) => self.events = events,
                None => {
                    self.state.send_replace(SessionState::Terminated);
                    return;
                }
            }
        }
    }

    /// Consume events of the current handle until it goes down.
    async fn pump(&mut self, session: &Arc<Session>, ctx: &Arc<SessionContext>) -> PumpExit {
        let identity = session.identity();
        loop {
            let (event, closed) = tokio::select! {
                biased;
                () = session.cancel.cancelled() => return PumpExit::Cancelled,
                event = self.events.recv() => match event {
                    Some(event) => (event, false),
                    // A handle that vanishes without a word has ended.
                    None => (ClientEvent::Ended, true),
                },
            };

            let current = *self.state.borrow();
            let transition = lifecycle::decide(identity, current, &event, &ctx.policy);
            if transition.is_ignored() {
                debug!(state = %current, ?event, "event ignored");
            }

            let mut reconnect = None;
            for effect in transition.effects {
                match effect {
                    Effect::Log(text) => ctx.note(identity, &text),
                    Effect::Transcript(line) => ctx.transcript(&line),
                    Effect::Authenticate => spawn_auth(session, ctx),
                    Effect::TerminateHandle(reason) => session.terminate_handle(&reason),
                    Effect::ScheduleReconnect(delay) => reconnect = Some(delay),
                }
            }

            if transition.next == SessionState::Spawned {
                session.attempts.store(0, Ordering::Relaxed);
            }
            if transition.next != current {
                debug!(from = %current, to = %transition.next, "state change");
                self.state.send_replace(transition.next);
            }

            if let Some(delay) = reconnect {
                return PumpExit::Reconnect(delay);
            }
            if closed {
                return PumpExit::Finished;
            }
        }
    }

    /// Wait out `delay`, then recreate the handle if the session is still
    /// registered. Failed rebuilds retry after the disconnect delay until
    /// the attempt cap is exceeded. `None` means the session is done.
    async fn reconnect_after(
        &self,
        mut delay: Duration,
        session: &Arc<Session>,
        ctx: &Arc<SessionContext>,
    ) -> Option<mpsc::Receiver<ClientEvent>> {
        let identity = session.identity();
        loop {
            tokio::select! {
                biased;
                () = session.cancel.cancelled() => {
                    ctx.note(identity, "stopped; reconnect cancelled");
                    return None;
                }
                () = tokio::time::sleep(delay) => {}
            }

            let attempt = session.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            if ctx.max_attempts > 0 && attempt > ctx.max_attempts {
                ctx.note(
                    identity,
                    &format!("giving up after {} reconnect attempts", ctx.max_attempts),
                );
                ctx.registry
                    .remove_instance(identity, session.instance_id())
                    .await;
                return None;
            }

            let connector = Arc::clone(&ctx.connector);
            let rebuilt = ctx
                .registry
                .with_instance(identity, session.instance_id(), |current| {
                    current.reconnect(connector.as_ref())
                })
                .await;

            match rebuilt {
                None => {
                    debug!("session no longer registered; reconnect skipped");
                    return None;
                }
                Some(Ok(events)) => {
                    self.state.send_replace(SessionState::Connecting);
                    ctx.note(identity, &format!("reconnecting (attempt {attempt})"));
                    return Some(events);
                }
                Some(Err(err)) => {
                    ctx.note(identity, &format!("reconnect failed: {err}"));
                    delay = ctx.policy.disconnect_delay;
                }
            }
        }
    }
}

fn spawn_auth(session: &Arc<Session>, ctx: &Arc<SessionContext>) {
    let identity = session.identity().to_owned();
    let credential = session.account.credential.clone();
    let commands = session.commands();
    let journal = Arc::clone(&ctx.journal);
    let cancel = session.cancel.child_token();
    let auth = ctx.auth.clone();
    ctx.tracker.spawn(
        async move {
            auth.run(&identity, &credential, commands, journal, cancel)
                .await;
        }
        .in_current_span(),
    );
}
