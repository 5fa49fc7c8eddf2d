//! Periodic gameplay actions driven by the global flags.
//!
//! Each tick takes one flag snapshot and one registry snapshot, then acts on
//! every interactive session independently. Failures are logged per
//! identity and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, Instrument};

use crate::client::{Direction, EntityKind, Position, VisibleEntity};
use crate::config::ActionConfig;
use crate::orchestrator::flags::{ActionFlags, FlagSnapshot};
use crate::orchestrator::registry::SessionRegistry;
use crate::orchestrator::session::{Session, SessionCommands};
use crate::persistence::Journal;

const SPAM_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SPAM_SUFFIX_LEN: usize = 6;

/// Nearest visible player to `own_position`, excluding `own_name`.
/// Ties keep the entity listed first.
#[must_use]
pub fn select_target<'a>(
    own_name: &str,
    own_position: &Position,
    entities: &'a [VisibleEntity],
) -> Option<&'a VisibleEntity> {
    entities
        .iter()
        .filter(|e| e.kind == EntityKind::Player)
        .filter(|e| e.name.as_deref() != Some(own_name))
        .map(|e| (e, own_position.distance_to(&e.position)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(e, _)| e)
}

/// A chat-spam message: `spam_` followed by six base-36 characters.
#[must_use]
pub fn spam_message(rng: &mut impl Rng) -> String {
    let suffix: String = (0..SPAM_SUFFIX_LEN)
        .map(|_| char::from(SPAM_ALPHABET[rng.gen_range(0..SPAM_ALPHABET.len())]))
        .collect();
    format!("spam_{suffix}")
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Interactive sessions acted on.
    pub sessions: usize,
    /// Movement windows opened.
    pub movement_windows: usize,
    /// Attacks issued.
    pub attacks: usize,
    /// Spam messages sent.
    pub spam_messages: usize,
    /// Commands that failed.
    pub failures: usize,
}

/// Tick-driven action issuer.
pub struct ActionScheduler {
    registry: Arc<SessionRegistry>,
    flags: Arc<ActionFlags>,
    journal: Arc<dyn Journal>,
    config: ActionConfig,
    tracker: TaskTracker,
    rng: StdRng,
}

impl ActionScheduler {
    /// Create a scheduler. Hold windows are spawned on `tracker`.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        flags: Arc<ActionFlags>,
        journal: Arc<dyn Journal>,
        config: ActionConfig,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            registry,
            flags,
            journal,
            config,
            tracker,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed random source (for reproducible runs).
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Run ticks until `cancel` fires. Open hold windows still finish.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        let period = Duration::from_millis(self.config.tick_ms);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!(tick_ms = period.as_millis(), "action scheduler started");
                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            let report = self.tick().await;
                            if report.sessions > 0 {
                                debug!(?report, "tick");
                            }
                        }
                    }
                }
                info!("action scheduler stopped");
            }
            .instrument(info_span!("action_scheduler")),
        )
    }

    /// Run one tick against the current flags and registry.
    pub async fn tick(&mut self) -> TickReport {
        let flags = self.flags.snapshot();
        let mut report = TickReport::default();
        if !flags.any() {
            return report;
        }

        for session in self.registry.snapshot().await {
            if !session.is_interactive() {
                continue;
            }
            report.sessions += 1;
            self.act(&session, flags, &mut report);
        }
        report
    }

    fn act(&mut self, session: &Session, flags: FlagSnapshot, report: &mut TickReport) {
        let identity = session.identity();
        let commands = session.commands();

        if flags.wants_movement() {
            let hold = Duration::from_millis(
                self.rng
                    .gen_range(self.config.hold_min_ms..self.config.hold_max_ms),
            );
            if self.open_hold_window(identity, commands.clone(), hold, flags.sprint) {
                report.movement_windows += 1;
            } else {
                report.failures += 1;
            }
        }

        if flags.combat {
            if let Some(own) = commands.position() {
                let entities = commands.visible_entities();
                if let Some(target) = select_target(identity, &own, &entities) {
                    let name = target.name.as_deref().unwrap_or("?");
                    match commands.attack(target) {
                        Ok(()) => {
                            report.attacks += 1;
                            self.note(identity, &format!("attacking {name}"));
                        }
                        Err(err) => {
                            report.failures += 1;
                            self.note(identity, &format!("attack failed: {err}"));
                        }
                    }
                }
            }
        }

        if flags.chat_spam && self.rng.gen_bool(self.config.spam_probability) {
            let message = spam_message(&mut self.rng);
            match commands.chat(&message) {
                Ok(()) => {
                    report.spam_messages += 1;
                    self.note(identity, &format!("spammed: {message}"));
                }
                Err(err) => {
                    report.failures += 1;
                    self.note(identity, &format!("spam failed: {err}"));
                }
            }
        }
    }

    /// Press forward (and sprint) now, release after `hold`. The release is
    /// issued on the same handle regardless of later flag changes.
    fn open_hold_window(
        &self,
        identity: &str,
        commands: SessionCommands,
        hold: Duration,
        sprint: bool,
    ) -> bool {
        if let Err(err) = commands.set_movement(Direction::Forward, true) {
            self.note(identity, &format!("move failed: {err}"));
            return false;
        }
        if sprint {
            if let Err(err) = commands.set_sprint(true) {
                self.note(identity, &format!("sprint failed: {err}"));
            }
        }

        let who = identity.to_owned();
        self.tracker.spawn(async move {
            tokio::time::sleep(hold).await;
            if let Err(err) = commands.set_movement(Direction::Forward, false) {
                debug!(identity = %who, %err, "stop after hold failed");
            }
            if sprint {
                if let Err(err) = commands.set_sprint(false) {
                    debug!(identity = %who, %err, "sprint release failed");
                }
            }
        });
        true
    }

    fn note(&self, identity: &str, text: &str) {
        debug!(identity, "{text}");
        if let Err(err) = self.journal.record(identity, text) {
            debug!(identity, %err, "failed to write session log");
        }
    }
}
