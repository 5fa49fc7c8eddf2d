//! Session state transitions.
//!
//! [`decide`] is a pure function from (current state, event, policy) to the
//! next state plus the side effects to perform. The per-session task in
//! [`session`](super::session) performs the effects; keeping the decision
//! free of I/O lets the whole table be tested without a runtime.

use std::time::Duration;

use crate::client::ClientEvent;
use crate::config::ReconnectConfig;
use crate::models::SessionState;

/// Reconnection timing consulted by [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether down sessions are recreated at all.
    pub enabled: bool,
    /// Delay after a kick.
    pub kick_delay: Duration,
    /// Delay after a disconnect or error.
    pub disconnect_delay: Duration,
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            enabled: config.enabled,
            kick_delay: config.kick_delay(),
            disconnect_delay: config.disconnect_delay(),
        }
    }
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a line to the identity's log.
    Log(String),
    /// Append a line to the chat transcript.
    Transcript(String),
    /// Start the login/register sequence.
    Authenticate,
    /// Close the current handle (best-effort).
    TerminateHandle(String),
    /// Recreate the handle after the delay, if still registered.
    ScheduleReconnect(Duration),
}

/// Outcome of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event.
    pub next: SessionState,
    /// Effects to perform, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn ignore(state: SessionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    /// Whether the event was dropped without effect.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.effects.is_empty()
    }

    /// Reconnect delay requested by this transition, if any.
    #[must_use]
    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::ScheduleReconnect(delay) => Some(*delay),
            _ => None,
        })
    }
}

/// Decide how `identity` in `state` reacts to `event`.
#[must_use]
pub fn decide(
    identity: &str,
    state: SessionState,
    event: &ClientEvent,
    policy: &ReconnectPolicy,
) -> Transition {
    use SessionState as S;

    if matches!(state, S::Idle | S::Terminated) {
        return Transition::ignore(state);
    }

    match event {
        ClientEvent::Connected => match state {
            S::Connecting => Transition::to(
                S::LoggedIn,
                vec![Effect::Log(format!("{identity} logged in"))],
            ),
            _ => Transition::ignore(state),
        },

        ClientEvent::Spawned => match state {
            S::LoggedIn => Transition::to(
                S::Spawned,
                vec![
                    Effect::Log("spawned - attempting login/register".into()),
                    Effect::Authenticate,
                ],
            ),
            S::Spawned => Transition::to(S::Spawned, vec![Effect::Log("respawned".into())]),
            _ => Transition::ignore(state),
        },

        ClientEvent::ChatReceived { sender, text } => Transition::to(
            state,
            vec![
                Effect::Log(format!("CHAT: {sender}: {text}")),
                Effect::Transcript(format!("[CHAT][{identity}] {sender}: {text}")),
            ],
        ),

        ClientEvent::Kicked { reason } => {
            let line = format!("[KICKED] {identity} reason: {reason}");
            let mut effects = vec![Effect::Log(line.clone()), Effect::Transcript(line)];
            if !state.is_live() {
                return Transition::to(state, effects);
            }
            if policy.enabled {
                effects.push(Effect::ScheduleReconnect(policy.kick_delay));
            }
            Transition::to(S::Kicked, effects)
        }

        ClientEvent::Ended => {
            let line = format!("[END] {identity} disconnected");
            let mut effects = vec![Effect::Log(line.clone()), Effect::Transcript(line)];
            if !state.is_live() {
                return Transition::to(state, effects);
            }
            if policy.enabled {
                effects.push(Effect::ScheduleReconnect(policy.disconnect_delay));
            }
            Transition::to(S::Disconnected, effects)
        }

        ClientEvent::Errored { message } => {
            let line = format!("[ERROR] {identity}: {message}");
            let mut effects = vec![
                Effect::Log(line.clone()),
                Effect::Transcript(line),
                Effect::TerminateHandle(format!("error: {message}")),
            ];
            if !state.is_live() {
                return Transition::to(state, effects);
            }
            // Falls through to the disconnect path.
            if policy.enabled {
                effects.push(Effect::ScheduleReconnect(policy.disconnect_delay));
            }
            Transition::to(S::Errored, effects)
        }
    }
}
