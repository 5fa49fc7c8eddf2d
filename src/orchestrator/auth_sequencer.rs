//! Login/register command sequence issued after spawn.
//!
//! The server's answer is free-form chat, so success cannot be observed:
//! the sequence always sends the login command and then the register
//! command, each after a fixed delay. Commands are fire-and-forget.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::AuthConfig;
use crate::orchestrator::session::SessionCommands;
use crate::persistence::Journal;

const PASSWORD_PLACEHOLDER: &str = "{password}";

/// Fixed-delay login-then-register issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSequencer {
    login_delay: Duration,
    register_delay: Duration,
    login_template: String,
    register_template: String,
}

impl Default for AuthSequencer {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl AuthSequencer {
    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            login_delay: Duration::from_millis(config.login_delay_ms),
            register_delay: Duration::from_millis(config.register_delay_ms),
            login_template: config.login_command.clone(),
            register_template: config.register_command.clone(),
        }
    }

    /// Login command for `credential`.
    #[must_use]
    pub fn login_command(&self, credential: &str) -> String {
        self.login_template.replace(PASSWORD_PLACEHOLDER, credential)
    }

    /// Register command for `credential`.
    #[must_use]
    pub fn register_command(&self, credential: &str) -> String {
        self.register_template.replace(PASSWORD_PLACEHOLDER, credential)
    }

    /// Delay before the login command.
    #[must_use]
    pub fn login_delay(&self) -> Duration {
        self.login_delay
    }

    /// Delay between the login and the register command.
    #[must_use]
    pub fn register_delay(&self) -> Duration {
        self.register_delay
    }

    /// Run the sequence against `commands`. Returns early, without sending
    /// anything further, once `cancel` fires.
    pub async fn run(
        &self,
        identity: &str,
        credential: &str,
        commands: SessionCommands,
        journal: Arc<dyn Journal>,
        cancel: CancellationToken,
    ) {
        let steps = [
            (self.login_delay, self.login_command(credential)),
            (self.register_delay, self.register_command(credential)),
        ];

        for (delay, command) in steps {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(identity, "auth sequence abandoned");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            let shown = mask(&command, credential);
            let line = match commands.chat(&command) {
                Ok(()) => format!("SENT_CHAT: {shown}"),
                Err(err) => format!("CHAT_ERR: {shown}: {err}"),
            };
            if let Err(err) = journal.record(identity, &line) {
                debug!(identity, %err, "failed to record auth step");
            }
        }
    }
}

/// Hide the credential in a command before it is logged.
fn mask(command: &str, credential: &str) -> String {
    if credential.is_empty() {
        command.to_owned()
    } else {
        command.replace(credential, "********")
    }
}
