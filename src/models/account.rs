//! Account model.

use serde::{Deserialize, Serialize};

/// One login identity and the credential used by the auth sequence.
///
/// Persisted as `{ "username": ..., "password": ... }`. A missing password
/// deserializes as empty and is filled in by the account store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique identity; doubles as the in-game name.
    #[serde(rename = "username")]
    pub identity: String,
    /// Credential passed to the login/register commands.
    #[serde(rename = "password", default)]
    pub credential: String,
}

impl Account {
    /// Construct an account.
    #[must_use]
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
        }
    }
}
