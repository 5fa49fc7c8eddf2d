//! Account list loading and credential back-fill.
//!
//! The accounts file is an ordered JSON array of
//! `{ "username": ..., "password": ... }` objects. Entries without a
//! password get a generated 8-hex-digit credential and the file is
//! rewritten (tmp file + rename) so the credential survives restarts.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, info_span, warn};

use crate::models::Account;
use crate::{AppError, Result};

/// Generate an 8-character lowercase hex credential.
#[must_use]
pub fn generate_credential(rng: &mut impl Rng) -> String {
    format!("{:08x}", rng.gen::<u32>())
}

/// Ordered, de-duplicated account list backed by a JSON file.
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
    accounts: Vec<Account>,
}

impl AccountStore {
    /// Load accounts from `path`.
    ///
    /// A missing file yields an empty list. Duplicate identities keep their
    /// first occurrence. Missing credentials are generated and persisted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file is not a valid account list,
    /// or `AppError::Io` if it cannot be read or rewritten.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let _span = info_span!("load_accounts", path = %path.display()).entered();

        if !path.exists() {
            warn!("accounts file not found; starting with no accounts");
            return Ok(Self {
                path,
                accounts: Vec::new(),
            });
        }

        let raw = fs::read_to_string(&path)
            .map_err(|e| AppError::Io(format!("failed to read {}: {e}", path.display())))?;
        let parsed: Vec<Account> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("invalid accounts file: {e}")))?;

        let mut store = Self {
            path,
            accounts: dedupe(parsed),
        };

        let generated = store.fill_missing_credentials(&mut rand::thread_rng());
        if generated > 0 {
            store.save()?;
            info!(generated, "generated missing credentials");
        }

        info!(count = store.accounts.len(), "accounts loaded");
        Ok(store)
    }

    /// Build a store from an in-memory list (not persisted until [`save`](Self::save)).
    #[must_use]
    pub fn from_accounts(path: impl Into<PathBuf>, accounts: Vec<Account>) -> Self {
        Self {
            path: path.into(),
            accounts: dedupe(accounts),
        }
    }

    /// Give every account with an empty credential a generated one.
    /// Returns how many were generated.
    pub fn fill_missing_credentials(&mut self, rng: &mut impl Rng) -> usize {
        let mut generated = 0;
        for account in &mut self.accounts {
            if account.credential.trim().is_empty() {
                account.credential = generate_credential(rng);
                generated += 1;
            }
        }
        generated
    }

    /// Rewrite the accounts file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.accounts)?;
        write_atomically(&self.path, &body)
    }

    /// Accounts in file order.
    #[must_use]
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no accounts are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn dedupe(accounts: Vec<Account>) -> Vec<Account> {
    let mut seen = HashSet::new();
    accounts
        .into_iter()
        .filter(|account| {
            if account.identity.trim().is_empty() {
                warn!("skipping account with empty username");
                return false;
            }
            if seen.insert(account.identity.clone()) {
                true
            } else {
                warn!(identity = %account.identity, "skipping duplicate account");
                false
            }
        })
        .collect()
}

fn write_atomically(path: &Path, body: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, format!("{body}\n"))
        .map_err(|e| AppError::Io(format!("failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::Io(format!("failed to replace {}: {e}", path.display())))
}
