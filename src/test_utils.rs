//! In-memory collaborator implementations for tests.
//!
//! The session managers are written against the narrow [`AccountStore`] and
//! [`CredentialsProvider`] seams; these implementations let unit and
//! integration tests instantiate isolated managers without a real account
//! store or an interactive authenticator.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::accounts::{AccountId, AccountStore, AuthTokenKind, CredentialsProvider};
use crate::errors::{AccountError, CredentialsError};

/// Account store backed by a process-local map.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<AccountId, HashMap<String, String>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account so field lookups succeed. Unregistered accounts
    /// produce [`AccountError::NotFound`], like a real store.
    pub fn add_account(&self, account: &AccountId) {
        self.accounts
            .lock()
            .unwrap()
            .entry(account.clone())
            .or_default();
    }

    /// Registers an account with an initial set of fields.
    pub fn add_account_with_fields<const N: usize>(
        &self,
        account: &AccountId,
        fields: [(&str, &str); N],
    ) {
        let mut accounts = self.accounts.lock().unwrap();
        let entry = accounts.entry(account.clone()).or_default();
        for (key, value) in fields {
            entry.insert(key.to_string(), value.to_string());
        }
    }
}

impl AccountStore for InMemoryAccountStore {
    fn get_field(&self, account: &AccountId, key: &str) -> Result<Option<String>, AccountError> {
        let accounts = self.accounts.lock().unwrap();
        let fields = accounts
            .get(account)
            .ok_or_else(|| AccountError::not_found(account))?;
        Ok(fields.get(key).cloned())
    }

    fn set_field(&self, account: &AccountId, key: &str, value: &str) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().unwrap();
        let fields = accounts
            .get_mut(account)
            .ok_or_else(|| AccountError::not_found(account))?;
        fields.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Provider that hands out one fixed secret for every token kind.
pub struct StaticCredentialsProvider {
    secret: String,
}

impl StaticCredentialsProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn auth_token(
        &self,
        _account: &AccountId,
        _kind: AuthTokenKind,
    ) -> Result<String, CredentialsError> {
        Ok(self.secret.clone())
    }
}

/// Provider that simulates the user backing out of re-authentication.
pub struct CancellingCredentialsProvider;

#[async_trait]
impl CredentialsProvider for CancellingCredentialsProvider {
    async fn auth_token(
        &self,
        _account: &AccountId,
        _kind: AuthTokenKind,
    ) -> Result<String, CredentialsError> {
        Err(CredentialsError::Cancelled)
    }
}
