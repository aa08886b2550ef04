//! Connection-lifecycle strategies and the dynamic dispatcher over them.

pub mod manager;
pub mod simple_factory;
pub mod single_session;

pub use manager::DynamicSessionManager;
pub use simple_factory::SimpleFactoryManager;
pub use single_session::SingleSessionManager;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::accounts::{self, keys, AccountId, AccountStore, CredentialsProvider};
use crate::capabilities::{resolve_webdav_path, ServerVersion};
use crate::connection::Connection;
use crate::credentials::credentials_for_account;
use crate::errors::SessionError;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces authenticated connections for accounts and manages their
/// lifecycle. Implementations must be safe under concurrent calls for the
/// same account.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Returns an authenticated connection for the account. Failures during
    /// account lookup or credential retrieval propagate; a partially
    /// configured connection is never returned.
    async fn get_connection_for(
        &self,
        account: &AccountId,
    ) -> Result<Arc<Connection>, SessionError>;

    /// Removes and returns the connection cached for the account, if any.
    async fn remove_connection_for(&self, account: &AccountId) -> Option<Arc<Connection>>;

    /// Persists cookie state for every cached account of the given type.
    async fn save_all_connections(&self, account_type: &str) -> Result<(), SessionError>;
}

/// Builds a connection for an account and applies freshly retrieved
/// credentials to it. Shared by both strategies; cookie restoration is the
/// single-session strategy's business and happens after this returns.
pub(crate) async fn build_authenticated_connection(
    store: &dyn AccountStore,
    provider: &dyn CredentialsProvider,
    account: &AccountId,
) -> Result<Arc<Connection>, SessionError> {
    let base_url = accounts::base_url_for_account(store, account)?;
    let version = accounts::server_version_for_account(store, account)?;
    let supports_oauth2 = store.get_field(account, keys::SUPPORTS_OAUTH2)?.is_some();
    let supports_saml_sso = store.get_field(account, keys::SUPPORTS_SAML_SSO)?.is_some();

    let webdav_path = resolve_webdav_path(version, supports_oauth2, supports_saml_sso)
        .ok_or_else(|| SessionError::UnsupportedServerVersion {
            version: version.to_string(),
        })?;

    debug!(
        "Building connection for {} (server {}, endpoint {})",
        account.name, version, webdav_path
    );

    let connection = Connection::new(&base_url, webdav_path, version, DEFAULT_CONNECT_TIMEOUT)?;

    let credentials = credentials_for_account(store, provider, account).await?;
    credentials.apply_to(&connection).await;

    Ok(Arc::new(connection))
}

/// Whether the account's cached server capability prefers preemptive
/// authentication. Accounts without a stored version report false, which
/// routes them to the single-session strategy.
pub(crate) fn prefers_preemptive_auth(
    store: &dyn AccountStore,
    account: &AccountId,
) -> Result<bool, SessionError> {
    let stored = store.get_field(account, keys::SERVER_VERSION)?;
    Ok(match stored.as_deref() {
        Some(raw) => ServerVersion::parse_or_minimum(Some(raw)).prefers_preemptive_auth(),
        None => false,
    })
}
