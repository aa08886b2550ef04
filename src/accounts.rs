use async_trait::async_trait;
use tracing::debug;

use crate::capabilities::ServerVersion;
use crate::connection::Connection;
use crate::errors::{AccountError, CredentialsError};

/// Field keys the library reads and writes through the account store.
pub mod keys {
    /// Base URL of the server installation, without a trailing slash.
    pub const BASE_URL: &str = "oc_base_url";
    /// Server version as `major.minor.micro`, refreshed from the status
    /// endpoint by the embedding application.
    pub const SERVER_VERSION: &str = "oc_version";
    /// Present (any value) when the server accepts OAuth2 access tokens.
    pub const SUPPORTS_OAUTH2: &str = "oc_supports_oauth2";
    /// Present (any value) when the server accepts SAML web SSO session
    /// cookies.
    pub const SUPPORTS_SAML_SSO: &str = "oc_supports_saml_web_sso";
    /// Persisted cookie string, `name=value;name=value;...`.
    pub const COOKIES: &str = "oc_account_cookies";
}

/// Identity of one account as the embedding application names it:
/// `user@host[:port][/path]` plus an account type discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    pub name: String,
    pub account_type: String,
}

impl AccountId {
    pub fn new(name: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_type: account_type.into(),
        }
    }

    /// Username embedded in the account name, everything before the last
    /// `'@'`. Names without one are used as-is.
    pub fn username(&self) -> String {
        match self.name.rfind('@') {
            Some(idx) => self.name[..idx].to_string(),
            None => self.name.clone(),
        }
    }
}

/// Canonical account name for a server URL and username:
/// `user@host[:port][/path]`, scheme stripped, `https` assumed when absent.
pub fn build_account_name(server_base_url: &str, username: &str) -> String {
    let with_scheme = if server_base_url.contains("://") {
        server_base_url.to_string()
    } else {
        format!("https://{server_base_url}")
    };
    let stripped = match with_scheme.split_once("://") {
        Some((_, rest)) => rest,
        None => with_scheme.as_str(),
    };
    format!("{}@{}", username, stripped)
}

/// Narrow accessor over the externally owned account store. The core only
/// touches the fields in [`keys`]; everything else about an account belongs
/// to the embedding application.
pub trait AccountStore: Send + Sync {
    /// Reads one cached field. `Ok(None)` means the field is unset;
    /// an unknown account is an error.
    fn get_field(&self, account: &AccountId, key: &str) -> Result<Option<String>, AccountError>;

    /// Writes one cached field.
    fn set_field(&self, account: &AccountId, key: &str, value: &str) -> Result<(), AccountError>;
}

/// Which secret the interactive credential provider should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTokenKind {
    AccessToken,
    SamlSessionCookie,
    Password,
}

/// Source of auth secrets, possibly backed by interactive re-authentication.
/// Retrieval blocks until a value is available or fails; cancellation is a
/// distinct error so callers can tell it apart from authenticator failures.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn auth_token(
        &self,
        account: &AccountId,
        kind: AuthTokenKind,
    ) -> Result<String, CredentialsError>;
}

/// Base URL cached for an account. An account without one is unusable.
pub fn base_url_for_account(
    store: &dyn AccountStore,
    account: &AccountId,
) -> Result<String, AccountError> {
    store
        .get_field(account, keys::BASE_URL)?
        .ok_or_else(|| AccountError::missing_field(account, keys::BASE_URL))
}

/// Server version cached for an account; missing or malformed strings fall
/// back to the minimum supported version.
pub fn server_version_for_account(
    store: &dyn AccountStore,
    account: &AccountId,
) -> Result<ServerVersion, AccountError> {
    let stored = store.get_field(account, keys::SERVER_VERSION)?;
    Ok(ServerVersion::parse_or_minimum(stored.as_deref()))
}

/// Persists a connection's cookie jar into the account store. An empty jar
/// is not persisted, so a fresh never-used connection does not wipe cookies
/// saved by an earlier one.
pub async fn save_connection(
    store: &dyn AccountStore,
    account: &AccountId,
    connection: &Connection,
) -> Result<(), AccountError> {
    let cookies_string = connection.cookies_string().await;
    if !cookies_string.is_empty() {
        debug!("Saving cookies for {}", account.name);
        store.set_field(account, keys::COOKIES, &cookies_string)?;
    }
    Ok(())
}

/// Restores the persisted cookie string, if any, into a connection's jar.
/// Malformed pairs are skipped inside the jar, never fatal.
pub async fn restore_cookies(
    store: &dyn AccountStore,
    account: &AccountId,
    connection: &Connection,
) -> Result<(), AccountError> {
    debug!("Restoring cookies for {}", account.name);
    if let Some(cookies_string) = store.get_field(account, keys::COOKIES)? {
        connection.restore_cookies_from(&cookies_string).await;
    }
    Ok(())
}
