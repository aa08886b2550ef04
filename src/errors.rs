use thiserror::Error;

use crate::accounts::AccountId;

/// Errors raised while reading or writing cached account metadata
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Account '{name}' not found")]
    NotFound { name: String },

    #[error("Account '{account}' has no value for field '{key}'")]
    MissingField { account: String, key: String },

    #[error("Account store rejected the update: {details}")]
    StoreFailed { details: String },
}

impl AccountError {
    pub fn not_found(account: &AccountId) -> Self {
        AccountError::NotFound {
            name: account.name.clone(),
        }
    }

    pub fn missing_field(account: &AccountId, key: &str) -> Self {
        AccountError::MissingField {
            account: account.name.clone(),
            key: key.to_string(),
        }
    }
}

/// Errors raised while retrieving auth tokens from the interactive provider.
///
/// Cancellation is its own variant so callers can tell "user backed out of
/// re-authentication" apart from a failing authenticator or plain I/O.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Credential retrieval was cancelled")]
    Cancelled,

    #[error("Authenticator failed: {details}")]
    Authenticator { details: String },

    #[error("I/O error while retrieving credentials")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the session managers when a connection cannot be
/// produced for an account. Protocol-level failures are not represented
/// here; those travel as `RemoteOperationResult` codes.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("No WebDAV endpoint known for server version '{version}'")]
    UnsupportedServerVersion { version: String },

    #[error("Invalid base URL '{url}': {details}")]
    InvalidBaseUrl { url: String, details: String },

    #[error("Transport setup failed")]
    Transport(#[from] reqwest::Error),
}
