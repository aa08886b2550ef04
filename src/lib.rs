//! Session, credential and remote-operation core for WebDAV cloud-storage
//! clients.
//!
//! The library keeps authenticated, reusable connections to servers whose
//! protocol capabilities vary by version: [`capabilities`] maps a server
//! version to its WebDAV endpoint and auth-mode preferences,
//! [`credentials::Credentials`] covers the supported authentication schemes
//! with a uniform apply-to-connection contract, and
//! [`session::DynamicSessionManager`] hands out at most one live connection
//! per account through one of two lifecycle strategies. Remote work runs
//! through [`operations::RemoteOperation`], which folds every outcome,
//! transport failures included, into a structured
//! [`operations::RemoteOperationResult`].
//!
//! Account metadata and auth secrets stay with the embedding application,
//! reached through the [`accounts::AccountStore`] and
//! [`accounts::CredentialsProvider`] seams.

pub mod accounts;
pub mod capabilities;
pub mod connection;
pub mod credentials;
pub mod errors;
pub mod operations;
pub mod path_utils;
pub mod session;
pub mod test_utils;

pub use accounts::{AccountId, AccountStore, AuthTokenKind, CredentialsProvider};
pub use capabilities::{resolve_webdav_path, ServerVersion};
pub use connection::{Connection, Cookie, CookieJar, RequestTimeouts};
pub use credentials::{credentials_for_account, Credentials};
pub use errors::{AccountError, CredentialsError, SessionError};
pub use operations::{
    CreateFolderOperation, RemoteOperation, RemoteOperationResult, ResultCode,
};
pub use session::{
    ConnectionManager, DynamicSessionManager, SimpleFactoryManager, SingleSessionManager,
};
