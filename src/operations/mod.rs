pub mod create_folder;

pub use create_folder::CreateFolderOperation;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;

/// Outcome classification for a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Ok,
    Unauthorized,
    Forbidden,
    NotFound,
    /// The request collided with server state: a missing ancestor
    /// collection on MKCOL. Recoverable by creating the ancestors first.
    Conflict,
    /// The resource refuses the method, e.g. MKCOL on a collection that
    /// already exists. Not recoverable by retrying.
    MethodNotAllowed,
    /// The target name contains a character the server version rejects.
    /// Detected locally; no request is sent.
    InvalidCharacterInName,
    Timeout,
    Cancelled,
    ServerError,
    UnknownError,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Ok)
    }

    /// Classifies an HTTP response status.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            return ResultCode::Ok;
        }
        match status.as_u16() {
            401 => ResultCode::Unauthorized,
            403 => ResultCode::Forbidden,
            404 => ResultCode::NotFound,
            405 => ResultCode::MethodNotAllowed,
            409 => ResultCode::Conflict,
            408 => ResultCode::Timeout,
            code if (500..600).contains(&code) => ResultCode::ServerError,
            _ => ResultCode::UnknownError,
        }
    }
}

/// Structured result of one remote operation: a code, an optional captured
/// cause for diagnostics, and a short log line. Transport errors never leave
/// an operation as raw errors; they arrive here wrapped.
#[derive(Debug)]
pub struct RemoteOperationResult {
    code: ResultCode,
    cause: Option<anyhow::Error>,
    log_message: String,
}

impl RemoteOperationResult {
    pub fn new(code: ResultCode) -> Self {
        Self {
            log_message: format!("Operation finished with result {:?}", code),
            code,
            cause: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(ResultCode::Ok)
    }

    /// Result for an HTTP response that completed at the protocol level.
    pub fn from_status(status: StatusCode) -> Self {
        let code = ResultCode::from_status(status);
        Self {
            code,
            cause: None,
            log_message: format!("HTTP {} -> {:?}", status.as_u16(), code),
        }
    }

    /// Wraps a transport failure. Timeouts get their own code; everything
    /// else is an unknown error carrying the original cause.
    pub fn from_transport_error(error: reqwest::Error) -> Self {
        let code = if error.is_timeout() {
            ResultCode::Timeout
        } else {
            ResultCode::UnknownError
        };
        Self {
            code,
            log_message: format!("Transport failure: {}", error),
            cause: Some(error.into()),
        }
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    pub fn log_message(&self) -> &str {
        &self.log_message
    }
}

/// A unit of remote work: one or more protocol requests against a
/// connection, folded into a single structured result. Implementations must
/// catch their own transport errors and drain response bodies on every exit
/// path.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    async fn run(&self, connection: &Connection) -> RemoteOperationResult;
}
