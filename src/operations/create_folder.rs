use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, error};

use crate::connection::{Connection, RequestTimeouts};
use crate::path_utils;

use super::{RemoteOperation, RemoteOperationResult, ResultCode};

const READ_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a folder on the server, optionally creating missing ancestors.
///
/// Retry policy: the primary MKCOL runs once; on [`ResultCode::Conflict`]
/// with ancestor creation enabled, the parent path is created (recursively)
/// and the primary MKCOL is retried exactly once. The retry's result is
/// surfaced verbatim, whatever it is.
pub struct CreateFolderOperation {
    remote_path: String,
    create_full_path: bool,
}

impl CreateFolderOperation {
    /// `remote_path` is the full path of the new folder; `create_full_path`
    /// creates missing ancestor folders as well.
    pub fn new(remote_path: impl Into<String>, create_full_path: bool) -> Self {
        Self {
            remote_path: remote_path.into(),
            create_full_path,
        }
    }

    async fn create_folder(&self, connection: &Connection) -> RemoteOperationResult {
        let url = format!(
            "{}{}",
            connection.webdav_url().as_str().trim_end_matches('/'),
            path_utils::encode_path(&self.remote_path)
        );
        let timeouts = RequestTimeouts::new(READ_TIMEOUT, CONNECT_TIMEOUT);

        let method = match Method::from_bytes(b"MKCOL") {
            Ok(method) => method,
            Err(e) => {
                error!("MKCOL method construction failed: {}", e);
                return RemoteOperationResult::new(ResultCode::UnknownError)
                    .with_log_message(e.to_string());
            }
        };

        match connection.execute(method, &url, None, &[], timeouts).await {
            Ok(response) => {
                let status = response.status();
                // Drain the body so the underlying connection is reusable.
                let _ = response.bytes().await;
                let result = RemoteOperationResult::from_status(status);
                debug!(
                    "Create folder {}: {}",
                    self.remote_path,
                    result.log_message()
                );
                result
            }
            Err(e) => {
                let result = RemoteOperationResult::from_transport_error(e);
                error!(
                    "Create folder {}: {}",
                    self.remote_path,
                    result.log_message()
                );
                result
            }
        }
    }

    async fn create_parent_folder(
        &self,
        parent_path: String,
        connection: &Connection,
    ) -> RemoteOperationResult {
        let operation = CreateFolderOperation::new(parent_path, self.create_full_path);
        operation.run(connection).await
    }
}

#[async_trait]
impl RemoteOperation for CreateFolderOperation {
    async fn run(&self, connection: &Connection) -> RemoteOperationResult {
        let restrictive = connection.version().has_forbidden_filename_chars();
        if !path_utils::is_valid_path(&self.remote_path, restrictive) {
            return RemoteOperationResult::new(ResultCode::InvalidCharacterInName);
        }

        let mut result = self.create_folder(connection).await;
        if !result.is_success() && self.create_full_path && result.code() == ResultCode::Conflict {
            let parent = path_utils::parent_path(&self.remote_path);
            // The root is its own parent; a conflict there has no ancestor
            // left to create and must not recurse.
            if parent != self.remote_path {
                result = self.create_parent_folder(parent, connection).await;
                if result.is_success() {
                    // second (and last) try
                    result = self.create_folder(connection).await;
                }
            }
        }
        result
    }
}
