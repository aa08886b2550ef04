use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::accounts::{AccountId, AccountStore, CredentialsProvider};
use crate::connection::Connection;
use crate::errors::SessionError;

use super::{build_authenticated_connection, ConnectionManager};

/// Builds a fresh, unshared connection on every request and caches nothing.
///
/// Safe for servers taking preemptive authentication: each request carries
/// its credentials anyway, so there is no session state worth keeping and
/// the connection can be dropped right after use.
pub struct SimpleFactoryManager {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn CredentialsProvider>,
    created: AtomicU64,
}

impl SimpleFactoryManager {
    pub fn new(store: Arc<dyn AccountStore>, provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            store,
            provider,
            created: AtomicU64::new(0),
        }
    }

    /// Number of connections this factory has built so far.
    pub fn connections_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConnectionManager for SimpleFactoryManager {
    async fn get_connection_for(
        &self,
        account: &AccountId,
    ) -> Result<Arc<Connection>, SessionError> {
        debug!("Building throwaway connection for {}", account.name);
        let connection =
            build_authenticated_connection(self.store.as_ref(), self.provider.as_ref(), account)
                .await?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(connection)
    }

    async fn remove_connection_for(&self, _account: &AccountId) -> Option<Arc<Connection>> {
        // Nothing is ever cached.
        None
    }

    async fn save_all_connections(&self, _account_type: &str) -> Result<(), SessionError> {
        // Factory connections are request-scoped; no cookie state survives
        // to be persisted.
        Ok(())
    }
}
