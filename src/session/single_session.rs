use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::accounts::{self, AccountId, AccountStore, CredentialsProvider};
use crate::connection::Connection;
use crate::errors::SessionError;

use super::{build_authenticated_connection, ConnectionManager};

/// Keeps one canonical, persistent connection per account.
///
/// Favored for servers that need challenge/response or cookie-based session
/// continuity: the cached connection carries a live cookie jar across calls
/// and spares the repeated handshake. The persisted cookie string is
/// restored into the jar when the connection is first built.
pub struct SingleSessionManager {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn CredentialsProvider>,
    connections: RwLock<HashMap<AccountId, Arc<Connection>>>,
    // Serializes creation so a not-yet-cached connection is built and
    // authenticated at most once per account under concurrency.
    creation_lock: Mutex<()>,
}

impl SingleSessionManager {
    pub fn new(store: Arc<dyn AccountStore>, provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            store,
            provider,
            connections: RwLock::new(HashMap::new()),
            creation_lock: Mutex::new(()),
        }
    }

    /// Whether a connection is currently cached for the account.
    pub async fn has_cached_connection(&self, account: &AccountId) -> bool {
        self.connections.read().await.contains_key(account)
    }

    /// Cached accounts of the given type with their connections.
    pub async fn cached_connections(&self, account_type: &str) -> Vec<(AccountId, Arc<Connection>)> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(account, _)| account.account_type == account_type)
            .map(|(account, connection)| (account.clone(), Arc::clone(connection)))
            .collect()
    }
}

#[async_trait]
impl ConnectionManager for SingleSessionManager {
    async fn get_connection_for(
        &self,
        account: &AccountId,
    ) -> Result<Arc<Connection>, SessionError> {
        if let Some(connection) = self.connections.read().await.get(account) {
            debug!("Reusing cached connection for {}", account.name);
            return Ok(Arc::clone(connection));
        }

        // Double-checked: another caller may have built the connection while
        // we waited for the creation lock.
        let _creating = self.creation_lock.lock().await;
        if let Some(connection) = self.connections.read().await.get(account) {
            return Ok(Arc::clone(connection));
        }

        info!("Creating session connection for {}", account.name);
        let connection =
            build_authenticated_connection(self.store.as_ref(), self.provider.as_ref(), account)
                .await?;
        accounts::restore_cookies(self.store.as_ref(), account, &connection).await?;

        self.connections
            .write()
            .await
            .insert(account.clone(), Arc::clone(&connection));
        Ok(connection)
    }

    async fn remove_connection_for(&self, account: &AccountId) -> Option<Arc<Connection>> {
        let removed = self.connections.write().await.remove(account);
        if removed.is_some() {
            debug!("Removed cached connection for {}", account.name);
        }
        removed
    }

    async fn save_all_connections(&self, account_type: &str) -> Result<(), SessionError> {
        for (account, connection) in self.cached_connections(account_type).await {
            accounts::save_connection(self.store.as_ref(), &account, &connection).await?;
        }
        Ok(())
    }
}
