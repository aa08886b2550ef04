use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::accounts::{self, AccountId, AccountStore, CredentialsProvider};
use crate::connection::Connection;
use crate::errors::SessionError;

use super::{
    prefers_preemptive_auth, ConnectionManager, SimpleFactoryManager, SingleSessionManager,
};

/// Dispatches between the two lifecycle strategies per account.
///
/// Accounts whose cached server version prefers preemptive authentication
/// go through the factory (fresh connection per call); accounts without a
/// cached version, or on servers needing challenge/response or cookie
/// continuity, go through the single-session cache. The decision is
/// re-evaluated on every call, so a version refresh moves an account to the
/// right strategy without restarting.
pub struct DynamicSessionManager {
    store: Arc<dyn AccountStore>,
    single_session: SingleSessionManager,
    simple_factory: SimpleFactoryManager,
}

impl DynamicSessionManager {
    pub fn new(store: Arc<dyn AccountStore>, provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            single_session: SingleSessionManager::new(Arc::clone(&store), Arc::clone(&provider)),
            simple_factory: SimpleFactoryManager::new(Arc::clone(&store), provider),
            store,
        }
    }

    pub fn single_session(&self) -> &SingleSessionManager {
        &self.single_session
    }

    pub fn simple_factory(&self) -> &SimpleFactoryManager {
        &self.simple_factory
    }
}

#[async_trait]
impl ConnectionManager for DynamicSessionManager {
    async fn get_connection_for(
        &self,
        account: &AccountId,
    ) -> Result<Arc<Connection>, SessionError> {
        if prefers_preemptive_auth(self.store.as_ref(), account)? {
            debug!("Dispatching {} to the simple factory", account.name);
            self.simple_factory.get_connection_for(account).await
        } else {
            debug!("Dispatching {} to the single-session cache", account.name);
            self.single_session.get_connection_for(account).await
        }
    }

    async fn remove_connection_for(&self, account: &AccountId) -> Option<Arc<Connection>> {
        let from_factory = self.simple_factory.remove_connection_for(account).await;
        let from_session = self.single_session.remove_connection_for(account).await;

        // At most one strategy may hold a connection per account. Both
        // holding one is a programming error; resolve in favor of the
        // single-session value, which is the canonical one.
        if from_session.is_some() && from_factory.is_some() {
            error!(
                "Both strategies held a connection for {}; preferring the single-session one",
                account.name
            );
        }
        from_session.or(from_factory)
    }

    async fn save_all_connections(&self, account_type: &str) -> Result<(), SessionError> {
        let mut persisted: HashSet<AccountId> = HashSet::new();
        // The factory never caches, so in practice only the single-session
        // strategy contributes; the set keeps persistence at once per
        // account even if that ever changes.
        for (account, connection) in self.single_session.cached_connections(account_type).await {
            if persisted.insert(account.clone()) {
                accounts::save_connection(self.store.as_ref(), &account, &connection).await?;
            }
        }
        self.simple_factory.save_all_connections(account_type).await?;
        Ok(())
    }
}
