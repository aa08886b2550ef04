use base64ct::{Base64, Encoding};
use tracing::debug;

use crate::accounts::{AccountId, AccountStore, AuthTokenKind, CredentialsProvider};
use crate::capabilities::ServerVersion;
use crate::connection::{Connection, Cookie};
use crate::errors::SessionError;

/// One authentication scheme and the data needed to apply it.
///
/// A closed set: servers either take no auth, HTTP Basic, an OAuth2 bearer
/// token, or a SAML SSO session cookie. Exhaustive matches keep every
/// operation in sync when a scheme is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    Basic {
        username: String,
        password: String,
        preemptive: bool,
    },
    Bearer {
        token: String,
    },
    SamlSso {
        username: String,
        session_cookie: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>, preemptive: bool) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
            preemptive,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn saml_sso(username: impl Into<String>, session_cookie: impl Into<String>) -> Self {
        Credentials::SamlSso {
            username: username.into(),
            session_cookie: session_cookie.into(),
        }
    }

    /// The raw token backing this scheme; empty for Anonymous.
    pub fn auth_token(&self) -> &str {
        match self {
            Credentials::Anonymous => "",
            Credentials::Basic { password, .. } => password,
            Credentials::Bearer { token } => token,
            Credentials::SamlSso { session_cookie, .. } => session_cookie,
        }
    }

    /// Whether the backing token can expire and require a refresh.
    pub fn auth_token_expires(&self) -> bool {
        matches!(
            self,
            Credentials::Bearer { .. } | Credentials::SamlSso { .. }
        )
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::Anonymous | Credentials::Bearer { .. } => None,
            Credentials::Basic { username, .. } => Some(username),
            Credentials::SamlSso { username, .. } => Some(username),
        }
    }

    /// Installs this credential on a connection.
    ///
    /// The swap is atomic: previously applied auth state and cookies are
    /// cleared before the new state lands, so re-authentication can never
    /// leak a stale header or session cookie. Applying the same credential
    /// twice leaves the connection in the same state as applying it once.
    pub async fn apply_to(&self, connection: &Connection) {
        match self {
            Credentials::Anonymous => {
                connection.swap_auth_state(None, None, false, Vec::new()).await;
            }
            Credentials::Basic {
                username,
                password,
                preemptive,
            } => {
                let encoded = Base64::encode_string(format!("{username}:{password}").as_bytes());
                connection
                    .swap_auth_state(
                        Some(format!("Basic {encoded}")),
                        Some(username.clone()),
                        *preemptive,
                        Vec::new(),
                    )
                    .await;
            }
            Credentials::Bearer { token } => {
                connection
                    .swap_auth_state(Some(format!("Bearer {token}")), None, true, Vec::new())
                    .await;
            }
            Credentials::SamlSso {
                username,
                session_cookie,
            } => {
                let domain = connection.cookie_domain();
                let path = connection.cookie_path();
                let cookies = session_cookie
                    .split(';')
                    .filter_map(|pair| pair.split_once('='))
                    .filter(|(name, _)| !name.is_empty())
                    .map(|(name, value)| Cookie {
                        name: name.trim().to_string(),
                        value: value.trim().to_string(),
                        domain: domain.clone(),
                        path: path.clone(),
                    })
                    .collect();
                connection
                    .swap_auth_state(None, Some(username.clone()), false, cookies)
                    .await;
            }
        }
    }
}

/// Builds the right credential for an account from its cached metadata.
///
/// OAuth2-capable accounts get a bearer token, SAML accounts a session
/// cookie, everything else basic auth with the preemptive flag taken from
/// the account's server version (missing version means the minimum
/// supported one). Token retrieval may block on interactive
/// re-authentication; its failures, including cancellation, propagate
/// untouched.
pub async fn credentials_for_account(
    store: &dyn AccountStore,
    provider: &dyn CredentialsProvider,
    account: &AccountId,
) -> Result<Credentials, SessionError> {
    use crate::accounts::keys;

    let supports_oauth2 = store.get_field(account, keys::SUPPORTS_OAUTH2)?.is_some();
    let supports_saml_sso = store.get_field(account, keys::SUPPORTS_SAML_SSO)?.is_some();

    let version_string = store.get_field(account, keys::SERVER_VERSION)?;
    let version = ServerVersion::parse_or_minimum(version_string.as_deref());
    let username = account.username();

    let credentials = if supports_oauth2 {
        debug!("Building bearer credentials for {}", account.name);
        let token = provider
            .auth_token(account, AuthTokenKind::AccessToken)
            .await?;
        Credentials::bearer(token)
    } else if supports_saml_sso {
        debug!("Building SAML SSO credentials for {}", account.name);
        let session_cookie = provider
            .auth_token(account, AuthTokenKind::SamlSessionCookie)
            .await?;
        Credentials::saml_sso(username, session_cookie)
    } else {
        debug!(
            "Building basic credentials for {} (server {})",
            account.name, version
        );
        let password = provider.auth_token(account, AuthTokenKind::Password).await?;
        Credentials::basic(username, password, version.prefers_preemptive_auth())
    };

    Ok(credentials)
}
