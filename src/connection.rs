use std::time::Duration;

use reqwest::{Client, Method, Response};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::capabilities::ServerVersion;
use crate::errors::SessionError;

/// One cookie as the connection tracks it. Only name and value are ever
/// persisted; domain and path are re-derived from the connection URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// Ordered cookie set for one connection.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Adds a cookie, replacing an existing one with the same name in place
    /// so the jar keeps its insertion order.
    pub fn add(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Value for a `Cookie:` request header, `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Serializes the jar to the persisted `name=value;name=value` form.
    pub fn to_persisted_string(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Restores cookies from the persisted form. Pairs without an `=` are
    /// skipped with a warning; a single bad pair never aborts the restore.
    pub fn restore_from_persisted(&mut self, persisted: &str, domain: &str, path: &str) {
        for pair in persisted.split(';') {
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    self.add(Cookie {
                        name: name.to_string(),
                        value: value.to_string(),
                        domain: domain.to_string(),
                        path: path.to_string(),
                    });
                }
                _ => {
                    warn!("Skipping malformed persisted cookie pair: '{}'", pair);
                }
            }
        }
    }
}

/// Per-request read timeout plus the connect timeout applied when the
/// underlying client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub read: Duration,
    pub connect: Duration,
}

impl RequestTimeouts {
    pub const fn new(read: Duration, connect: Duration) -> Self {
        Self { read, connect }
    }
}

#[derive(Debug, Default)]
struct ConnectionState {
    auth_header: Option<String>,
    username: Option<String>,
    preemptive: bool,
    cookies: CookieJar,
}

/// One authenticated link to a server: base URL, capability-resolved WebDAV
/// URL, server version, and the wrapped HTTP client.
///
/// Auth header and cookie jar live behind a single mutex; credential
/// application swaps them atomically and request assembly snapshots them
/// under the same lock, so a credential swap can never interleave with
/// header construction for an in-flight request.
pub struct Connection {
    base_url: Url,
    webdav_url: Url,
    version: ServerVersion,
    client: Client,
    state: Mutex<ConnectionState>,
}

impl Connection {
    pub fn new(
        base_url: &str,
        webdav_path: &str,
        version: ServerVersion,
        connect_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let invalid_url = |url: &str, e: url::ParseError| SessionError::InvalidBaseUrl {
            url: url.to_string(),
            details: e.to_string(),
        };

        let base = Url::parse(base_url).map_err(|e| invalid_url(base_url, e))?;
        // The WebDAV endpoint hangs off the full base URL, including any
        // installation sub-path, so plain concatenation is deliberate here.
        let webdav = format!("{}{}", base_url.trim_end_matches('/'), webdav_path);
        let webdav = Url::parse(&webdav).map_err(|e| invalid_url(&webdav, e))?;

        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self {
            base_url: base,
            webdav_url: webdav,
            version,
            client,
            state: Mutex::new(ConnectionState::default()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn webdav_url(&self) -> &Url {
        &self.webdav_url
    }

    pub fn version(&self) -> ServerVersion {
        self.version
    }

    /// Host the connection's cookies belong to.
    pub fn cookie_domain(&self) -> String {
        self.webdav_url
            .host_str()
            .or_else(|| self.base_url.host_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Path the connection's cookies are scoped to.
    pub fn cookie_path(&self) -> String {
        self.webdav_url.path().to_string()
    }

    /// Atomically clears any previously installed auth state and cookies,
    /// then installs the new state. Used by `Credentials::apply_to`.
    pub(crate) async fn swap_auth_state(
        &self,
        auth_header: Option<String>,
        username: Option<String>,
        preemptive: bool,
        cookies: Vec<Cookie>,
    ) {
        let mut state = self.state.lock().await;
        state.auth_header = auth_header;
        state.username = username;
        state.preemptive = preemptive;
        state.cookies.clear();
        for cookie in cookies {
            state.cookies.add(cookie);
        }
    }

    /// Clears auth header, username and cookies.
    pub async fn clear_auth(&self) {
        let mut state = self.state.lock().await;
        *state = ConnectionState::default();
    }

    pub async fn username(&self) -> Option<String> {
        self.state.lock().await.username.clone()
    }

    pub async fn is_preemptive(&self) -> bool {
        self.state.lock().await.preemptive
    }

    pub async fn has_auth_header(&self) -> bool {
        self.state.lock().await.auth_header.is_some()
    }

    pub async fn add_cookie(&self, cookie: Cookie) {
        self.state.lock().await.cookies.add(cookie);
    }

    pub async fn cookies(&self) -> Vec<Cookie> {
        self.state.lock().await.cookies.iter().cloned().collect()
    }

    /// Serialized jar in the persisted `name=value;...` format.
    pub async fn cookies_string(&self) -> String {
        self.state.lock().await.cookies.to_persisted_string()
    }

    /// Restores a persisted cookie string into the jar, deriving domain and
    /// path from the connection's URLs.
    pub async fn restore_cookies_from(&self, persisted: &str) {
        let domain = self.cookie_domain();
        let path = self.cookie_path();
        let mut state = self.state.lock().await;
        state.cookies.restore_from_persisted(persisted, &domain, &path);
    }

    /// Issues one request against the server with the connection's current
    /// auth header and cookies attached, then folds any `Set-Cookie`
    /// response headers back into the jar.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
        timeouts: RequestTimeouts,
    ) -> reqwest::Result<Response> {
        let (auth_header, cookie_header) = {
            let state = self.state.lock().await;
            (state.auth_header.clone(), state.cookies.header_value())
        };

        let mut request = self.client.request(method, url).timeout(timeouts.read);
        if let Some(auth) = auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(cookies) = cookie_header {
            request = request.header(reqwest::header::COOKIE, cookies);
        }
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        self.ingest_set_cookies(&response).await;
        Ok(response)
    }

    async fn ingest_set_cookies(&self, response: &Response) {
        let domain = self.cookie_domain();
        let path = self.cookie_path();
        let mut state = self.state.lock().await;
        for header in response.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            // Only the name=value prefix matters to the jar; attributes are
            // re-derived from the connection URLs on restore anyway.
            let pair = raw.split(';').next().unwrap_or(raw);
            if let Some((name, value)) = pair.split_once('=') {
                debug!("Storing session cookie '{}'", name.trim());
                state.cookies.add(Cookie {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                    domain: domain.clone(),
                    path: path.clone(),
                });
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url.as_str())
            .field("webdav_url", &self.webdav_url.as_str())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: "cloud.example.com".to_string(),
            path: "/remote.php/dav".to_string(),
        }
    }

    #[test]
    fn jar_replaces_same_name_in_place() {
        let mut jar = CookieJar::default();
        jar.add(cookie("session", "one"));
        jar.add(cookie("token", "abc"));
        jar.add(cookie("session", "two"));

        let names: Vec<_> = jar.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["session", "token"]);
        assert_eq!(jar.iter().next().unwrap().value, "two");
    }

    #[test]
    fn jar_persists_and_restores_name_value_pairs() {
        let mut jar = CookieJar::default();
        jar.add(cookie("session", "abc123"));
        jar.add(cookie("remember", "yes"));

        let persisted = jar.to_persisted_string();
        assert_eq!(persisted, "session=abc123;remember=yes");

        let mut restored = CookieJar::default();
        restored.restore_from_persisted(&persisted, "other.example.com", "/files/webdav.php");

        let pairs: Vec<_> = restored
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("session".to_string(), "abc123".to_string()),
                ("remember".to_string(), "yes".to_string())
            ]
        );
        assert!(restored.iter().all(|c| c.domain == "other.example.com"));
    }

    #[test]
    fn restore_skips_malformed_pairs_without_aborting() {
        let mut jar = CookieJar::default();
        jar.restore_from_persisted("good=1;broken;=nameless;also_good=2", "host", "/");

        let names: Vec<_> = jar.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["good", "also_good"]);
    }

    #[test]
    fn cookie_values_may_contain_equals_signs() {
        let mut jar = CookieJar::default();
        jar.restore_from_persisted("token=a=b=c", "host", "/");
        assert_eq!(jar.iter().next().unwrap().value, "a=b=c");
    }

    #[test]
    fn webdav_url_is_base_plus_resolved_path() {
        let conn = Connection::new(
            "https://cloud.example.com/sub",
            "/remote.php/dav",
            ServerVersion::new(10, 0, 0),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            conn.webdav_url().as_str(),
            "https://cloud.example.com/sub/remote.php/dav"
        );
        assert_eq!(conn.cookie_domain(), "cloud.example.com");
        assert_eq!(conn.cookie_path(), "/sub/remote.php/dav");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = Connection::new(
            "not a url",
            "/remote.php/dav",
            ServerVersion::MINIMUM_SUPPORTED,
            Duration::from_secs(5),
        );
        assert!(matches!(
            result,
            Err(crate::errors::SessionError::InvalidBaseUrl { .. })
        ));
    }
}
