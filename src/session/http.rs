//! reqwest-backed ECP session.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, info, instrument};

use super::{
    AuthRequest, AuthenticationError, Authenticator, EcpSession, SessionError, SessionResponse,
    TransportError, UnconfiguredAuthenticator,
};
use crate::config::{CONNECT_TIMEOUT_SECS, EcpConfig, READ_TIMEOUT_SECS, format_endpoint_url};
use crate::cookies::{CookieError, CookieJar, CookiePersistence, SaveOptions, load_cookie_jar};
use crate::user_agent;

/// HTTP session whose cookie jar persists across runs.
///
/// Build one with [`HttpSession::builder`] or [`HttpSession::from_config`];
/// call [`close`](Self::close) when done so cookies are written back when
/// the session was opened with `store_cookies`.
pub struct HttpSession {
    client: Client,
    jar: Arc<CookieJar>,
    idp: Option<String>,
    username: Option<String>,
    authenticator: Arc<dyn Authenticator>,
    store_path: Option<PathBuf>,
}

impl fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSession")
            .field("idp", &self.idp)
            .field("username", &self.username)
            .field("cookies", &self.jar.len())
            .field("store_path", &self.store_path)
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    /// Starts building a session.
    #[must_use]
    pub fn builder() -> HttpSessionBuilder {
        HttpSessionBuilder::default()
    }

    /// Opens a session from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Client`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &EcpConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, SessionError> {
        let mut builder = Self::builder()
            .username(config.username.clone())
            .cookie_file(config.cookie_file.clone())
            .store_cookies(config.store_cookies)
            .authenticator(authenticator)
            .timeouts(config.connect_timeout_secs, config.read_timeout_secs);
        if let Some(idp) = &config.idp {
            builder = builder.idp(idp);
        }
        builder.build()
    }

    /// The normalised IdP ECP endpoint, if configured.
    #[must_use]
    pub fn idp(&self) -> Option<&str> {
        self.idp.as_deref()
    }

    /// The underlying HTTP client (cookie provider = this session's jar).
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Shared handle to the session's cookie jar.
    #[must_use]
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        Arc::clone(&self.jar)
    }

    /// Ends the session, saving cookies if it was opened with `store_cookies`.
    ///
    /// Every cookie is written, including discardable and expired ones.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Io`] if the cookie file cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn close(self) -> Result<(), CookieError> {
        let Some(path) = self.store_path else {
            return Ok(());
        };
        self.jar.save_to(&path, SaveOptions::keep_all())?;
        info!(path = %path.display(), cookies = self.jar.len(), "Stored session cookies");
        Ok(())
    }
}

#[async_trait]
impl EcpSession for HttpSession {
    fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    fn idp(&self) -> Option<&str> {
        self.idp.as_deref()
    }

    async fn ecp_authenticate(&mut self, url: &str) -> Result<(), AuthenticationError> {
        let idp = self
            .idp
            .as_deref()
            .ok_or(AuthenticationError::MissingEndpoint)?;
        let request = AuthRequest {
            idp,
            sp_url: url,
            username: self.username.as_deref(),
        };
        info!(idp, sp_url = url, "Authenticating with ECP");
        self.authenticator
            .authenticate(&self.client, &request)
            .await?;
        debug!(cookies = self.jar.len(), "ECP authentication finished");
        Ok(())
    }

    async fn post(
        &mut self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<SessionResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(url, e))?
            .to_vec();
        debug!(status, bytes = body.len(), "POST response received");

        Ok(SessionResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Builder for [`HttpSession`].
pub struct HttpSessionBuilder {
    idp: Option<String>,
    username: Option<String>,
    cookie_jar: Option<CookieJar>,
    cookie_file: Option<PathBuf>,
    store_cookies: bool,
    authenticator: Arc<dyn Authenticator>,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
}

impl Default for HttpSessionBuilder {
    fn default() -> Self {
        Self {
            idp: None,
            username: None,
            cookie_jar: None,
            cookie_file: None,
            store_cookies: false,
            authenticator: Arc::new(UnconfiguredAuthenticator),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl HttpSessionBuilder {
    /// IdP endpoint; a bare host name expands to its standard ECP endpoint.
    #[must_use]
    pub fn idp(mut self, idp: impl AsRef<str>) -> Self {
        self.idp = Some(format_endpoint_url(idp.as_ref()));
        self
    }

    /// Login name passed to the authenticator.
    #[must_use]
    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Seeds the session with an existing jar instead of the cookie file.
    #[must_use]
    pub fn cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Cookie file to seed the jar from (read leniently).
    #[must_use]
    pub fn cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookie_file = path;
        self
    }

    /// Whether [`HttpSession::close`] writes the jar back to the cookie file.
    #[must_use]
    pub fn store_cookies(mut self, store: bool) -> Self {
        self.store_cookies = store;
        self
    }

    /// ECP handshake implementation.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Connect and total request timeouts in seconds.
    #[must_use]
    pub fn timeouts(mut self, connect_secs: u64, read_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Client`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(self), fields(idp = ?self.idp))]
    pub fn build(self) -> Result<HttpSession, SessionError> {
        let jar = match (self.cookie_jar, &self.cookie_file) {
            (Some(jar), _) => jar,
            (None, Some(path)) => load_cookie_jar(path, false).unwrap_or_default(),
            (None, None) => CookieJar::new(),
        };
        debug!(cookies = jar.len(), "session cookie jar ready");
        let jar = Arc::new(jar);

        let client = base_client_builder(
            Arc::clone(&jar),
            self.connect_timeout_secs,
            self.read_timeout_secs,
        )
        .build()?;

        let store_path = if self.store_cookies {
            self.cookie_file
        } else {
            None
        };

        Ok(HttpSession {
            client,
            jar,
            idp: self.idp,
            username: self.username,
            authenticator: self.authenticator,
            store_path,
        })
    }
}

fn base_client_builder(
    jar: Arc<CookieJar>,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .cookie_provider(jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{Cookie, LoadOptions, has_session_cookie};
    use tempfile::TempDir;

    struct AcceptingAuthenticator;

    #[async_trait]
    impl Authenticator for AcceptingAuthenticator {
        async fn authenticate(
            &self,
            _client: &Client,
            _request: &AuthRequest<'_>,
        ) -> Result<(), AuthenticationError> {
            Ok(())
        }
    }

    fn write_cookie_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("cookies.txt");
        let jar = CookieJar::from_cookies([Cookie::new("sp.example.org", "_shibsession_x", "abc")]);
        jar.save_to(&path, SaveOptions::keep_all()).unwrap();
        path
    }

    #[test]
    fn test_build_loads_cookie_file() {
        let dir = TempDir::new().unwrap();
        let path = write_cookie_file(&dir);

        let session = HttpSession::builder().cookie_file(Some(path)).build().unwrap();
        assert!(has_session_cookie(
            session.cookies(),
            "https://sp.example.org/secure"
        ));
    }

    #[test]
    fn test_build_tolerates_missing_or_malformed_cookie_file() {
        let dir = TempDir::new().unwrap();
        let session = HttpSession::builder()
            .cookie_file(Some(dir.path().join("absent.txt")))
            .build()
            .unwrap();
        assert!(session.cookies().is_empty());

        let garbage = dir.path().join("garbage.txt");
        std::fs::write(&garbage, "not a cookie file\n").unwrap();
        let session = HttpSession::builder().cookie_file(Some(garbage)).build().unwrap();
        assert!(session.cookies().is_empty());
    }

    #[test]
    fn test_explicit_jar_wins_over_cookie_file() {
        let dir = TempDir::new().unwrap();
        let path = write_cookie_file(&dir);
        let session = HttpSession::builder()
            .cookie_jar(CookieJar::new())
            .cookie_file(Some(path))
            .build()
            .unwrap();
        assert!(session.cookies().is_empty());
    }

    #[test]
    fn test_close_stores_cookies_only_when_requested() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.txt");

        let session = HttpSession::builder()
            .cookie_file(Some(path.clone()))
            .build()
            .unwrap();
        session.cookies().insert(Cookie::new("sp.example.org", "_shibsession_x", "abc"));
        session.close().unwrap();
        assert!(!path.exists(), "store_cookies=false must not write");

        let session = HttpSession::builder()
            .cookie_file(Some(path.clone()))
            .store_cookies(true)
            .build()
            .unwrap();
        session
            .cookies()
            .insert(Cookie::new("sp.example.org", "_shibsession_x", "abc").with_discard(true));
        session.close().unwrap();

        let reloaded = CookieJar::load_from(&path, LoadOptions::keep_all()).unwrap();
        assert_eq!(reloaded.len(), 1, "discardable cookies are kept on close");
    }

    #[test]
    fn test_idp_host_is_expanded() {
        let session = HttpSession::builder().idp("login.example.org").build().unwrap();
        assert_eq!(
            session.idp(),
            Some("https://login.example.org/idp/profile/SAML2/SOAP/ECP")
        );
    }

    #[tokio::test]
    async fn test_ecp_authenticate_without_idp_fails() {
        let mut session = HttpSession::builder().build().unwrap();
        let err = session
            .ecp_authenticate("https://sp.example.org/")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthenticationError::MissingEndpoint));
    }

    #[tokio::test]
    async fn test_ecp_authenticate_default_authenticator_unavailable() {
        let mut session = HttpSession::builder().idp("login.example.org").build().unwrap();
        let err = session
            .ecp_authenticate("https://sp.example.org/")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthenticationError::Unavailable { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn test_ecp_authenticate_delegates_to_authenticator() {
        let mut session = HttpSession::builder()
            .idp("https://idp.example.org/ecp")
            .authenticator(Arc::new(AcceptingAuthenticator))
            .build()
            .unwrap();
        session
            .ecp_authenticate("https://sp.example.org/")
            .await
            .unwrap();
    }
}
