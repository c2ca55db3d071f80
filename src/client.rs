//! Main client entry point.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::api::{PROFILE_PATH, parse_success};
use crate::auth::refresh::REFRESH_TIMEOUT;
use crate::auth::{AuthApi, AuthSession, AuthState, Credentials, Profile, RefreshCoordinator, Registration};
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::error::{Error, Result};
use crate::net::{HttpClient, HttpRequest, Transport};
use crate::routes::Navigator;
use crate::storage::{KeyValueStore, MemoryStore, TokenStore};

pub use crate::net::HttpResponse as ApiResponse;

/// A backend call without credentials; the session attaches them.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends guarded requests with the stored access token.
///
/// A 401 triggers exactly one refresh-and-retry cycle through the
/// [`RefreshCoordinator`]. Every other status is handed back unchanged.
pub struct SessionClient {
    api: AuthApi,
    session: Arc<AuthSession>,
    refresh: RefreshCoordinator,
}

impl SessionClient {
    pub fn new(api: AuthApi, session: Arc<AuthSession>, refresh: RefreshCoordinator) -> Self {
        Self {
            api,
            session,
            refresh,
        }
    }

    /// Send `request` with credentials attached.
    ///
    /// Fails with [`Error::SessionExpired`] without touching the network when
    /// no session is stored. Transport errors (including timeouts) are
    /// returned as-is and never trigger a refresh. If the retry after a
    /// successful refresh is rejected too, that 401 response is returned.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let Some(pair) = self.session.tokens().load_pair().await? else {
            debug!(path = %request.path, "No stored session");
            self.session.expire();
            return Err(Error::SessionExpired);
        };

        let response = self.send_with_token(request, &pair.access).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!(path = %request.path, "Access token rejected; refreshing");
        let access = self.refresh.refresh(&pair.access).await?;

        let retried = self.send_with_token(request, &access).await?;
        if retried.is_unauthorized() {
            warn!(path = %request.path, "Request rejected again after refresh");
        }
        Ok(retried)
    }

    /// Send `request` and deserialize a 2xx body into `T`.
    ///
    /// Any other final status becomes [`Error::Api`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        parse_success(response, &request.path)
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    async fn send_with_token(&self, request: &ApiRequest, access: &str) -> Result<ApiResponse> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {access}"))
            .map_err(|_| Error::Protocol("access token is not a valid header value".into()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let http_request = HttpRequest {
            method: request.method.clone(),
            url: self.api.endpoint(&request.path)?,
            headers,
            body: request.body.clone(),
        };
        self.api.transport().send(http_request).await
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("api", &self.api)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// SmartYatra session client.
///
/// Wires storage, transport, session state and refresh together and exposes
/// the operations screens need.
///
/// # Examples
///
/// ```rust,no_run
/// use yatra_session::{Credentials, YatraClient};
///
/// # async fn example() -> yatra_session::Result<()> {
/// let client = YatraClient::builder().build()?;
/// client.initialize().await?;
/// client.sign_in(Credentials::new("rider@example.com", "secret")).await?;
///
/// let profile = client.fetch_profile().await?;
/// println!("{}", profile.email);
/// # Ok(())
/// # }
/// ```
pub struct YatraClient {
    api: AuthApi,
    session: Arc<AuthSession>,
    http: SessionClient,
}

impl YatraClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> YatraClientBuilder {
        YatraClientBuilder::new()
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        YatraClientBuilder::from_config(config)?.build()
    }

    /// Resolve the startup auth state from storage. Never touches the network.
    pub async fn initialize(&self) -> Result<AuthState> {
        self.session.initialize().await
    }

    /// Log in and persist the issued token pair.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<()> {
        let pair = self.api.login(&credentials).await?;
        self.session.login(pair).await?;
        info!(email = %credentials.email, "Signed in");
        Ok(())
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&self, registration: Registration) -> Result<()> {
        self.api.register(&registration).await?;
        self.sign_in(registration.credentials()).await
    }

    /// Forget the stored session.
    pub async fn sign_out(&self) -> Result<()> {
        self.session.logout().await?;
        info!("Signed out");
        Ok(())
    }

    /// Profile of the logged-in account.
    pub async fn fetch_profile(&self) -> Result<Profile> {
        self.http.send_json(&ApiRequest::get(PROFILE_PATH)).await
    }

    /// Send a guarded request. See [`SessionClient::send`].
    pub async fn request(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.http.send(request).await
    }

    /// Send a guarded request and deserialize its body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        self.http.send_json(request).await
    }

    /// A navigator following this client's auth state.
    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.session.subscribe())
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn http(&self) -> &SessionClient {
        &self.http
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }
}

impl std::fmt::Debug for YatraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YatraClient")
            .field("api", &self.api)
            .field("state", &self.session.state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`YatraClient`].
pub struct YatraClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn Transport>>,
    refresh_timeout: Duration,
}

impl YatraClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            store: None,
            transport: None,
            refresh_timeout: REFRESH_TIMEOUT,
        }
    }

    /// Builder preloaded with the API, storage and timeout settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpClient::builder()
            .user_agent(&config.api.user_agent)
            .connect_timeout(Duration::from_secs(config.api.connect_timeout_secs))
            .request_timeout(Duration::from_secs(config.api.request_timeout_secs))
            .build()?;

        Ok(Self::new()
            .base_url(config.api.base_url.clone())
            .store(config.storage.open()?)
            .transport(Arc::new(transport))
            .refresh_timeout(Duration::from_secs(config.api.refresh_timeout_secs)))
    }

    /// Set the API base URL. A missing trailing `/` is added.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the storage backend for the token pair.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the upper bound for one refresh exchange.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// Without an explicit store the session lives in memory only.
    pub fn build(self) -> Result<YatraClient> {
        let base_url = parse_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpClient::new()?),
        };
        let store = self.store.unwrap_or_else(|| {
            warn!("No storage backend configured; session will not persist");
            Arc::new(MemoryStore::new())
        });

        let api = AuthApi::new(transport, base_url);
        let session = Arc::new(AuthSession::new(Arc::new(TokenStore::new(store))));
        let refresh =
            RefreshCoordinator::new(api.clone(), session.clone()).with_timeout(self.refresh_timeout);
        let http = SessionClient::new(api.clone(), session.clone(), refresh);

        debug!(base_url = %api.base_url(), "Client built");
        Ok(YatraClient { api, session, http })
    }
}

impl Default for YatraClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an API base URL, enforcing a trailing `/` so endpoints join beneath it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid API base URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "API base URL must be http or https, got {:?}",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenPair;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn logged_in_client(server: &MockServer) -> YatraClient {
        let store = Arc::new(MemoryStore::with_entries([("access", "A1"), ("refresh", "R1")]));
        let client = YatraClient::builder()
            .base_url(format!("{}/api/auth", server.uri()))
            .store(store)
            .build()
            .unwrap();
        client.initialize().await.unwrap();
        client
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("https://backend.example/api/auth").unwrap().as_str(),
            "https://backend.example/api/auth/"
        );
        assert_eq!(
            parse_base_url("https://backend.example/api/auth/").unwrap().as_str(),
            "https://backend.example/api/auth/"
        );
        assert!(matches!(parse_base_url("not a url"), Err(Error::Config(_))));
        assert!(matches!(parse_base_url("ftp://backend.example/"), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_request_constructors() {
        let req = ApiRequest::post("tickets/", json!({"seat": 4}));
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body, Some(json!({"seat": 4})));
        assert_eq!(ApiRequest::get("profile/").body, None);
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/profile/"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "rider@example.com"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let profile = client.fetch_profile().await.unwrap();
        assert_eq!(profile.email, "rider@example.com");
    }

    #[tokio::test]
    async fn test_non_401_failure_is_returned_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/tickets/"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
            .expect(0)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let response = client.request(&ApiRequest::get("tickets/")).await.unwrap();
        assert_eq!(response.status, 404);

        let err = client
            .send_json::<Value>(&ApiRequest::get("tickets/"))
            .await;
        assert!(matches!(err, Err(Error::Api { status: 404, ref message }) if message == "Not found."));
    }

    #[tokio::test]
    async fn test_no_session_means_no_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = YatraClient::builder()
            .base_url(server.uri())
            .store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        assert_eq!(client.initialize().await.unwrap(), AuthState::Unauthenticated);
        assert!(matches!(
            client.request(&ApiRequest::get("profile/")).await,
            Err(Error::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_register_then_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A1", "refresh": "R1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = YatraClient::builder()
            .base_url(format!("{}/api/auth/", server.uri()))
            .build()
            .unwrap();
        client.initialize().await.unwrap();
        client
            .register(Registration::new("rider@example.com", "Asha", "Rai", "9800000000", "pw"))
            .await
            .unwrap();

        assert_eq!(client.state(), AuthState::Authenticated);
        assert_eq!(
            client.session().tokens().load_pair().await.unwrap(),
            Some(TokenPair::new("A1", "R1"))
        );
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "No active account"})))
            .mount(&server)
            .await;

        let client = YatraClient::builder()
            .base_url(format!("{}/api/auth/", server.uri()))
            .build()
            .unwrap();
        client.initialize().await.unwrap();
        let err = client
            .sign_in(Credentials::new("rider@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(err.requires_reauth());
        assert_eq!(client.state(), AuthState::Unauthenticated);
    }
}
