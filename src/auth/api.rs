//! Backend authentication endpoints.
//!
//! Unguarded calls (login, register, refresh) go straight to the
//! [`Transport`]; the guarded profile call is made through
//! [`SessionClient`](crate::client::SessionClient).

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use super::credentials::{Credentials, Registration};
use crate::error::{Error, Result};
use crate::net::{HttpRequest, HttpResponse, Transport};
use crate::storage::TokenPair;

pub const LOGIN_PATH: &str = "login/";
pub const REGISTER_PATH: &str = "register/";
pub const REFRESH_PATH: &str = "refresh/";
pub const PROFILE_PATH: &str = "profile/";

/// Account details returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Fields this client does not model (ride counters, wallet, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The backend sends `age` as either a number or a numeric string.
fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Human-readable message for an error response body.
///
/// Prefers the `detail` field, then `message`, then the raw body.
pub fn error_message(data: &Value) -> String {
    for field in ["detail", "message"] {
        if let Some(msg) = data.get(field).and_then(Value::as_str) {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
    }
    match data {
        Value::Null => "empty response".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client for the unauthenticated auth endpoints.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
    base_url: Url,
}

impl AuthApi {
    /// `base_url` must end with `/` so endpoint paths join beneath it.
    pub fn new(transport: Arc<dyn Transport>, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Resolve `path` relative to the API base URL.
    ///
    /// A leading `/` is ignored so `"/profile/"` and `"profile/"` agree.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid endpoint path {path:?}: {e}")))
    }

    /// Exchange credentials for a token pair.
    ///
    /// A 401 means the credentials were rejected and maps to
    /// [`Error::Unauthorized`].
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
        credentials.validate()?;
        let response = self
            .post(LOGIN_PATH, json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .await?;

        if response.is_unauthorized() {
            debug!("Login rejected");
            return Err(Error::Unauthorized);
        }
        let body: LoginResponse = parse_success(response, "login")?;
        if body.access.is_empty() || body.refresh.is_empty() {
            return Err(Error::Protocol("login response carried an empty token".into()));
        }
        Ok(TokenPair::new(body.access, body.refresh))
    }

    /// Create an account. The response body is ignored.
    #[instrument(skip_all, fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        let body = serde_json::to_value(registration)?;
        let response = self.post(REGISTER_PATH, body).await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }
        debug!(status = response.status, "Registration accepted");
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Any non-2xx answer is returned as [`Error::Api`] and an unexpected
    /// body as [`Error::Protocol`]; deciding which of those end the session
    /// is up to the caller.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let response = self
            .post(REFRESH_PATH, json!({ "refresh": refresh_token }))
            .await?;
        let body: RefreshResponse = parse_success(response, "refresh")?;
        if body.access.is_empty() {
            return Err(Error::Protocol("refresh response carried an empty token".into()));
        }
        Ok(body.access)
    }

    async fn post(&self, path: &str, body: Value) -> Result<HttpResponse> {
        let request = HttpRequest {
            method: Method::POST,
            url: self.endpoint(path)?,
            headers: HeaderMap::new(),
            body: Some(body),
        };
        self.transport.send(request).await
    }
}

impl std::fmt::Debug for AuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthApi")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// [`Error::Api`] for a non-2xx response.
pub fn api_error(response: &HttpResponse) -> Error {
    Error::Api {
        status: response.status,
        message: error_message(&response.data),
    }
}

/// Deserialize a 2xx body, or turn a non-2xx response into [`Error::Api`].
pub fn parse_success<T>(response: HttpResponse, what: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !response.is_success() {
        let err = api_error(&response);
        warn!(status = response.status, endpoint = what, "Request failed");
        return Err(err);
    }
    serde_json::from_value(response.data)
        .map_err(|e| Error::Protocol(format!("unexpected {what} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::HttpClient;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_for(server: &MockServer) -> AuthApi {
        let base = Url::parse(&format!("{}/api/auth/", server.uri())).unwrap();
        AuthApi::new(Arc::new(HttpClient::new().unwrap()), base)
    }

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(error_message(&json!({"detail": "No active account", "message": "x"})), "No active account");
        assert_eq!(error_message(&json!({"message": "Bad input"})), "Bad input");
        assert_eq!(
            error_message(&json!({"email": ["already exists"]})),
            r#"{"email":["already exists"]}"#
        );
        assert_eq!(error_message(&json!("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_message(&Value::Null), "empty response");
    }

    #[test]
    fn test_endpoint_ignores_leading_slash() {
        let api = AuthApi::new(
            Arc::new(HttpClient::new().unwrap()),
            Url::parse("https://backend.example/api/auth/").unwrap(),
        );
        assert_eq!(api.endpoint("/profile/").unwrap().as_str(), "https://backend.example/api/auth/profile/");
        assert_eq!(api.endpoint("refresh/").unwrap().as_str(), "https://backend.example/api/auth/refresh/");
    }

    #[test]
    fn test_profile_tolerates_loose_fields() {
        let profile: Profile = serde_json::from_value(json!({
            "email": "rider@example.com",
            "full_name": "Asha Rai",
            "age": "27",
            "total_rides": 25
        }))
        .unwrap();
        assert_eq!(profile.age, Some(27));
        assert_eq!(profile.phone, None);
        assert_eq!(profile.extra["total_rides"], 25);

        let numeric: Profile = serde_json::from_value(json!({"email": "a@b.co", "age": 31})).unwrap();
        assert_eq!(numeric.age, Some(31));
    }

    #[tokio::test]
    async fn test_login_returns_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .and(body_json(json!({"email": "rider@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A1", "refresh": "R1"})))
            .expect(1)
            .mount(&server)
            .await;

        let pair = api_for(&server)
            .await
            .login(&Credentials::new("rider@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(pair, TokenPair::new("A1", "R1"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "No active account"})))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .await
            .login(&Credentials::new("rider@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[tokio::test]
    async fn test_login_bad_shape_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "A1"})))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .await
            .login(&Credentials::new("rider@example.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_hit_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = api_for(&server)
            .await
            .login(&Credentials::new("not-an-email", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_error_uses_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Email taken"})))
            .mount(&server)
            .await;

        let reg = Registration::new("rider@example.com", "Asha", "Rai", "9800000000", "pw");
        let err = api_for(&server).await.register(&reg).await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Email taken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_returns_access() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh/"))
            .and(body_json(json!({"refresh": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(api_for(&server).await.refresh("R1").await.unwrap(), "A2");
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})))
            .mount(&server)
            .await;

        let err = api_for(&server).await.refresh("R1").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 401, .. }));
    }
}
