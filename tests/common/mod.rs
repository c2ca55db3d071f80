//! Shared helpers for the session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yatra_session::storage::MemoryStore;
use yatra_session::{KeyValueStore, YatraClient};

pub const API_PREFIX: &str = "/api/auth";

pub fn base_url(server: &MockServer) -> String {
    format!("{}{API_PREFIX}/", server.uri())
}

/// Store already holding a session, as after an earlier app run.
pub fn seeded_store(access: &str, refresh: &str) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entries([("access", access), ("refresh", refresh)]))
}

pub async fn client_with(server: &MockServer, store: Arc<dyn KeyValueStore>) -> YatraClient {
    let client = YatraClient::builder()
        .base_url(base_url(server))
        .store(store)
        .refresh_timeout(Duration::from_secs(2))
        .build()
        .expect("client builds");
    client.initialize().await.expect("session initializes");
    client
}

/// `GET profile/` answering `status` for requests carrying `Bearer <token>`.
pub fn profile_for(token: &str, status: u16) -> Mock {
    let body = if status == 200 {
        json!({"email": "rider@example.com", "full_name": "Asha Rai"})
    } else {
        json!({"detail": "Given token not valid for any token type"})
    };
    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/profile/")))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
}

/// `POST refresh/` answering with a new access token after `delay`.
pub fn refresh_ok(access: &str, delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path(format!("{API_PREFIX}/refresh/")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": access}))
                .set_delay(delay),
        )
}

pub fn refresh_rejected() -> Mock {
    Mock::given(method("POST"))
        .and(path(format!("{API_PREFIX}/refresh/")))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
}

pub fn login_ok(access: &str, refresh: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path(format!("{API_PREFIX}/login/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": access, "refresh": refresh})))
}
