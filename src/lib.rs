//! # yatra-session
//!
//! Session layer for the SmartYatra bus-ticketing client.
//!
//! Persists the access/refresh token pair, tracks whether the user is logged
//! in, guards navigation on that state, and transparently recovers from an
//! expired access token with a single shared refresh exchange.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use yatra_session::{ApiRequest, Credentials, YatraClient};
//!
//! # async fn example() -> yatra_session::Result<()> {
//! let client = YatraClient::builder()
//!     .base_url("https://backend.shaslolav.space/api/auth/")
//!     .build()?;
//!
//! client.initialize().await?;
//! client.sign_in(Credentials::new("rider@example.com", "secret")).await?;
//!
//! let response = client.request(&ApiRequest::get("profile/")).await?;
//! println!("{} {}", response.status, response.data);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod routes;
pub mod storage;

pub use auth::{AuthApi, AuthSession, AuthState, Credentials, Profile, RefreshCoordinator, Registration};
pub use client::{ApiRequest, ApiResponse, SessionClient, YatraClient, YatraClientBuilder};
pub use error::{Error, Result};
pub use routes::{NavigationAction, Navigator, Route, RouteZone, Tab, evaluate};
pub use storage::{KeyValueStore, TokenPair, TokenStore};
