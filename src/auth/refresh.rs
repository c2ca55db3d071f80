//! Single-flight refresh token exchange.
//!
//! Every caller that saw the same access token rejected shares one call to
//! the refresh endpoint. The exchange runs on its own task, so a caller that
//! gives up waiting never leaves the in-flight slot occupied.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::api::AuthApi;
use super::session::AuthSession;
use crate::error::{Error, Result};

/// Default upper bound for one refresh exchange.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

/// In-flight exchange tagged with the generation that started it.
type Slot = Option<(u64, SharedRefresh)>;

/// Owns the refresh-token exchange for one session.
pub struct RefreshCoordinator {
    api: AuthApi,
    session: Arc<AuthSession>,
    timeout: Duration,
    in_flight: Arc<Mutex<Slot>>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(api: AuthApi, session: Arc<AuthSession>) -> Self {
        Self {
            api,
            session,
            timeout: REFRESH_TIMEOUT,
            in_flight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Bound each exchange by `timeout` instead of [`REFRESH_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an exchange is currently running.
    pub async fn is_in_flight(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    /// Obtain a fresh access token to replace `rejected_access`.
    ///
    /// Returns the stored token without a network call when someone else
    /// already replaced `rejected_access`. Fails with
    /// [`Error::SessionExpired`] when no pair is stored or the backend
    /// rejects the refresh token; in the latter case the store is cleared and
    /// the session becomes `Unauthenticated`. Transport failures, timeouts,
    /// throttling (408/429) and 5xx answers leave the session untouched.
    pub async fn refresh(&self, rejected_access: &str) -> Result<String> {
        let shared = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some((generation, pending)) => {
                    debug!(generation, "Joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    let Some(pair) = self.session.tokens().load_pair().await? else {
                        debug!("No stored session; refusing to refresh");
                        self.session.expire();
                        return Err(Error::SessionExpired);
                    };
                    if pair.access != rejected_access {
                        debug!("Access token already replaced");
                        return Ok(pair.access);
                    }

                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let pending = self.spawn_exchange(generation, pair.refresh);
                    *slot = Some((generation, pending.clone()));
                    pending
                }
            }
        };
        shared.await
    }

    fn spawn_exchange(&self, generation: u64, refresh_token: String) -> SharedRefresh {
        let api = self.api.clone();
        let session = self.session.clone();
        let slot = self.in_flight.clone();
        let timeout = self.timeout;

        debug!(generation, "Starting refresh exchange");
        let handle = tokio::spawn(async move {
            let outcome = exchange(&api, &session, timeout, &refresh_token).await;

            let mut slot = slot.lock().await;
            if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
                *slot = None;
            }
            outcome
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Error::Network(format!("refresh task aborted: {e}"))))
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("api", &self.api)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The backend refused the refresh token itself.
///
/// 408 and 429 are answers about the request, not the token.
fn is_terminal(err: &Error) -> bool {
    match err {
        Error::Api { status, .. } => {
            (400..500).contains(status) && !matches!(status, 408 | 429)
        }
        Error::Protocol(_) => true,
        _ => false,
    }
}

async fn exchange(
    api: &AuthApi,
    session: &AuthSession,
    timeout: Duration,
    refresh_token: &str,
) -> Result<String> {
    let tokens = session.tokens();
    let result = match tokio::time::timeout(timeout, api.refresh(refresh_token)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Refresh exchange timed out");
            return Err(Error::Timeout);
        }
    };

    match result {
        Ok(access) => {
            if tokens.replace_access(refresh_token, &access).await? {
                info!("Access token refreshed");
                return Ok(access);
            }
            // Logged out, or logged in again, while the exchange ran.
            match tokens.load_pair().await? {
                Some(pair) => Ok(pair.access),
                None => Err(Error::SessionExpired),
            }
        }
        Err(e) if is_terminal(&e) => {
            warn!(error = %e, "Refresh token rejected; ending session");
            match tokens.clear_if_refresh(refresh_token).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Ok(Some(pair)) = tokens.load_pair().await {
                        debug!("Session replaced by a newer login");
                        return Ok(pair.access);
                    }
                }
                Err(clear_err) => {
                    warn!(error = %clear_err, "Failed to clear tokens after refresh rejection");
                }
            }
            session.expire();
            Err(Error::SessionExpired)
        }
        Err(e) => {
            warn!(error = %e, "Refresh failed; keeping session");
            Err(e)
        }
    }
}
