//! Observable authentication state.
//!
//! [`AuthSession`] is the only writer of [`AuthState`]. Screens read it via
//! [`AuthSession::state`] or follow it with [`AuthSession::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::{TokenPair, TokenStore};

/// Whether the user is logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Startup: the token store has not been read yet.
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Re-entering the current state is allowed and is a no-op. Nothing ever
    /// goes back to `Unknown`.
    #[must_use]
    pub fn can_transition_to(self, next: AuthState) -> bool {
        next != AuthState::Unknown
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Authentication state machine backed by the [`TokenStore`].
pub struct AuthSession {
    tokens: Arc<TokenStore>,
    state: watch::Sender<AuthState>,
}

impl AuthSession {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self { tokens, state }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The token store this session reads and writes.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Resolve `Unknown` by reading the token store once.
    ///
    /// Once resolved, further calls return the current state without touching
    /// storage. A storage failure leaves the state `Unknown`.
    pub async fn initialize(&self) -> Result<AuthState> {
        let current = self.state();
        if current != AuthState::Unknown {
            return Ok(current);
        }

        let resolved = match self.tokens.load_pair().await? {
            Some(_) => AuthState::Authenticated,
            None => AuthState::Unauthenticated,
        };

        // A login or logout that finished while we were reading wins.
        self.state.send_if_modified(|state| {
            if *state == AuthState::Unknown {
                *state = resolved;
                true
            } else {
                false
            }
        });

        let state = self.state();
        info!(state = %state, backend = self.tokens.backend_name(), "Session initialized");
        Ok(state)
    }

    /// Persist `pair` and become `Authenticated`.
    ///
    /// Nothing changes if the pair cannot be stored.
    pub async fn login(&self, pair: TokenPair) -> Result<()> {
        self.tokens.save_pair(&pair).await?;
        self.transition(AuthState::Authenticated, "login");
        Ok(())
    }

    /// Clear the token store and become `Unauthenticated`.
    ///
    /// The transition happens even when clearing fails; the storage error is
    /// still returned to the caller.
    pub async fn logout(&self) -> Result<()> {
        let cleared = self.tokens.clear().await;
        self.transition(AuthState::Unauthenticated, "logout");
        if let Err(e) = &cleared {
            warn!(error = %e, "Failed to clear tokens on logout");
        }
        cleared
    }

    /// Forced logout after the refresh token was rejected.
    pub(crate) fn expire(&self) {
        self.transition(AuthState::Unauthenticated, "session expired");
    }

    fn transition(&self, next: AuthState, reason: &str) -> bool {
        self.state.send_if_modified(|state| {
            if *state == next {
                debug!(state = %next, reason, "Auth state unchanged");
                return false;
            }
            if !state.can_transition_to(next) {
                warn!(from = %state, to = %next, reason, "Rejected invalid auth transition");
                return false;
            }
            info!(from = %state, to = %next, reason, "Auth state changed");
            *state = next;
            true
        })
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.state())
            .field("tokens", &self.tokens)
            .finish()
    }
}
