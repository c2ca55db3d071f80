//! Screen routes and the authentication route guard.

use std::fmt;
use std::str::FromStr;

use tokio::sync::watch;
use tracing::debug;

use crate::auth::AuthState;
use crate::error::{Error, Result};

/// Tab screens reachable after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Home,
    BookTicket,
    Tickets,
    Chatbot,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Home,
        Tab::BookTicket,
        Tab::Tickets,
        Tab::Chatbot,
        Tab::Profile,
    ];

    pub fn segment(self) -> &'static str {
        match self {
            Tab::Home => "home",
            Tab::BookTicket => "bookTicket",
            Tab::Tickets => "tickets",
            Tab::Chatbot => "chatbot",
            Tab::Profile => "profile",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.segment() == segment)
    }
}

/// A screen of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Tabs(Tab),
}

impl Route {
    pub const HOME: Route = Route::Tabs(Tab::Home);

    pub fn zone(self) -> RouteZone {
        match self {
            Route::Login | Route::Register => RouteZone::Public,
            Route::Tabs(_) => RouteZone::Protected,
        }
    }

    pub fn path(self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Tabs(tab) => format!("/tabs/{}", tab.segment()),
        }
    }
}

impl FromStr for Route {
    type Err = Error;

    /// Parses `/login`, `register`, `/tabs`, `/tabs/`, `/tabs/profile` and the like.
    fn from_str(path: &str) -> Result<Self> {
        let trimmed = path.trim().trim_matches('/');
        let mut segments = trimmed.split('/');
        let route = match (segments.next(), segments.next(), segments.next()) {
            (Some("login"), None, _) => Some(Route::Login),
            (Some("register"), None, _) => Some(Route::Register),
            (Some("tabs"), None, _) => Some(Route::HOME),
            (Some("tabs"), Some(tab), None) => Tab::from_segment(tab).map(Route::Tabs),
            _ => None,
        };
        route.ok_or_else(|| Error::UnknownRoute(path.to_string()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Whether a route needs a logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteZone {
    Public,
    Protected,
}

impl RouteZone {
    /// Zone of an arbitrary path. Paths that name no screen are `Protected`.
    pub fn of_path(path: &str) -> Self {
        path.parse::<Route>()
            .map(Route::zone)
            .unwrap_or(RouteZone::Protected)
    }
}

/// What to do with the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationAction {
    /// Render nothing until the auth state is known.
    Suspend,
    RedirectToLogin,
    RedirectToHome,
    Stay,
}

impl NavigationAction {
    /// Route the action sends the user to, if it redirects.
    pub fn destination(self) -> Option<Route> {
        match self {
            NavigationAction::RedirectToLogin => Some(Route::Login),
            NavigationAction::RedirectToHome => Some(Route::HOME),
            NavigationAction::Suspend | NavigationAction::Stay => None,
        }
    }
}

/// The route guard.
pub fn evaluate(state: AuthState, zone: RouteZone) -> NavigationAction {
    match (state, zone) {
        (AuthState::Unknown, _) => NavigationAction::Suspend,
        (AuthState::Unauthenticated, RouteZone::Protected) => NavigationAction::RedirectToLogin,
        (AuthState::Authenticated, RouteZone::Public) => NavigationAction::RedirectToHome,
        (AuthState::Unauthenticated, RouteZone::Public)
        | (AuthState::Authenticated, RouteZone::Protected) => NavigationAction::Stay,
    }
}

/// Start destination for a given auth state.
pub fn initial_route(state: AuthState) -> Route {
    match state {
        AuthState::Authenticated => Route::HOME,
        AuthState::Unknown | AuthState::Unauthenticated => Route::Login,
    }
}

/// Tracks the current route and keeps it consistent with the auth state.
#[derive(Debug)]
pub struct Navigator {
    route: Route,
    state: watch::Receiver<AuthState>,
}

impl Navigator {
    pub fn new(mut state: watch::Receiver<AuthState>) -> Self {
        let route = initial_route(*state.borrow_and_update());
        Self { route, state }
    }

    pub fn current(&self) -> Route {
        self.route
    }

    pub fn auth_state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Guard decision for the current route.
    pub fn action(&self) -> NavigationAction {
        evaluate(self.auth_state(), self.route.zone())
    }

    /// Go to `path`, redirecting if the guard says so.
    ///
    /// Paths that name no screen are guarded as protected; if the guard lets
    /// the user through anyway, [`Error::UnknownRoute`] is returned and the
    /// current route is kept.
    pub fn navigate(&mut self, path: &str) -> Result<NavigationAction> {
        let action = evaluate(self.auth_state(), RouteZone::of_path(path));
        match action.destination() {
            Some(destination) => self.route = destination,
            None => self.route = path.parse()?,
        }
        debug!(path, route = %self.route, ?action, "Navigated");
        Ok(action)
    }

    /// Wait for the next auth-state change and re-apply the guard.
    ///
    /// Returns `None` once the session has been dropped.
    pub async fn changed(&mut self) -> Option<NavigationAction> {
        self.state.changed().await.ok()?;
        self.state.borrow_and_update();
        let action = self.action();
        if let Some(destination) = action.destination() {
            debug!(from = %self.route, to = %destination, "Auth state changed; redirecting");
            self.route = destination;
        }
        Some(action)
    }
}
