//! Authentication: credentials, backend endpoints, session state and the
//! refresh-token exchange.

pub mod api;
pub mod credentials;
pub mod refresh;
pub mod session;

pub use api::{AuthApi, Profile};
pub use credentials::{Credentials, Registration};
pub use refresh::RefreshCoordinator;
pub use session::{AuthSession, AuthState};
