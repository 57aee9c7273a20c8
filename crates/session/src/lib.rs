//! Client-side session layer.
//!
//! Owns everything between "the user typed a password" and "a request went
//! out with a valid bearer token": the [`SessionManager`] state machine,
//! the [`RouteGuard`] navigation gate, and the [`AuthHttp`] layer that
//! refreshes and retries on 401. Feature crates consume these; nothing
//! here renders UI.

pub mod backend;
pub mod error;
pub mod guard;
pub mod http;
pub mod manager;
pub mod navigate;
pub mod notify;

pub use backend::{AuthBackend, InMemoryAuthBackend};
pub use error::{AuthError, AuthResult};
pub use guard::{
    Decision, RouteAccess, RouteGuard, RouteTable, RouteTableBuilder, RouteTableError,
};
pub use http::{AuthHttp, HttpError};
pub use manager::{RegisterOutcome, SessionManager};
pub use navigate::{MemoryNavigator, Navigator, NullNavigator};
pub use notify::{MemoryNotifier, Notifier, Severity, TracingNotifier};
