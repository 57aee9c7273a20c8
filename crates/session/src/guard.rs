//! Route guard over a typed route table.
//!
//! The table is declared and validated up front, so a typo'd redirect target
//! or a duplicate pattern fails at startup instead of at navigation time.
//! Decisions are pure functions of the cached user and the requested path;
//! the guard never performs I/O and never hangs.

use std::sync::Arc;

use thiserror::Error;

use milvault_core::{Role, User};

use crate::manager::SessionManager;

/// Redirect targets the guard itself navigates to. The table must declare
/// all of them.
pub mod targets {
    pub const LOGIN: &str = "/auth/login";
    pub const DASHBOARD: &str = "/dashboard";
    pub const UNAUTHORIZED: &str = "/unauthorized";
    pub const CONFIRM_EMAIL: &str = "/auth/confirm-email";
}

/// Who may enter a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    /// Any signed-in user when `roles` is empty, otherwise only the listed
    /// roles.
    Authenticated { roles: Vec<Role> },
}

/// What the guard resolved for a requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect {
        target: String,
        /// The originally requested path (query string included), carried so
        /// the login page can send the user back after sign-in.
        return_url: Option<String>,
    },
}

impl Decision {
    fn redirect(target: &str) -> Self {
        Decision::Redirect {
            target: target.to_string(),
            return_url: None,
        }
    }

    fn redirect_back(target: &str, requested: &str) -> Self {
        Decision::Redirect {
            target: target.to_string(),
            return_url: Some(requested.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route pattern declared twice: {0}")]
    DuplicatePattern(String),

    #[error("route {0} restricts to an empty role list")]
    EmptyRoles(String),

    #[error("table is missing the redirect target {0}")]
    MissingTarget(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Patterns
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    segments: Vec<Segment>,
    /// A trailing `**` matches any remainder, including none.
    catch_all: bool,
    access: RouteAccess,
}

impl Route {
    fn compile(pattern: &str, access: RouteAccess) -> Self {
        let mut segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let catch_all = segments.last() == Some(&"**");
        if catch_all {
            segments.pop();
        }

        Self {
            pattern: pattern.to_string(),
            segments: segments
                .into_iter()
                .map(|s| {
                    if s.starts_with(':') {
                        Segment::Param
                    } else {
                        Segment::Literal(s.to_string())
                    }
                })
                .collect(),
            catch_all,
            access,
        }
    }

    fn matches(&self, path_segments: &[&str]) -> bool {
        if self.catch_all {
            if path_segments.len() < self.segments.len() {
                return false;
            }
        } else if path_segments.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(path_segments)
            .all(|(pattern, actual)| match pattern {
                Segment::Literal(lit) => lit == actual,
                Segment::Param => true,
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered route declarations. The first matching pattern wins, so narrower
/// routes must be declared before a catch-all.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder { routes: Vec::new() }
    }

    /// The application's route table.
    pub fn standard() -> Result<Self, RouteTableError> {
        Self::builder()
            .public(targets::LOGIN)
            .public("/auth/register")
            .public("/auth/forgot-password")
            .public("/auth/reset-password/:token")
            .public(targets::CONFIRM_EMAIL)
            .public("/auth/confirm-email/:email")
            .public(targets::UNAUTHORIZED)
            .authenticated("/")
            .authenticated(targets::DASHBOARD)
            .authenticated("/documents")
            .authenticated("/documents/:id")
            .authenticated("/communications")
            .restricted("/communications/create", &[Role::Admin])
            .restricted("/communications/edit/:id", &[Role::Admin])
            .restricted("/admin", &[Role::Admin])
            .public("**")
            .build()
    }

    fn access_for(&self, path: &str) -> Option<&RouteAccess> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.routes
            .iter()
            .find(|route| route.matches(&segments))
            .map(|route| &route.access)
    }

    /// Resolve a navigation request against a user snapshot.
    ///
    /// The query string is ignored for matching but kept in `return_url`.
    /// Paths no route matches are treated as requiring authentication; the
    /// standard table ends in a public catch-all, so there they allow and
    /// the router renders not-found.
    pub fn decide(&self, user: Option<&User>, requested: &str) -> Decision {
        let path = requested.split('?').next().unwrap_or(requested);

        let Some(user) = user else {
            return match self.access_for(path) {
                Some(RouteAccess::Public) => Decision::Allow,
                _ => Decision::redirect_back(targets::LOGIN, requested),
            };
        };

        if !user.verified && !is_confirm_email(path) {
            return Decision::redirect(targets::CONFIRM_EMAIL);
        }

        if path == targets::LOGIN {
            return Decision::redirect(targets::DASHBOARD);
        }

        if let Some(RouteAccess::Authenticated { roles }) = self.access_for(path) {
            if !roles.is_empty() && !roles.contains(&user.role) {
                return Decision::redirect(targets::UNAUTHORIZED);
            }
        }

        Decision::Allow
    }
}

fn is_confirm_email(path: &str) -> bool {
    path == targets::CONFIRM_EMAIL
        || path
            .strip_prefix(targets::CONFIRM_EMAIL)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Debug)]
enum Declared {
    Public,
    AnyAuthenticated,
    Restricted(Vec<Role>),
}

#[derive(Debug)]
pub struct RouteTableBuilder {
    routes: Vec<(String, Declared)>,
}

impl RouteTableBuilder {
    pub fn public(mut self, pattern: &str) -> Self {
        self.routes.push((pattern.to_string(), Declared::Public));
        self
    }

    pub fn authenticated(mut self, pattern: &str) -> Self {
        self.routes
            .push((pattern.to_string(), Declared::AnyAuthenticated));
        self
    }

    pub fn restricted(mut self, pattern: &str, roles: &[Role]) -> Self {
        self.routes
            .push((pattern.to_string(), Declared::Restricted(roles.to_vec())));
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        let mut seen = std::collections::HashSet::new();
        for (pattern, declared) in &self.routes {
            if !seen.insert(pattern.as_str()) {
                return Err(RouteTableError::DuplicatePattern(pattern.clone()));
            }
            if matches!(declared, Declared::Restricted(roles) if roles.is_empty()) {
                return Err(RouteTableError::EmptyRoles(pattern.clone()));
            }
        }

        for target in [
            targets::LOGIN,
            targets::DASHBOARD,
            targets::UNAUTHORIZED,
            targets::CONFIRM_EMAIL,
        ] {
            if !self.routes.iter().any(|(pattern, _)| pattern == target) {
                return Err(RouteTableError::MissingTarget(target));
            }
        }

        Ok(RouteTable {
            routes: self
                .routes
                .into_iter()
                .map(|(pattern, declared)| {
                    let access = match declared {
                        Declared::Public => RouteAccess::Public,
                        Declared::AnyAuthenticated => {
                            RouteAccess::Authenticated { roles: Vec::new() }
                        }
                        Declared::Restricted(roles) => RouteAccess::Authenticated { roles },
                    };
                    Route::compile(&pattern, access)
                })
                .collect(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Navigation-time gate wiring the table to the live session.
pub struct RouteGuard {
    session: Arc<SessionManager>,
    table: RouteTable,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>, table: RouteTable) -> Self {
        Self { session, table }
    }

    /// Guard with the standard application table.
    pub fn standard(session: Arc<SessionManager>) -> Result<Self, RouteTableError> {
        Ok(Self::new(session, RouteTable::standard()?))
    }

    /// Resolve `requested` against the current user snapshot.
    pub fn check(&self, requested: &str) -> Decision {
        let user = self.session.current_user();
        let decision = self.table.decide(user.as_ref(), requested);
        if let Decision::Redirect { target, .. } = &decision {
            tracing::debug!(requested, target, "navigation redirected");
        }
        decision
    }
}
