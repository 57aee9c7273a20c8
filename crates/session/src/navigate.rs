//! Navigation sink.
//!
//! The guard is pure (it returns a decision); only the HTTP layer navigates
//! directly, and it does so through this seam so headless hosts and tests
//! can observe or ignore it.

use std::sync::Mutex;

/// Receiver for navigation requests issued by the HTTP layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);

    /// The path currently shown, used as the return target when a dead
    /// session bounces the user to the login page.
    fn current_path(&self) -> Option<String> {
        None
    }
}

/// Navigator that drops everything (headless/CLI use).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn navigate(&self, _path: &str) {}
}

/// Navigator that records requests and tracks a current path.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    history: Mutex<Vec<String>>,
    current: Mutex<Option<String>>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(path: impl Into<String>) -> Self {
        let nav = Self::default();
        nav.set_current(path);
        nav
    }

    pub fn set_current(&self, path: impl Into<String>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(path.into());
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history().into_iter().last()
    }
}

impl Navigator for MemoryNavigator {
    fn navigate(&self, path: &str) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
        self.set_current(path);
    }

    fn current_path(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_navigator_tracks_current_path() {
        let nav = MemoryNavigator::at("/dashboard");
        assert_eq!(nav.current_path().as_deref(), Some("/dashboard"));

        nav.navigate("/auth/login");
        assert_eq!(nav.last().as_deref(), Some("/auth/login"));
        assert_eq!(nav.current_path().as_deref(), Some("/auth/login"));
    }
}
