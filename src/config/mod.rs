//! Configuration management.
//!
//! Resolves the database location and the actor name recorded in audit
//! events. Stride uses a single global database at
//! `~/.stride/data/stride.db`; server deployments point `STRIDE_DB` at
//! a managed path instead.

use std::path::{Path, PathBuf};

/// Get the global Stride directory location (`~/.stride/`).
#[must_use]
pub fn global_stride_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".stride"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `STRIDE_TEST_DB=1` (or any non-empty
/// value). This redirects all database operations to an isolated test
/// database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("STRIDE_TEST_DB")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Get the test database path (`~/.stride/test/stride.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_stride_dir().map(|dir| dir.join("test").join("stride.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `STRIDE_TEST_DB` environment variable → uses test database
/// 3. `STRIDE_DB` environment variable
/// 4. Global location: `~/.stride/data/stride.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("STRIDE_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_stride_dir().map(|dir| dir.join("data").join("stride.db"))
}

/// Get the default actor name for audit events.
///
/// Priority:
/// 1. `STRIDE_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("STRIDE_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        let actor = default_actor();
        assert!(!actor.is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_defaults_to_global() {
        let result = resolve_db_path(None);
        assert!(result.is_some());
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_stride_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("/test/"));
        assert_ne!(global.join("data").join("stride.db"), test);
    }
}
