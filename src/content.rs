//! Content collaborator interface.
//!
//! Plan content (authored meals, exercises, habits) lives outside this
//! engine. The engine only needs a stable, ordered list of item ids for
//! a plan at start time; it never discovers item ids on its own.

use crate::error::{Error, Result};
use crate::model::ContentType;
use std::collections::HashMap;

/// Supplies the item id list for a piece of plan content.
///
/// A failing provider surfaces as [`Error::DependencyUnavailable`],
/// which is retryable and must never be conflated with `NotStarted`.
pub trait ContentProvider {
    /// Stable ordered item ids for `content_id`, as of now.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` when the backing service cannot
    /// answer, and `InvalidArgument` for unknown content.
    fn item_ids(&self, content_type: &ContentType, content_id: &str) -> Result<Vec<String>>;
}

/// In-memory content catalog.
///
/// Used by the CLI (items passed on the command line) and by tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    plans: HashMap<(String, String), Vec<String>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plan's item list.
    pub fn insert(&mut self, content_type: &ContentType, content_id: &str, items: Vec<String>) {
        self.plans.insert(
            (content_type.as_str().to_string(), content_id.to_string()),
            items,
        );
    }

    /// Build a one-plan catalog, the common CLI case.
    #[must_use]
    pub fn single(content_type: &ContentType, content_id: &str, items: Vec<String>) -> Self {
        let mut catalog = Self::new();
        catalog.insert(content_type, content_id, items);
        catalog
    }
}

impl ContentProvider for StaticCatalog {
    fn item_ids(&self, content_type: &ContentType, content_id: &str) -> Result<Vec<String>> {
        self.plans
            .get(&(content_type.as_str().to_string(), content_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown content {}/{content_id}",
                    content_type.as_str()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::single(
            &ContentType::Diet,
            "week-1",
            vec!["breakfast".to_string(), "lunch".to_string()],
        );

        let items = catalog.item_ids(&ContentType::Diet, "week-1").unwrap();
        assert_eq!(items, vec!["breakfast", "lunch"]);

        assert!(catalog.item_ids(&ContentType::Diet, "week-2").is_err());
        assert!(catalog.item_ids(&ContentType::Exercise, "week-1").is_err());
    }
}
