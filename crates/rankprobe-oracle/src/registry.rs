//! Runtime selection of oracles by id.

use crate::binary::BinarySearchOracle;
use crate::linear::LinearOracle;
use crate::oracle::PositionOracle;
use crate::rmi::RmiOracle;
use crate::{OracleError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Builds a fresh, unloaded oracle.
pub type OracleFactory = fn() -> Box<dyn PositionOracle>;

/// Maps oracle ids to factories.
#[derive(Debug, Clone, Default)]
pub struct OracleRegistry {
    factories: BTreeMap<String, OracleFactory>,
}

impl OracleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `binary`, `linear` and `rmi`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BinarySearchOracle::ID, || Box::new(BinarySearchOracle::new()));
        registry.register(LinearOracle::ID, || Box::new(LinearOracle::new()));
        registry.register(RmiOracle::ID, || Box::new(RmiOracle::new()));
        registry
    }

    /// Register `factory` under `id`, returning the factory it replaced.
    pub fn register(&mut self, id: impl Into<String>, factory: OracleFactory) -> Option<OracleFactory> {
        self.factories.insert(id.into(), factory)
    }

    /// Build the oracle registered under `id`.
    pub fn create(&self, id: &str) -> Result<Box<dyn PositionOracle>> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| OracleError::UnknownOracle { id: id.to_string() })
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Pick the oracle for a data file.
    ///
    /// An id matches when `<id>_` occurs in the file name; the longest
    /// matching id wins so that `books_200M` beats `books`.
    pub fn resolve(&self, data_path: &Path) -> Option<&str> {
        let name = data_path.file_name()?.to_str()?;
        let found = self
            .ids()
            .filter(|id| name.contains(&format!("{id}_")))
            .max_by_key(|id| id.len());

        if let Some(id) = found {
            debug!("Resolved oracle '{}' for {}", id, data_path.display());
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = OracleRegistry::with_defaults();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["binary", "linear", "rmi"]);

        let oracle = registry.create("rmi").unwrap();
        assert_eq!(oracle.name(), "rmi");
        assert!(!oracle.is_loaded());
    }

    #[test]
    fn test_unknown_id() {
        let registry = OracleRegistry::with_defaults();
        assert!(matches!(
            registry.create("pgm"),
            Err(OracleError::UnknownOracle { .. })
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = OracleRegistry::new();
        assert!(registry.register("books", || Box::new(RmiOracle::new())).is_none());
        assert!(registry.register("books", || Box::new(LinearOracle::new())).is_some());
        assert_eq!(registry.create("books").unwrap().name(), "linear");
    }

    #[test]
    fn test_resolve_longest_match() {
        let mut registry = OracleRegistry::new();
        registry.register("books", || Box::new(RmiOracle::new()));
        registry.register("books_200M", || Box::new(LinearOracle::new()));
        registry.register("osm", || Box::new(RmiOracle::new()));

        assert_eq!(
            registry.resolve(Path::new("/data/books_200M_uint64")),
            Some("books_200M")
        );
        assert_eq!(registry.resolve(Path::new("books_800M_uint64")), Some("books"));
        assert_eq!(registry.resolve(Path::new("/data/osm/fb_200M_uint64")), None);
        assert_eq!(registry.resolve(Path::new("/")), None);
    }
}
