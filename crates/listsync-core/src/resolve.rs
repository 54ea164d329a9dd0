//! Code resolution for imports.
//!
//! Import rows name list types and referenced entities by code. The
//! resolvers turn codes into ids; the caches in [`ImportRun`] keep every
//! resolved code for the rest of the run so each distinct code is looked up
//! once.

use crate::error::{ListSyncError, Result};
use crate::models::{ItemId, TypeId};
use std::collections::HashMap;
use tracing::debug;

/// Looks up list type ids by code.
pub trait TypeResolver {
    /// Resolve a list type code registered for `resource` and `domain`.
    ///
    /// Fails with `TypeResolution` for unregistered codes.
    fn resolve_type_id(&self, resource: &str, domain: &str, code: &str) -> Result<TypeId>;
}

/// Looks up referenced entity ids by code.
pub trait ReferenceResolver {
    /// Resolve an entity code within a domain, `None` if unknown.
    fn resolve_entity_id(&self, domain: &str, code: &str) -> Result<Option<ItemId>>;
}

/// Entity ids by (domain, code), filled lazily during one import run.
///
/// Entries are never replaced once set. Misses are not cached, so an entity
/// created later in the run is still found.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    ids: HashMap<(String, String), ItemId>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an entity that is known without a lookup, e.g. the parent
    /// currently being imported.
    pub fn set(&mut self, domain: &str, code: &str, id: ItemId) {
        self.ids
            .entry((domain.to_string(), code.to_string()))
            .or_insert(id);
    }

    pub fn get(&self, domain: &str, code: &str) -> Option<ItemId> {
        self.ids
            .get(&(domain.to_string(), code.to_string()))
            .copied()
    }

    /// Return the cached id or ask the resolver once and cache a hit.
    pub fn resolve(
        &mut self,
        resolver: &dyn ReferenceResolver,
        domain: &str,
        code: &str,
    ) -> Result<Option<ItemId>> {
        if let Some(id) = self.get(domain, code) {
            return Ok(Some(id));
        }

        let resolved = resolver.resolve_entity_id(domain, code)?;
        if let Some(id) = resolved {
            debug!("Cached {} entity {} -> {}", domain, code, id);
            self.set(domain, code, id);
        }
        Ok(resolved)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// List type ids by (resource, domain, code), filled lazily.
#[derive(Debug, Default)]
pub struct TypeCache {
    ids: HashMap<(String, String, String), TypeId>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        resolver: &dyn TypeResolver,
        resource: &str,
        domain: &str,
        code: &str,
    ) -> Result<TypeId> {
        let key = (resource.to_string(), domain.to_string(), code.to_string());
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }

        let id = resolver.resolve_type_id(resource, domain, code)?;
        self.ids.insert(key, id);
        Ok(id)
    }
}

/// State shared by all reconcile passes of one import job.
///
/// Create one per run and drop it when the run ends; nothing is persisted.
#[derive(Debug, Default)]
pub struct ImportRun {
    pub references: ReferenceCache,
    pub types: TypeCache,
}

impl ImportRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference code that must exist.
    ///
    /// Fails with `ReferenceResolution` naming both codes when it does not.
    pub fn require_reference(
        &mut self,
        resolver: &dyn ReferenceResolver,
        domain: &str,
        code: &str,
        parent_code: &str,
    ) -> Result<ItemId> {
        self.references
            .resolve(resolver, domain, code)?
            .ok_or_else(|| ListSyncError::ReferenceResolution {
                code: code.to_string(),
                parent_code: parent_code.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingResolver {
        lookups: Cell<usize>,
    }

    impl ReferenceResolver for CountingResolver {
        fn resolve_entity_id(&self, domain: &str, code: &str) -> Result<Option<ItemId>> {
            self.lookups.set(self.lookups.get() + 1);
            Ok((domain == "product" && code == "CNC").then_some(ItemId(10)))
        }
    }

    impl TypeResolver for CountingResolver {
        fn resolve_type_id(&self, resource: &str, domain: &str, code: &str) -> Result<TypeId> {
            self.lookups.set(self.lookups.get() + 1);
            if code == "default" {
                Ok(TypeId(1))
            } else {
                Err(ListSyncError::TypeResolution {
                    resource: resource.to_string(),
                    domain: domain.to_string(),
                    code: code.to_string(),
                })
            }
        }
    }

    fn resolver() -> CountingResolver {
        CountingResolver {
            lookups: Cell::new(0),
        }
    }

    #[test]
    fn test_reference_cache_looks_up_once() {
        let resolver = resolver();
        let mut cache = ReferenceCache::new();

        assert_eq!(cache.resolve(&resolver, "product", "CNC").unwrap(), Some(ItemId(10)));
        assert_eq!(cache.resolve(&resolver, "product", "CNC").unwrap(), Some(ItemId(10)));
        assert_eq!(resolver.lookups.get(), 1);
    }

    #[test]
    fn test_reference_cache_does_not_cache_misses() {
        let resolver = resolver();
        let mut cache = ReferenceCache::new();

        assert_eq!(cache.resolve(&resolver, "product", "NONE").unwrap(), None);
        assert_eq!(cache.resolve(&resolver, "product", "NONE").unwrap(), None);
        assert_eq!(resolver.lookups.get(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reference_cache_is_write_once() {
        let mut cache = ReferenceCache::new();
        cache.set("product", "CNC", ItemId(1));
        cache.set("product", "CNC", ItemId(2));
        assert_eq!(cache.get("product", "CNC"), Some(ItemId(1)));
        assert_eq!(cache.get("media", "CNC"), None);
    }

    #[test]
    fn test_type_cache_propagates_unknown_code() {
        let resolver = resolver();
        let mut cache = TypeCache::new();

        assert_eq!(
            cache.resolve(&resolver, "product", "product", "default").unwrap(),
            TypeId(1)
        );
        cache.resolve(&resolver, "product", "product", "default").unwrap();
        assert_eq!(resolver.lookups.get(), 1);

        let err = cache
            .resolve(&resolver, "product", "product", "bogus")
            .unwrap_err();
        assert!(matches!(err, ListSyncError::TypeResolution { .. }));
    }

    #[test]
    fn test_require_reference_names_parent() {
        let resolver = resolver();
        let mut run = ImportRun::new();

        let err = run
            .require_reference(&resolver, "product", "MISSING", "U:TEST")
            .unwrap_err();
        match err {
            ListSyncError::ReferenceResolution { code, parent_code } => {
                assert_eq!(code, "MISSING");
                assert_eq!(parent_code, "U:TEST");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
