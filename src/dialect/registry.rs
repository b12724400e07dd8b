//! Process-wide dialect adapter registry
//!
//! Adapters register as factories and construct lazily on first lookup;
//! subsequent lookups return the cached instance. Factories whose
//! dependencies are optional can register as deferred (async) factories,
//! but only lazily — eager registration must construct immediately, so a
//! deferred factory there is a configuration error.
//!
//! Mutations (register/unregister/clear) are confined to bootstrap and
//! test harnesses; lookups are the hot path.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use once_cell::sync::Lazy;

use crate::dialect::{self, Dialect, DialectAdapter};
use crate::error::SyncError;

/// How an adapter comes into being.
pub enum AdapterFactory {
    /// Plain constructor, runs synchronously at first lookup.
    Sync(Box<dyn Fn() -> Arc<dyn DialectAdapter> + Send + Sync>),
    /// Constructor that awaits optional dependencies. Only valid for
    /// lazy registration; resolved via [`adapter_async`].
    Deferred(Box<dyn Fn() -> BoxFuture<'static, Arc<dyn DialectAdapter>> + Send + Sync>),
}

struct RegistryInner {
    factories: HashMap<Dialect, AdapterFactory>,
    cache: HashMap<Dialect, Arc<dyn DialectAdapter>>,
}

impl RegistryInner {
    fn with_defaults() -> Self {
        let mut inner = Self {
            factories: HashMap::new(),
            cache: HashMap::new(),
        };
        inner.install_builtin(Dialect::Postgres, || dialect::postgres::adapter());
        inner.install_builtin(Dialect::CockroachDb, || dialect::cockroach::adapter());
        inner.install_builtin(Dialect::AuroraDsql, || dialect::dsql::adapter());
        inner.install_builtin(Dialect::Nile, || dialect::nile::adapter());
        inner.install_builtin(Dialect::Xata, || dialect::xata::adapter());
        inner.install_builtin(Dialect::MySql, || dialect::mysql::adapter(Dialect::MySql));
        inner.install_builtin(Dialect::MariaDb, || dialect::mysql::adapter(Dialect::MariaDb));
        inner.install_builtin(Dialect::PlanetScale, || {
            dialect::mysql::adapter(Dialect::PlanetScale)
        });
        inner.install_builtin(Dialect::Sqlite, || dialect::sqlite::adapter(Dialect::Sqlite));
        inner.install_builtin(Dialect::Turso, || dialect::sqlite::adapter(Dialect::Turso));
        inner
    }

    fn install_builtin(
        &mut self,
        dialect: Dialect,
        factory: impl Fn() -> Arc<dyn DialectAdapter> + Send + Sync + 'static,
    ) {
        self.factories
            .insert(dialect, AdapterFactory::Sync(Box::new(factory)));
    }
}

static REGISTRY: Lazy<RwLock<RegistryInner>> =
    Lazy::new(|| RwLock::new(RegistryInner::with_defaults()));

/// Register an adapter factory.
///
/// With `lazy` the factory is stored and run at first lookup. Without it
/// the adapter is constructed and cached immediately — which a deferred
/// factory cannot do, so that combination is rejected.
pub fn register(dialect: Dialect, factory: AdapterFactory, lazy: bool) -> Result<(), SyncError> {
    let mut registry = REGISTRY.write().expect("dialect registry poisoned");

    if lazy {
        // Invalidate any stale instance; the new factory runs on the
        // next lookup.
        registry.cache.remove(&dialect);
    } else {
        match &factory {
            AdapterFactory::Sync(build) => {
                let adapter = build();
                registry.cache.insert(dialect, adapter);
            }
            AdapterFactory::Deferred(_) => {
                return Err(SyncError::Configuration(format!(
                    "adapter for '{dialect}' registered eagerly with a deferred factory; \
                     register it lazily or provide a synchronous factory"
                )));
            }
        }
    }

    registry.factories.insert(dialect, factory);
    Ok(())
}

/// Remove a dialect's factory and cached instance.
pub fn unregister(dialect: Dialect) {
    let mut registry = REGISTRY.write().expect("dialect registry poisoned");
    registry.factories.remove(&dialect);
    registry.cache.remove(&dialect);
}

/// Drop all cached instances, keeping factories. Test harness hook.
pub fn clear_cache() {
    let mut registry = REGISTRY.write().expect("dialect registry poisoned");
    registry.cache.clear();
}

/// Look up the adapter for a dialect, constructing it on first use.
///
/// Deferred factories cannot resolve synchronously; use
/// [`adapter_async`] for those.
pub fn adapter(dialect: Dialect) -> Result<Arc<dyn DialectAdapter>, SyncError> {
    {
        let registry = REGISTRY.read().expect("dialect registry poisoned");
        if let Some(cached) = registry.cache.get(&dialect) {
            return Ok(cached.clone());
        }
    }

    let mut registry = REGISTRY.write().expect("dialect registry poisoned");
    // Double-checked: another caller may have populated the cache while
    // we waited for the write lock.
    if let Some(cached) = registry.cache.get(&dialect) {
        return Ok(cached.clone());
    }

    match registry.factories.get(&dialect) {
        Some(AdapterFactory::Sync(build)) => {
            let adapter = build();
            registry.cache.insert(dialect, adapter.clone());
            Ok(adapter)
        }
        Some(AdapterFactory::Deferred(_)) => Err(SyncError::Configuration(format!(
            "adapter for '{dialect}' has a deferred factory; resolve it with adapter_async"
        ))),
        None => Err(SyncError::Configuration(format!(
            "no adapter registered for dialect '{dialect}'"
        ))),
    }
}

/// Async lookup that can resolve deferred factories.
pub async fn adapter_async(dialect: Dialect) -> Result<Arc<dyn DialectAdapter>, SyncError> {
    {
        let registry = REGISTRY.read().expect("dialect registry poisoned");
        if let Some(cached) = registry.cache.get(&dialect) {
            return Ok(cached.clone());
        }
        match registry.factories.get(&dialect) {
            Some(AdapterFactory::Sync(_)) | Some(AdapterFactory::Deferred(_)) => {}
            None => {
                return Err(SyncError::Configuration(format!(
                    "no adapter registered for dialect '{dialect}'"
                )));
            }
        }
    }

    // Build outside the lock; deferred factories may suspend.
    let future = {
        let registry = REGISTRY.read().expect("dialect registry poisoned");
        match registry.factories.get(&dialect) {
            Some(AdapterFactory::Deferred(build)) => Some(build()),
            _ => None,
        }
    };

    let built = match future {
        Some(future) => future.await,
        None => return adapter(dialect),
    };

    let mut registry = REGISTRY.write().expect("dialect registry poisoned");
    registry
        .cache
        .entry(dialect)
        .or_insert_with(|| built.clone());
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtin_dialects_resolve() {
        use strum::IntoEnumIterator;
        for dialect in Dialect::iter() {
            let adapter = adapter(dialect).unwrap();
            assert_eq!(adapter.dialect(), dialect);
        }
    }

    #[test]
    fn test_eager_registration_with_deferred_factory_fails() {
        let factory = AdapterFactory::Deferred(Box::new(|| {
            Box::pin(async { dialect::postgres::adapter() })
        }));
        let err = register(Dialect::Postgres, factory, false).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(err.to_string().contains("deferred factory"));

        // The builtin factory must still be intact.
        assert!(adapter(Dialect::Postgres).is_ok());
    }

    // Cache clearing and factory replacement mutate process-wide state, so
    // they run as one sequential test to keep the parallel suite stable.
    // Turso is not looked up anywhere else in the suite.
    #[tokio::test]
    async fn test_registration_lifecycle() {
        let first = adapter(Dialect::Turso).unwrap();
        let cached = adapter(Dialect::Turso).unwrap();
        assert!(
            Arc::ptr_eq(&first, &cached),
            "second lookup must hit the cache"
        );
        clear_cache();
        let second = adapter(Dialect::Turso).unwrap();
        assert!(
            !Arc::ptr_eq(&first, &second),
            "clear_cache must force a rebuild"
        );

        let factory = AdapterFactory::Deferred(Box::new(|| {
            Box::pin(async { dialect::sqlite::adapter(Dialect::Turso) })
        }));
        register(Dialect::Turso, factory, true).unwrap();

        let err = adapter(Dialect::Turso).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));

        let resolved = adapter_async(Dialect::Turso).await.unwrap();
        assert_eq!(resolved.dialect(), Dialect::Turso);

        // Restore the builtin factory.
        register(
            Dialect::Turso,
            AdapterFactory::Sync(Box::new(|| dialect::sqlite::adapter(Dialect::Turso))),
            true,
        )
        .unwrap();
        unregister(Dialect::Nile);
        assert!(matches!(
            adapter(Dialect::Nile),
            Err(SyncError::Configuration(_))
        ));
        register(
            Dialect::Nile,
            AdapterFactory::Sync(Box::new(dialect::nile::adapter)),
            true,
        )
        .unwrap();
        assert!(adapter(Dialect::Nile).is_ok());
    }
}
