//! Stock PostgreSQL dialect
//!
//! The baseline profile: everything the IR can express is supported, so
//! the type map is empty and nothing is blocked.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dialect::{BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile};

pub fn profile() -> DialectProfile {
    DialectProfile {
        dialect: Dialect::Postgres,
        features: DialectFeatures::postgres(),
        type_map: HashMap::new(),
        blocked: BlockedFeatures::default(),
    }
}

pub struct PostgresAdapter {
    profile: DialectProfile,
}

impl PostgresAdapter {
    pub fn new() -> Self {
        Self { profile: profile() }
    }
}

impl Default for PostgresAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }
}

pub fn adapter() -> Arc<dyn DialectAdapter> {
    Arc::new(PostgresAdapter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_blocks_nothing() {
        let profile = profile();
        assert!(profile.blocked.foreign_keys.is_none());
        assert!(profile.blocked.exclude_constraints.is_none());
        assert!(profile.blocked.index_methods.is_empty());
        assert!(profile.lookup_type("money").is_none());
        assert!(profile.features.supports_lateral);
    }
}
