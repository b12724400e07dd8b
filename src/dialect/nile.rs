//! Nile dialect
//!
//! Nile is Postgres with built-in tenant virtualization. Declarative
//! partitioning collides with Nile's own tenant sharding, and extensions
//! outside the published allowlist only warn.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile,
};

/// Extensions Nile ships with; anything else draws `NILE_W001`.
pub const EXTENSION_ALLOWLIST: &[&str] = &[
    "uuid-ossp",
    "pgcrypto",
    "pg_trgm",
    "citext",
    "vector",
    "postgis",
];

pub fn profile() -> DialectProfile {
    DialectProfile {
        dialect: Dialect::Nile,
        features: DialectFeatures {
            supports_table_partitioning: false,
            supports_foreign_tables: false,
            ..DialectFeatures::postgres()
        },
        type_map: HashMap::new(),
        blocked: BlockedFeatures {
            partitioning: Some(DiagnosticCode::NileE001),
            ..BlockedFeatures::default()
        },
    }
}

pub struct NileAdapter {
    profile: DialectProfile,
}

impl NileAdapter {
    pub fn new() -> Self {
        Self { profile: profile() }
    }
}

impl Default for NileAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectAdapter for NileAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Nile
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }
}

pub fn adapter() -> Arc<dyn DialectAdapter> {
    Arc::new(NileAdapter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nile_blocks_partitioning_only() {
        let profile = profile();
        assert_eq!(profile.blocked.partitioning, Some(DiagnosticCode::NileE001));
        assert!(profile.blocked.foreign_keys.is_none());
        assert!(profile.blocked.triggers.is_none());
    }

    #[test]
    fn test_allowlist_contains_common_extensions() {
        assert!(EXTENSION_ALLOWLIST.contains(&"pgcrypto"));
        assert!(!EXTENSION_ALLOWLIST.contains(&"timescaledb"));
    }
}
