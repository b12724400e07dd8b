//! Aurora DSQL dialect
//!
//! DSQL speaks the Postgres protocol but drops most of the stateful
//! surface: no foreign keys, triggers, sequences, extensions, or
//! partitioning, and PL/pgSQL is unavailable. Object-count limits are
//! low enough to warn about.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile, TypeMapping,
};

/// Documented per-cluster limits at the time of writing.
pub const MAX_TABLES_PER_DATABASE: u32 = 1000;
pub const MAX_COLUMNS_PER_TABLE: u32 = 255;

pub fn profile() -> DialectProfile {
    let mut type_map: HashMap<&'static str, TypeMapping> = HashMap::new();
    for spelling in ["serial", "bigserial", "smallserial"] {
        type_map.insert(
            spelling,
            TypeMapping::unsupported(
                "numeric",
                DiagnosticCode::DsqlE004,
                Some("uuid primary keys with gen_random_uuid()"),
            ),
        );
    }

    DialectProfile {
        dialect: Dialect::AuroraDsql,
        features: DialectFeatures {
            supports_table_partitioning: false,
            supports_stored_procedures: false,
            supports_triggers: false,
            supports_foreign_tables: false,
            supports_for_update_skip_locked: false,
            max_tables_per_database: Some(MAX_TABLES_PER_DATABASE),
            max_columns_per_table: Some(MAX_COLUMNS_PER_TABLE),
            ..DialectFeatures::postgres()
        },
        type_map,
        blocked: BlockedFeatures {
            foreign_keys: Some(DiagnosticCode::DsqlE001),
            triggers: Some(DiagnosticCode::DsqlE002),
            sequences: Some(DiagnosticCode::DsqlE003),
            auto_increment: Some(DiagnosticCode::DsqlE004),
            extensions: Some(DiagnosticCode::DsqlE005),
            partitioning: Some(DiagnosticCode::DsqlE006),
            plpgsql_functions: Some(DiagnosticCode::DsqlE007),
            ..BlockedFeatures::default()
        },
    }
}

pub struct DsqlAdapter {
    profile: DialectProfile,
}

impl DsqlAdapter {
    pub fn new() -> Self {
        Self { profile: profile() }
    }
}

impl Default for DsqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectAdapter for DsqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::AuroraDsql
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }
}

pub fn adapter() -> Arc<dyn DialectAdapter> {
    Arc::new(DsqlAdapter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsql_blocks_stateful_surface() {
        let profile = profile();
        assert_eq!(profile.blocked.foreign_keys, Some(DiagnosticCode::DsqlE001));
        assert_eq!(profile.blocked.triggers, Some(DiagnosticCode::DsqlE002));
        assert_eq!(profile.blocked.sequences, Some(DiagnosticCode::DsqlE003));
        assert_eq!(profile.blocked.extensions, Some(DiagnosticCode::DsqlE005));
        assert_eq!(profile.blocked.partitioning, Some(DiagnosticCode::DsqlE006));
    }

    #[test]
    fn test_dsql_limits_present() {
        let features = profile().features;
        assert_eq!(features.max_tables_per_database, Some(MAX_TABLES_PER_DATABASE));
        assert_eq!(features.max_columns_per_table, Some(MAX_COLUMNS_PER_TABLE));
    }

    #[test]
    fn test_serial_lookup() {
        let profile = profile();
        let mapping = profile.lookup_type("serial").unwrap();
        assert_eq!(mapping.error_code, Some(DiagnosticCode::DsqlE004));
    }
}
